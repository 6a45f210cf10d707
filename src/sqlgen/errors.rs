use thiserror::Error;

/// Compilation errors. All of these surface before any SQL executes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SqlGenError {
    #[error("Filter references proposition id '{0}' outside the known entity set")]
    FilterOutsideKnownSet(String),

    #[error("Primary entity '{0}' is not among the queried entities")]
    PrimaryEntityNotInQuery(String),

    #[error("Reference '{reference}' targets entity '{target}' which is not in the statement's entity set")]
    ReferenceTargetNotInQuery { reference: String, target: String },

    #[error("Dialect '{dialect}' does not support {capability}")]
    UnsupportedCapability {
        dialect: &'static str,
        capability: &'static str,
    },

    #[error("Case translation is not available in a staging select")]
    CaseInStagingSelect,

    #[error("Column {table}.{column} is not registered with the table aliaser")]
    UnaliasedColumn { table: String, column: String },
}
