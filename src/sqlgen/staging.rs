//! Pre-materialization of a hot join path into a temporary table consumed by
//! the main statement's FROM clause in place of the raw join. Used only when
//! an entity's join path is reused across multiple statements.

use crate::dataspec::entity_spec::{ColumnSpec, JoinHop};

use super::dialect::SqlDialect;
use super::errors::SqlGenError;
use super::table_aliaser::TableAliaser;

#[derive(Debug, Clone)]
pub struct StagingSpec {
    /// Name of the temporary table the staged rows land in.
    pub staging_table: String,
    /// Join path whose destination is replaced by the staged table.
    pub replaced_path: Vec<JoinHop>,
    pub replaced_table: String,
    /// Table the staged rows are read from.
    pub source_table: String,
    /// Columns materialized into the staged table, relative to the source.
    pub staged_columns: Vec<ColumnSpec>,
}

/// Select clause over the staged columns, emitted verbatim. Code translation
/// never applies here; staging resolves codes before the main statement runs.
pub struct StagingSelectClause<'a> {
    spec: &'a StagingSpec,
    aliaser: &'a TableAliaser,
}

impl<'a> StagingSelectClause<'a> {
    pub fn new(spec: &'a StagingSpec, aliaser: &'a TableAliaser) -> Self {
        StagingSelectClause { spec, aliaser }
    }

    pub fn generate(&self) -> Result<String, SqlGenError> {
        let mut columns = Vec::with_capacity(self.spec.staged_columns.len());
        for spec in &self.spec.staged_columns {
            columns.push(self.aliaser.column_reference(spec)?);
        }
        Ok(format!("SELECT {}", columns.join(", ")))
    }

    /// Staging selects never translate codes.
    pub fn case_translation(&self) -> Result<String, SqlGenError> {
        Err(SqlGenError::CaseInStagingSelect)
    }
}

impl StagingSpec {
    /// The preliminary statement that materializes the staged rows.
    pub fn create_statement(&self, dialect: &dyn SqlDialect) -> Result<String, SqlGenError> {
        let aliaser = TableAliaser::new(&self.staged_columns, "a");
        let select = StagingSelectClause::new(self, &aliaser).generate()?;
        Ok(format!(
            "CREATE TEMPORARY TABLE {} AS {} FROM {} a0",
            dialect.quote_identifier(&self.staging_table),
            select,
            dialect.quote_identifier(&self.source_table)
        ))
    }
}
