//! Compilation of entity/reference/filter specifications into dialect-correct
//! SQL: join-graph compilation, table aliasing, clause generation, and
//! statement assembly.

pub mod column_spec_info;
pub mod dialect;
pub mod errors;
pub mod from_clause;
pub mod select_clause;
pub mod staging;
pub mod statement;
pub mod table_aliaser;
pub mod where_clause;

pub use column_spec_info::{ColumnSpecInfo, ColumnSpecInfoFactory};
pub use dialect::{DialectKind, SqlDialect};
pub use errors::SqlGenError;
pub use staging::StagingSpec;
pub use statement::{ReferenceStatement, SelectStatement, SqlOrder};
pub use table_aliaser::TableAliaser;
