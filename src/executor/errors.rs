use thiserror::Error;

use crate::dataspec::errors::CatalogError;
use crate::db::DataReadError;
use crate::results::ResultsError;
use crate::sqlgen::SqlGenError;

/// Query execution errors. Whichever failure is recorded first wins; later
/// failures during drain and teardown are logged and dropped.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Compilation(#[from] SqlGenError),

    #[error("Query '{query_id}': {source}")]
    Read {
        query_id: String,
        #[source]
        source: DataReadError,
    },

    #[error(transparent)]
    Results(#[from] ResultsError),

    #[error("Result handler failed: {0}")]
    Handler(String),

    #[error("Query was cancelled")]
    Cancelled,
}
