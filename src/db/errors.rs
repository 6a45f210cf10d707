use thiserror::Error;

/// Driver/connection failures. Fatal for the current query; partial results
/// already delivered downstream are not retracted.
#[derive(Debug, Clone, Error)]
pub enum DataReadError {
    #[error("database error: {0}")]
    Database(String),
}
