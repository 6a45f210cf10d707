use thiserror::Error;

use crate::db::DataReadError;

/// Result-assembly errors. Row-level recoverable conditions (unparseable
/// cells, unmapped discriminator codes) are handled in the processors and
/// never surface here; these are the conditions that abort the query.
#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("Result row has no key id in column {0}")]
    MissingKeyId(usize),

    #[error(
        "Reference '{reference}' names owner {owner} under key '{key_id}' \
         that no main pass produced"
    )]
    MissingReferenceOwner {
        reference: String,
        owner: String,
        key_id: String,
    },

    #[error(transparent)]
    Read(#[from] DataReadError),
}
