use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Duplicate entity name '{0}' in catalog")]
    DuplicateEntity(String),

    #[error("Proposition id '{prop_id}' is mapped by both '{first}' and '{second}'")]
    DuplicateProposition {
        prop_id: String,
        first: String,
        second: String,
    },

    #[error("Entity '{entity}' references unknown entity '{target}'")]
    UnknownReferenceTarget { entity: String, target: String },

    #[error("Entity '{0}' maps more than one proposition id but has no discriminator column")]
    MissingDiscriminator(String),

    #[error("No entity spec for proposition id '{0}'")]
    UnknownPropositionId(String),

    #[error("Could not read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed catalog document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
