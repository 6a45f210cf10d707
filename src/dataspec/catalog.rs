//! Catalog of entity specs for one data source backend.
//!
//! Catalogs are built once from a declarative document and are immutable for
//! the life of every query that reads them. A catalog is defined in YAML
//! with the following structure:
//!
//! ```yaml
//! backend_id: clinical_dw          # Provenance tag for reconstructed data
//! dialect: postgres                # ansi | mysql | postgres | sqlite
//! entities:
//!   - name: Lab
//!     proposition_ids: [LAB]
//!     kind: primitive              # constant | primitive | event
//!     base_spec:                   # key-id column, joins from LAB
//!       joins:
//!         - { from_table: LAB, from_column: patient_id,
//!             to_table: PATIENT, to_column: id }
//!       table: PATIENT
//!       column: id
//!     unique_id_specs:
//!       - { table: LAB, column: lab_id }
//!     value_spec: { table: LAB, column: value }
//!     value_type: number
//!     start_time_spec: { table: LAB, column: time }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::sqlgen::dialect::DialectKind;

use super::entity_spec::EntitySpec;
use super::errors::CatalogError;

/// Top-level catalog document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub backend_id: String,
    #[serde(default)]
    pub dialect: DialectKind,
    pub entities: Vec<EntitySpec>,
}

/// Validated, indexed view over a backend's entity specs.
#[derive(Debug, Clone)]
pub struct DataSourceCatalog {
    backend_id: String,
    dialect: DialectKind,
    entities: Vec<EntitySpec>,
    by_name: HashMap<String, usize>,
    by_prop_id: HashMap<String, usize>,
}

impl DataSourceCatalog {
    pub fn new(
        backend_id: impl Into<String>,
        dialect: DialectKind,
        entities: Vec<EntitySpec>,
    ) -> Result<Self, CatalogError> {
        let backend_id = backend_id.into();
        let mut by_name = HashMap::new();
        let mut by_prop_id: HashMap<String, usize> = HashMap::new();
        for (idx, entity) in entities.iter().enumerate() {
            if by_name.insert(entity.name.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateEntity(entity.name.clone()));
            }
            if entity.needs_discriminator() && entity.code_spec.is_none() {
                return Err(CatalogError::MissingDiscriminator(entity.name.clone()));
            }
            for prop_id in &entity.proposition_ids {
                if let Some(prev) = by_prop_id.insert(prop_id.clone(), idx) {
                    return Err(CatalogError::DuplicateProposition {
                        prop_id: prop_id.clone(),
                        first: entities[prev].name.clone(),
                        second: entity.name.clone(),
                    });
                }
            }
        }
        for entity in &entities {
            for reference in &entity.reference_specs {
                if !by_name.contains_key(&reference.target_entity) {
                    return Err(CatalogError::UnknownReferenceTarget {
                        entity: entity.name.clone(),
                        target: reference.target_entity.clone(),
                    });
                }
            }
        }
        log::debug!(
            "Catalog loaded: {} entities, backend '{}'",
            entities.len(),
            backend_id
        );
        Ok(DataSourceCatalog {
            backend_id,
            dialect,
            entities,
            by_name,
            by_prop_id,
        })
    }

    pub fn from_config(config: CatalogConfig) -> Result<Self, CatalogError> {
        DataSourceCatalog::new(config.backend_id, config.dialect, config.entities)
    }

    pub fn from_yaml_str(document: &str) -> Result<Self, CatalogError> {
        let config: CatalogConfig = serde_yaml::from_str(document)?;
        DataSourceCatalog::from_config(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let document = std::fs::read_to_string(path)?;
        DataSourceCatalog::from_yaml_str(&document)
    }

    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    pub fn dialect(&self) -> DialectKind {
        self.dialect
    }

    pub fn entities(&self) -> &[EntitySpec] {
        &self.entities
    }

    pub fn entity(&self, name: &str) -> Option<&EntitySpec> {
        self.by_name.get(name).map(|&idx| &self.entities[idx])
    }

    pub fn entity_for_proposition(&self, prop_id: &str) -> Option<&EntitySpec> {
        self.by_prop_id.get(prop_id).map(|&idx| &self.entities[idx])
    }

    /// Fail fast on any requested proposition id with no entity spec. Runs
    /// before any SQL executes.
    pub fn validate_proposition_ids<'a, I>(&self, prop_ids: I) -> Result<(), CatalogError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for prop_id in prop_ids {
            if !self.by_prop_id.contains_key(prop_id) {
                return Err(CatalogError::UnknownPropositionId(prop_id.to_string()));
            }
        }
        Ok(())
    }

    /// Entities producing any requested proposition id, in catalog order.
    pub fn entities_for_propositions(&self, prop_ids: &HashSet<String>) -> Vec<&EntitySpec> {
        self.entities
            .iter()
            .filter(|e| e.matches_any(prop_ids.iter().map(String::as_str)))
            .collect()
    }

    /// The entity set relevant to one statement pass: the primary entity
    /// plus every entity reachable from it through references.
    pub fn related_entities<'a>(&'a self, primary: &'a EntitySpec) -> Vec<&'a EntitySpec> {
        let mut related = vec![primary];
        let mut seen: HashSet<&str> = HashSet::from([primary.name.as_str()]);
        let mut frontier = vec![primary];
        while let Some(entity) = frontier.pop() {
            for reference in &entity.reference_specs {
                if seen.insert(&reference.target_entity) {
                    if let Some(target) = self.entity(&reference.target_entity) {
                        related.push(target);
                        frontier.push(target);
                    }
                }
            }
        }
        related
    }
}
