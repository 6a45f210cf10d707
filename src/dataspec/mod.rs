//! Declarative description of the physical data source: entity specs, their
//! columns and join paths, references between entities, filters, and the
//! typed proposition model reconstructed from result rows.

pub mod catalog;
pub mod entity_spec;
pub mod errors;
pub mod filter;
pub mod proposition;
pub mod value;

pub use catalog::DataSourceCatalog;
pub use entity_spec::{
    Cardinality, CodeMapping, ColumnSpec, EntitySpec, JoinHop, PropertySpec, PropositionKind,
    ReferenceSpec,
};
pub use errors::CatalogError;
pub use filter::{Comparator, Filter, PositionFilter, ValueFilter};
pub use proposition::{Proposition, PropositionBase, Provenance, UniqueId};
pub use value::{Value, ValueParseError, ValueType};
