//! Reconstructed domain entities. A proposition is a typed clinical fact:
//! a constant, a time-point primitive, or a time-interval event. The three
//! kinds share a base record and differ only in their interval fields.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use super::value::Value;

/// Immutable composite key identifying one entity occurrence across passes.
/// Built from the entity name plus the entity's configured unique-id columns
/// in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniqueId {
    pub entity_name: String,
    pub parts: Vec<String>,
}

impl UniqueId {
    pub fn new(entity_name: impl Into<String>, parts: Vec<String>) -> Self {
        UniqueId {
            entity_name: entity_name.into(),
            parts,
        }
    }
}

impl std::fmt::Display for UniqueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.entity_name, self.parts.join("^"))
    }
}

/// Where a proposition came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub backend_id: String,
}

/// Fields common to all proposition kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct PropositionBase {
    /// Canonical proposition id.
    pub id: String,
    pub unique_id: UniqueId,
    pub value: Option<Value>,
    /// Property name → parsed value. A property present with `None` parsed
    /// unsuccessfully or was NULL in the database.
    pub properties: BTreeMap<String, Option<Value>>,
    /// Reference name → unique ids of referenced entities, in the order the
    /// reference passes delivered them.
    pub references: BTreeMap<String, Vec<UniqueId>>,
    pub provenance: Provenance,
}

impl PropositionBase {
    pub fn new(id: impl Into<String>, unique_id: UniqueId, backend_id: impl Into<String>) -> Self {
        PropositionBase {
            id: id.into(),
            unique_id,
            value: None,
            properties: BTreeMap::new(),
            references: BTreeMap::new(),
            provenance: Provenance {
                backend_id: backend_id.into(),
            },
        }
    }

    pub fn add_reference(&mut self, name: &str, target: UniqueId) {
        self.references.entry(name.to_string()).or_default().push(target);
    }
}

/// Closed variant space over the three proposition kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Proposition {
    Constant(PropositionBase),
    Primitive {
        base: PropositionBase,
        timestamp: Option<NaiveDateTime>,
    },
    Event {
        base: PropositionBase,
        start: Option<NaiveDateTime>,
        finish: Option<NaiveDateTime>,
    },
}

impl Proposition {
    pub fn base(&self) -> &PropositionBase {
        match self {
            Proposition::Constant(base) => base,
            Proposition::Primitive { base, .. } => base,
            Proposition::Event { base, .. } => base,
        }
    }

    pub fn into_base(self) -> PropositionBase {
        match self {
            Proposition::Constant(base) => base,
            Proposition::Primitive { base, .. } => base,
            Proposition::Event { base, .. } => base,
        }
    }

    pub fn base_mut(&mut self) -> &mut PropositionBase {
        match self {
            Proposition::Constant(base) => base,
            Proposition::Primitive { base, .. } => base,
            Proposition::Event { base, .. } => base,
        }
    }

    pub fn unique_id(&self) -> &UniqueId {
        &self.base().unique_id
    }

    /// Start of the proposition's interval, if it has one. Constants have
    /// none; primitives use their point timestamp.
    pub fn start(&self) -> Option<NaiveDateTime> {
        match self {
            Proposition::Constant(_) => None,
            Proposition::Primitive { timestamp, .. } => *timestamp,
            Proposition::Event { start, .. } => *start,
        }
    }
}
