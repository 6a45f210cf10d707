//! Entity specs map proposition types to physical tables and columns.
//!
//! Every column is addressed by a [`ColumnSpec`]: the ordered join path from
//! the owning entity's base table to the table holding the column, plus the
//! column name. Two column specs are join-path-equal iff their hop sequences
//! and column match exactly; the aliaser and the join-graph compiler both
//! rely on that equality.

use serde::{Deserialize, Serialize};

use super::value::ValueType;

/// One join hop: a foreign-key predicate from one table to the next.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinHop {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

/// A database-local code together with the canonical proposition id it
/// normalizes to. Used both for CASE translation in SELECT and for
/// restricting a discriminator column in WHERE.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeMapping {
    pub proposition_id: String,
    pub sql_code: String,
}

/// A physical `table.column` reachable through zero or more join hops from
/// the owning entity's base table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Join path from the entity's base table. Empty means the column lives
    /// on the base table itself.
    #[serde(default)]
    pub joins: Vec<JoinHop>,
    /// Table holding the column. Must equal the last hop's `to_table` when
    /// the path is non-empty.
    pub table: String,
    pub column: String,
    /// Code→canonical-id mapping for discriminator columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_mappings: Option<Vec<CodeMapping>>,
}

impl ColumnSpec {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        ColumnSpec {
            joins: Vec::new(),
            table: table.into(),
            column: column.into(),
            code_mappings: None,
        }
    }

    pub fn with_joins(mut self, joins: Vec<JoinHop>) -> Self {
        self.joins = joins;
        self
    }

    pub fn with_code_mappings(mut self, mappings: Vec<CodeMapping>) -> Self {
        self.code_mappings = Some(mappings);
        self
    }

    /// Re-root this column spec by prefixing `path`. Used when a related
    /// entity's columns are reached through a reference from the statement's
    /// primary entity.
    pub fn rebase(&self, path: &[JoinHop]) -> ColumnSpec {
        if path.is_empty() {
            return self.clone();
        }
        let mut joins = Vec::with_capacity(path.len() + self.joins.len());
        joins.extend_from_slice(path);
        joins.extend(self.joins.iter().cloned());
        ColumnSpec {
            joins,
            table: self.table.clone(),
            column: self.column.clone(),
            code_mappings: self.code_mappings.clone(),
        }
    }

    /// Join-path signature identifying the table instance this column reads
    /// from. Distinct signatures never share a SQL alias, which is what makes
    /// self-joins come out correct.
    pub fn table_instance(&self) -> TableInstance {
        TableInstance {
            joins: self.joins.clone(),
            table: self.table.clone(),
        }
    }

    /// Same hop sequence and same column.
    pub fn is_same_column(&self, other: &ColumnSpec) -> bool {
        self.joins == other.joins && self.table == other.table && self.column == other.column
    }
}

/// A distinct joined occurrence of a physical table: the join path leading to
/// it plus the table name. This is the unit of alias allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableInstance {
    pub joins: Vec<JoinHop>,
    pub table: String,
}

/// Kind of proposition an entity spec reconstructs. The three kinds share
/// processing logic and differ only in the interval they derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropositionKind {
    /// No temporal component.
    Constant,
    /// A single point timestamp.
    Primitive,
    /// A start/finish pair.
    Event,
}

/// A named property column with its declared value type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub name: String,
    pub spec: ColumnSpec,
    pub value_type: ValueType,
}

/// How many referenced entities one owner row may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// A named, directed join from the owning entity to another entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSpec {
    pub name: String,
    pub target_entity: String,
    /// Join path from the owning entity's base table to the target entity's
    /// base table.
    pub path: Vec<JoinHop>,
    pub cardinality: Cardinality,
    /// When false the target is joined for data retrieval but excluded from
    /// WHERE-clause restriction.
    #[serde(default = "default_apply_constraints")]
    pub apply_constraints: bool,
}

fn default_apply_constraints() -> bool {
    true
}

/// One proposition type's physical mapping. Immutable once constructed;
/// queries only ever read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    /// Unique within a catalog.
    pub name: String,
    /// The proposition ids this entity can produce. More than one id means
    /// rows are disambiguated by the discriminator (`code_spec`) column.
    pub proposition_ids: Vec<String>,
    pub kind: PropositionKind,
    /// Column yielding the key id (patient/case identifier) for each row.
    pub base_spec: ColumnSpec,
    /// Columns whose values form the composite unique id of one entity
    /// occurrence. Composite equality must hold across passes.
    pub unique_id_specs: Vec<ColumnSpec>,
    /// Discriminator column; required when `proposition_ids` has more than
    /// one entry. Carries the code mappings for CASE translation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_spec: Option<ColumnSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_spec: Option<ColumnSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time_spec: Option<ColumnSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time_spec: Option<ColumnSpec>,
    #[serde(default)]
    pub property_specs: Vec<PropertySpec>,
    #[serde(default)]
    pub reference_specs: Vec<ReferenceSpec>,
}

impl EntitySpec {
    /// References from this entity whose target is `other`.
    pub fn references_to<'a>(
        &'a self,
        other: &'a EntitySpec,
    ) -> impl Iterator<Item = &'a ReferenceSpec> {
        self.reference_specs
            .iter()
            .filter(move |r| r.target_entity == other.name)
    }

    /// Whether this entity produces any of the given proposition ids.
    pub fn matches_any<'a, I>(&self, prop_ids: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut ids = prop_ids.into_iter();
        ids.any(|id| self.proposition_ids.iter().any(|p| p == id))
    }

    /// Whether a row needs the discriminator column to resolve its
    /// proposition id.
    pub fn needs_discriminator(&self) -> bool {
        self.proposition_ids.len() > 1
    }
}
