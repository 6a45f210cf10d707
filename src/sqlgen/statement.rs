//! Statement assembly: compile the join graph, build the aliaser, ask the
//! dialect-selected generators for each clause, and concatenate them into
//! one executable statement. Deterministic: the same inputs always yield the
//! same statement text.

use std::collections::HashSet;

use crate::dataspec::entity_spec::{CodeMapping, EntitySpec, ReferenceSpec};
use crate::dataspec::filter::Filter;

use super::column_spec_info::{ColumnSpecInfo, ColumnSpecInfoFactory};
use super::dialect::SqlDialect;
use super::errors::SqlGenError;
use super::from_clause::FromClause;
use super::select_clause::SelectClause;
use super::staging::StagingSpec;
use super::table_aliaser::TableAliaser;
use super::where_clause::WhereClause;

pub use super::where_clause::SqlOrder;

/// Main-pass statement for one entity.
pub struct SelectStatement<'a> {
    pub entity_spec: &'a EntitySpec,
    /// The statement's entity set; must contain `entity_spec`.
    pub entity_specs: Vec<&'a EntitySpec>,
    pub filters: &'a [Filter],
    pub prop_ids: &'a HashSet<String>,
    pub key_ids: &'a [String],
    pub order: Option<SqlOrder>,
    pub dialect: &'a dyn SqlDialect,
    pub wrap_key_id: bool,
    pub staging: &'a [StagingSpec],
}

impl<'a> SelectStatement<'a> {
    /// Generate the statement text together with the compiled plan the
    /// result processors use to read the rows positionally.
    pub fn generate(&self) -> Result<(String, ColumnSpecInfo), SqlGenError> {
        let info = ColumnSpecInfoFactory::compile(
            self.prop_ids,
            self.entity_spec,
            &self.entity_specs,
            self.filters,
        )?;
        let aliaser = TableAliaser::new(&info.column_specs, "a");

        let case_translation = self.case_translation();
        let select = SelectClause::new(
            &info,
            &aliaser,
            self.dialect,
            self.wrap_key_id,
            case_translation.as_deref(),
        );
        let from = FromClause::new(&aliaser, self.dialect, self.staging);

        // Entities reachable only via a non-constraining reference are
        // joined for data retrieval but excluded from WHERE restriction.
        let constraining: Vec<&EntitySpec> = self
            .entity_specs
            .iter()
            .copied()
            .filter(|es| {
                !es.references_to(self.entity_spec)
                    .any(|r| !r.apply_constraints)
            })
            .collect();
        let where_ = WhereClause::new(
            self.entity_spec,
            self.prop_ids,
            &info,
            &constraining,
            self.filters,
            &aliaser,
            self.key_ids,
            self.order,
            self.dialect,
        );

        let statement = join_clauses(&[
            select.generate()?,
            from.generate()?,
            where_.generate()?,
        ]);
        log::debug!("Generated statement for '{}': {}", self.entity_spec.name, statement);
        Ok((statement, info))
    }

    /// CASE-translate the discriminator column when it carries code
    /// mappings, restricted to the requested proposition ids.
    fn case_translation(&self) -> Option<Vec<CodeMapping>> {
        let code_spec = self.entity_spec.code_spec.as_ref()?;
        let mappings = code_spec.code_mappings.as_ref()?;
        let filtered: Vec<CodeMapping> = mappings
            .iter()
            .filter(|m| self.prop_ids.contains(&m.proposition_id))
            .cloned()
            .collect();
        if filtered.is_empty() {
            None
        } else {
            Some(filtered)
        }
    }
}

/// Reference-pass statement: key id, owner unique ids, target unique ids,
/// ordered by key id. Owner-side filters and the key-id restriction are
/// carried over from the main pass so the two row sets agree key by key.
pub struct ReferenceStatement<'a> {
    pub entity_spec: &'a EntitySpec,
    pub reference_spec: &'a ReferenceSpec,
    pub target: &'a EntitySpec,
    pub prop_ids: &'a HashSet<String>,
    pub filters: &'a [Filter],
    pub key_ids: &'a [String],
    pub dialect: &'a dyn SqlDialect,
    pub wrap_key_id: bool,
    pub staging: &'a [StagingSpec],
}

impl<'a> ReferenceStatement<'a> {
    pub fn generate(&self) -> Result<(String, ColumnSpecInfo), SqlGenError> {
        let info = ColumnSpecInfoFactory::compile_reference(
            self.entity_spec,
            self.reference_spec,
            self.target,
            self.prop_ids,
            self.filters,
        )?;
        let aliaser = TableAliaser::new(&info.column_specs, "a");
        let select = SelectClause::new(&info, &aliaser, self.dialect, self.wrap_key_id, None);
        let from = FromClause::new(&aliaser, self.dialect, self.staging);
        let entities = [self.entity_spec];
        let where_ = WhereClause::new(
            self.entity_spec,
            self.prop_ids,
            &info,
            &entities,
            self.filters,
            &aliaser,
            self.key_ids,
            None,
            self.dialect,
        );
        let statement = join_clauses(&[
            select.generate()?,
            from.generate()?,
            where_.generate()?,
        ]);
        log::debug!(
            "Generated reference statement '{}' for '{}': {}",
            self.reference_spec.name,
            self.entity_spec.name,
            statement
        );
        Ok((statement, info))
    }
}

fn join_clauses(clauses: &[String]) -> String {
    clauses
        .iter()
        .filter(|c| !c.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(" ")
}
