//! Join-graph compilation: given the requested proposition ids, a primary
//! entity, the related entity set, and filters, compute the minimal ordered
//! set of columns one statement must select, plus the positional index map
//! the result processors use to read rows.
//!
//! Column order is a correctness requirement, not cosmetic: processors index
//! result-set columns positionally, so compiling the same inputs twice must
//! yield the same ordering. De-duplication preserves first-seen order.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::dataspec::entity_spec::{ColumnSpec, EntitySpec, JoinHop, ReferenceSpec};
use crate::dataspec::filter::Filter;

use super::errors::SqlGenError;

/// Compiled join/selection plan for one statement.
#[derive(Debug, Clone, Default)]
pub struct ColumnSpecInfo {
    /// Ordered, de-duplicated columns. This order is the SELECT order and
    /// the positional order of result-set columns.
    pub column_specs: Vec<ColumnSpec>,
    /// Index of the key-id column. Always 0.
    pub key_id_index: usize,
    /// Indices of the primary (owner) entity's unique-id columns. Kept
    /// separate from `unique_id_indices` because a self-referencing entity
    /// appears there twice, once as owner and once as rebased target.
    pub owner_id_indices: Vec<usize>,
    /// Entity name → indices of its unique-id columns.
    pub unique_id_indices: HashMap<String, Vec<usize>>,
    /// Discriminator column index, present when the primary entity maps more
    /// than one proposition id.
    pub code_index: Option<usize>,
    pub value_index: Option<usize>,
    pub start_time_index: Option<usize>,
    pub finish_time_index: Option<usize>,
    /// Primary-entity property name → column index.
    pub property_indices: Vec<(String, usize)>,
    /// Reference name → indices of the target's unique-id columns, for
    /// references originating at the primary entity.
    pub reference_indices: HashMap<String, Vec<usize>>,
}

impl ColumnSpecInfo {
    /// Index the given column, re-using the index of a join-path-equal
    /// column that was already compiled.
    fn push_unique(&mut self, spec: ColumnSpec) -> usize {
        if let Some(idx) = self
            .column_specs
            .iter()
            .position(|existing| existing.is_same_column(&spec))
        {
            return idx;
        }
        self.column_specs.push(spec);
        self.column_specs.len() - 1
    }
}

pub struct ColumnSpecInfoFactory;

impl ColumnSpecInfoFactory {
    /// Compile the main-pass plan for `primary`.
    ///
    /// `entities` is the statement's entity set and must contain the primary
    /// entity. Filters naming a proposition id no entity in the set produces
    /// are a compilation error; filters that apply to no requested id are
    /// skipped.
    pub fn compile(
        requested_prop_ids: &HashSet<String>,
        primary: &EntitySpec,
        entities: &[&EntitySpec],
        filters: &[Filter],
    ) -> Result<ColumnSpecInfo, SqlGenError> {
        if !entities.iter().any(|e| e.name == primary.name) {
            return Err(SqlGenError::PrimaryEntityNotInQuery(primary.name.clone()));
        }
        let active_filters = validate_filters(requested_prop_ids, entities, filters)?;

        let mut info = ColumnSpecInfo::default();

        // Key id first: processors and the ORDER BY both depend on it being
        // column zero.
        info.key_id_index = info.push_unique(primary.base_spec.clone());

        let uid_indices: Vec<usize> = primary
            .unique_id_specs
            .iter()
            .map(|spec| info.push_unique(spec.clone()))
            .collect();
        info.owner_id_indices = uid_indices.clone();
        info.unique_id_indices
            .insert(primary.name.clone(), uid_indices);

        if let Some(code_spec) = &primary.code_spec {
            info.code_index = Some(info.push_unique(code_spec.clone()));
        }
        if let Some(value_spec) = &primary.value_spec {
            info.value_index = Some(info.push_unique(value_spec.clone()));
        }
        if let Some(start_spec) = &primary.start_time_spec {
            info.start_time_index = Some(info.push_unique(start_spec.clone()));
        }
        if let Some(finish_spec) = &primary.finish_time_spec {
            info.finish_time_index = Some(info.push_unique(finish_spec.clone()));
        }
        for property in &primary.property_specs {
            let idx = info.push_unique(property.spec.clone());
            info.property_indices.push((property.name.clone(), idx));
        }

        Self::traverse_references(
            requested_prop_ids,
            primary,
            entities,
            &active_filters,
            &mut info,
        );

        log::debug!(
            "Compiled {} columns for entity '{}' ({} references)",
            info.column_specs.len(),
            primary.name,
            info.reference_indices.len()
        );
        Ok(info)
    }

    /// Compile the lighter reference-pass plan: key id, owner unique ids,
    /// then the target's unique ids reached through the reference's path.
    /// Filter columns on the owner are compiled in so a reference pass sees
    /// exactly the rows its main pass saw.
    pub fn compile_reference(
        primary: &EntitySpec,
        reference: &ReferenceSpec,
        target: &EntitySpec,
        requested_prop_ids: &HashSet<String>,
        filters: &[Filter],
    ) -> Result<ColumnSpecInfo, SqlGenError> {
        if reference.target_entity != target.name {
            return Err(SqlGenError::ReferenceTargetNotInQuery {
                reference: reference.name.clone(),
                target: target.name.clone(),
            });
        }
        let mut info = ColumnSpecInfo::default();
        info.key_id_index = info.push_unique(primary.base_spec.clone());
        let owner_indices: Vec<usize> = primary
            .unique_id_specs
            .iter()
            .map(|spec| info.push_unique(spec.clone()))
            .collect();
        info.owner_id_indices = owner_indices.clone();
        info.unique_id_indices
            .insert(primary.name.clone(), owner_indices);
        let target_indices: Vec<usize> = target
            .unique_id_specs
            .iter()
            .map(|spec| info.push_unique(spec.rebase(&reference.path)))
            .collect();
        // A self-reference targets the owner's own entity; the owner's map
        // entry must keep the un-rebased columns.
        info.unique_id_indices
            .entry(target.name.clone())
            .or_insert_with(|| target_indices.clone());
        info.reference_indices
            .insert(reference.name.clone(), target_indices);

        // The discriminator restriction from the main pass applies here too,
        // so the column it restricts must be part of the plan.
        if primary.needs_discriminator() {
            if let Some(code_spec) = &primary.code_spec {
                info.code_index = Some(info.push_unique(code_spec.clone()));
            }
        }

        for filter in filters {
            if !filter.applies_to(primary.proposition_ids.iter().map(String::as_str))
                || !filter.applies_to(requested_prop_ids.iter().map(String::as_str))
            {
                continue;
            }
            match filter {
                Filter::Value(_) => {
                    if let Some(value_spec) = &primary.value_spec {
                        info.push_unique(value_spec.clone());
                    }
                }
                Filter::Position(_) => {
                    if let Some(start_spec) = &primary.start_time_spec {
                        info.push_unique(start_spec.clone());
                    }
                }
            }
        }
        Ok(info)
    }

    /// Breadth-first traversal of the reference graph from the primary
    /// entity, following only references whose target is needed for a
    /// requested proposition id or for a filter. Each entity is visited
    /// once; self-references therefore terminate.
    fn traverse_references(
        requested_prop_ids: &HashSet<String>,
        primary: &EntitySpec,
        entities: &[&EntitySpec],
        filters: &[&Filter],
        info: &mut ColumnSpecInfo,
    ) {
        let by_name: HashMap<&str, &EntitySpec> =
            entities.iter().map(|e| (e.name.as_str(), *e)).collect();
        let mut visited: HashSet<String> = HashSet::from([primary.name.clone()]);
        let mut frontier: VecDeque<(&EntitySpec, Vec<JoinHop>)> =
            VecDeque::from([(primary, Vec::new())]);

        while let Some((entity, prefix)) = frontier.pop_front() {
            for reference in &entity.reference_specs {
                let Some(target) = by_name.get(reference.target_entity.as_str()) else {
                    continue;
                };
                let needed = target.matches_any(requested_prop_ids.iter().map(String::as_str))
                    || filters
                        .iter()
                        .any(|f| f.applies_to(target.proposition_ids.iter().map(String::as_str)));
                if !needed {
                    continue;
                }
                let mut path = prefix.clone();
                path.extend(reference.path.iter().cloned());

                let target_indices: Vec<usize> = target
                    .unique_id_specs
                    .iter()
                    .map(|spec| info.push_unique(spec.rebase(&path)))
                    .collect();
                if entity.name == primary.name {
                    info.reference_indices
                        .insert(reference.name.clone(), target_indices.clone());
                }
                info.unique_id_indices
                    .entry(target.name.clone())
                    .or_insert(target_indices);

                for filter in filters {
                    if !filter.applies_to(target.proposition_ids.iter().map(String::as_str)) {
                        continue;
                    }
                    match filter {
                        Filter::Value(_) => {
                            if let Some(value_spec) = &target.value_spec {
                                info.push_unique(value_spec.rebase(&path));
                            }
                        }
                        Filter::Position(_) => {
                            if let Some(start_spec) = &target.start_time_spec {
                                info.push_unique(start_spec.rebase(&path));
                            }
                        }
                    }
                }

                if visited.insert(target.name.clone()) {
                    frontier.push_back((target, path));
                }
            }
        }
    }
}

/// Reject filters naming proposition ids outside the known entity set;
/// silently drop filters that apply to no requested id.
fn validate_filters<'a>(
    requested_prop_ids: &HashSet<String>,
    entities: &[&EntitySpec],
    filters: &'a [Filter],
) -> Result<Vec<&'a Filter>, SqlGenError> {
    let known: HashSet<&str> = entities
        .iter()
        .flat_map(|e| e.proposition_ids.iter().map(String::as_str))
        .collect();
    let mut active = Vec::new();
    for filter in filters {
        for prop_id in filter.proposition_ids() {
            if !known.contains(prop_id.as_str()) {
                return Err(SqlGenError::FilterOutsideKnownSet(prop_id.clone()));
            }
        }
        if filter.applies_to(requested_prop_ids.iter().map(String::as_str)) {
            active.push(filter);
        } else {
            log::debug!("Skipping filter that applies to no requested proposition id");
        }
    }
    Ok(active)
}
