//! Main-pass row materialization: walk each result row positionally using
//! the compiled plan's index map and build the proposition it encodes.
//!
//! Recovery policy: a cell that fails its declared value type becomes `None`
//! with a warning; a discriminator code with no mapping skips the whole row
//! with a debug log. Neither aborts the query.

use chrono::NaiveDateTime;

use crate::dataspec::entity_spec::{EntitySpec, PropositionKind};
use crate::dataspec::proposition::{Proposition, PropositionBase, UniqueId};
use crate::dataspec::value::{parse_date, Value, ValueType};
use crate::db::{Row, RowCursor};
use crate::sqlgen::ColumnSpecInfo;

use super::cache::ResultCache;
use super::errors::ResultsError;

pub struct MainResultProcessor<'a> {
    entity_spec: &'a EntitySpec,
    info: &'a ColumnSpecInfo,
    backend_id: &'a str,
}

impl<'a> MainResultProcessor<'a> {
    pub fn new(entity_spec: &'a EntitySpec, info: &'a ColumnSpecInfo, backend_id: &'a str) -> Self {
        MainResultProcessor {
            entity_spec,
            info,
            backend_id,
        }
    }

    pub fn key_id_index(&self) -> usize {
        self.info.key_id_index
    }

    /// Materialize one row into `(key id, proposition)`. `Ok(None)` means
    /// the row was skipped.
    pub fn read_row(&self, row: &Row) -> Result<Option<(String, Proposition)>, ResultsError> {
        let key_id = row
            .get(self.info.key_id_index)
            .ok_or(ResultsError::MissingKeyId(self.info.key_id_index))?
            .to_string();
        let Some(prop_id) = self.resolve_proposition_id(row) else {
            return Ok(None);
        };

        let mut base = PropositionBase::new(prop_id, self.read_unique_id(row), self.backend_id);
        if let (Some(idx), Some(value_type)) = (self.info.value_index, self.entity_spec.value_type)
        {
            base.value = self.parse_cell(row.get(idx), value_type, "value");
        }
        for (name, idx) in &self.info.property_indices {
            let Some(property) = self
                .entity_spec
                .property_specs
                .iter()
                .find(|p| &p.name == name)
            else {
                continue;
            };
            base.properties
                .insert(name.clone(), self.parse_cell(row.get(*idx), property.value_type, name));
        }

        let proposition = match self.entity_spec.kind {
            PropositionKind::Constant => Proposition::Constant(base),
            PropositionKind::Primitive => Proposition::Primitive {
                base,
                timestamp: self.read_time(row, self.info.start_time_index, "start"),
            },
            PropositionKind::Event => Proposition::Event {
                start: self.read_time(row, self.info.start_time_index, "start"),
                finish: self.read_time(row, self.info.finish_time_index, "finish"),
                base,
            },
        };
        Ok(Some((key_id, proposition)))
    }

    /// Drain a cursor into the cache. Returns the number of propositions
    /// materialized (merges count once).
    pub fn process(
        &self,
        cursor: &mut dyn RowCursor,
        cache: &mut ResultCache,
    ) -> Result<usize, ResultsError> {
        let mut count = 0;
        while let Some(row) = cursor.next_row()? {
            if let Some((key_id, proposition)) = self.read_row(&row)? {
                cache.insert(&key_id, proposition);
                count += 1;
            }
        }
        log::debug!(
            "Materialized {} rows for entity '{}'",
            count,
            self.entity_spec.name
        );
        Ok(count)
    }

    /// Entities mapping a single proposition id resolve unconditionally.
    /// Otherwise the discriminator cell decides: it is already canonical
    /// when the dialect CASE-translated it, a raw code otherwise, and a row
    /// whose code maps to nothing is skipped.
    fn resolve_proposition_id(&self, row: &Row) -> Option<String> {
        if !self.entity_spec.needs_discriminator() {
            return self.entity_spec.proposition_ids.first().cloned();
        }
        let raw = row.get(self.info.code_index?)?;
        if self.entity_spec.proposition_ids.iter().any(|p| p == raw) {
            return Some(raw.to_string());
        }
        if let Some(mappings) = self
            .entity_spec
            .code_spec
            .as_ref()
            .and_then(|spec| spec.code_mappings.as_ref())
        {
            if let Some(mapping) = mappings.iter().find(|m| m.sql_code == raw) {
                return Some(mapping.proposition_id.clone());
            }
        }
        log::debug!(
            "Skipping row with unmapped code '{}' for entity '{}'",
            raw,
            self.entity_spec.name
        );
        None
    }

    fn read_unique_id(&self, row: &Row) -> UniqueId {
        let parts = self
            .info
            .unique_id_indices
            .get(&self.entity_spec.name)
            .map(|indices| {
                indices
                    .iter()
                    .map(|&idx| row.get(idx).unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default();
        UniqueId::new(self.entity_spec.name.clone(), parts)
    }

    fn parse_cell(&self, raw: Option<&str>, value_type: ValueType, column: &str) -> Option<Value> {
        let raw = raw?;
        match value_type.parse(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!(
                    "Entity '{}', column '{}': {}",
                    self.entity_spec.name,
                    column,
                    err
                );
                None
            }
        }
    }

    fn read_time(&self, row: &Row, idx: Option<usize>, column: &str) -> Option<NaiveDateTime> {
        let raw = row.get(idx?)?;
        let parsed = parse_date(raw.trim());
        if parsed.is_none() {
            log::warn!(
                "Entity '{}', column '{}': cannot parse '{}' as a timestamp",
                self.entity_spec.name,
                column,
                raw
            );
        }
        parsed
    }
}
