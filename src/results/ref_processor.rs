//! Reference-pass row processing: each row names an owner proposition and
//! the target it references; the target's unique id is appended to the
//! owner's named reference slot in the cache.
//!
//! The owner must already be cached by a main pass. A row naming an owner
//! no main pass produced is a consistency failure and aborts the query,
//! never a silent drop.

use crate::dataspec::entity_spec::{EntitySpec, ReferenceSpec};
use crate::dataspec::proposition::UniqueId;
use crate::db::{Row, RowCursor};
use crate::sqlgen::ColumnSpecInfo;

use super::cache::ResultCache;
use super::errors::ResultsError;

pub struct RefResultProcessor<'a> {
    entity_spec: &'a EntitySpec,
    reference_spec: &'a ReferenceSpec,
    target: &'a EntitySpec,
    info: &'a ColumnSpecInfo,
}

impl<'a> RefResultProcessor<'a> {
    pub fn new(
        entity_spec: &'a EntitySpec,
        reference_spec: &'a ReferenceSpec,
        target: &'a EntitySpec,
        info: &'a ColumnSpecInfo,
    ) -> Self {
        RefResultProcessor {
            entity_spec,
            reference_spec,
            target,
            info,
        }
    }

    pub fn key_id_index(&self) -> usize {
        self.info.key_id_index
    }

    pub fn reference_name(&self) -> &str {
        &self.reference_spec.name
    }

    /// Decode one row into `(key id, owner unique id, target unique id)`.
    /// A row whose target id columns are all NULL carries no reference and
    /// is skipped.
    pub fn read_row(
        &self,
        row: &Row,
    ) -> Result<Option<(String, UniqueId, UniqueId)>, ResultsError> {
        let key_id = row
            .get(self.info.key_id_index)
            .ok_or(ResultsError::MissingKeyId(self.info.key_id_index))?
            .to_string();
        let owner = self.read_uid(row, &self.entity_spec.name, &self.info.owner_id_indices);
        let target_indices = &self.info.reference_indices[&self.reference_spec.name];
        if target_indices.iter().all(|&idx| row.get(idx).is_none()) {
            return Ok(None);
        }
        let target = self.read_uid(row, &self.target.name, target_indices);
        Ok(Some((key_id, owner, target)))
    }

    /// Wire one row's reference into the cache.
    pub fn apply_row(&self, row: &Row, cache: &mut ResultCache) -> Result<(), ResultsError> {
        let Some((key_id, owner, target)) = self.read_row(row)? else {
            return Ok(());
        };
        let Some(proposition) = cache.get_mut(&key_id, &owner) else {
            return Err(ResultsError::MissingReferenceOwner {
                reference: self.reference_spec.name.clone(),
                owner: owner.to_string(),
                key_id,
            });
        };
        let base = proposition.base_mut();
        let slot = base
            .references
            .entry(self.reference_spec.name.clone())
            .or_default();
        // Join multiplicity can repeat a pairing within one pass.
        if !slot.contains(&target) {
            slot.push(target);
        }
        Ok(())
    }

    /// Drain a cursor against an already-populated cache.
    pub fn process(
        &self,
        cursor: &mut dyn RowCursor,
        cache: &mut ResultCache,
    ) -> Result<usize, ResultsError> {
        let mut count = 0;
        while let Some(row) = cursor.next_row()? {
            self.apply_row(&row, cache)?;
            count += 1;
        }
        log::debug!(
            "Applied {} reference rows for '{}' on entity '{}'",
            count,
            self.reference_spec.name,
            self.entity_spec.name
        );
        Ok(count)
    }

    fn read_uid(&self, row: &Row, entity_name: &str, indices: &[usize]) -> UniqueId {
        let parts = indices
            .iter()
            .map(|&idx| row.get(idx).unwrap_or_default().to_string())
            .collect();
        UniqueId::new(entity_name.to_string(), parts)
    }
}
