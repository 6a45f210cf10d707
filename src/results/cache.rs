//! Keyed proposition store shared by the result-processing passes.
//!
//! Propositions live in an arena indexed by `(key id, unique id)`. Inserting
//! a composite key that already exists merges the new record into the
//! existing one instead of creating a duplicate, which is what lets several
//! passes over overlapping row sets each contribute their slice of the same
//! proposition.

use std::collections::btree_map::Entry;
use std::collections::HashMap;

use crate::dataspec::proposition::{Proposition, UniqueId};

#[derive(Debug, Default)]
pub struct ResultCache {
    arena: Vec<Proposition>,
    index: HashMap<(String, UniqueId), usize>,
    by_key: HashMap<String, Vec<usize>>,
    /// Keys in first-insertion order; the delivery order of cached reads.
    key_order: Vec<String>,
}

impl ResultCache {
    pub fn new() -> Self {
        ResultCache::default()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Insert or merge. Returns the arena slot of the resulting proposition.
    pub fn insert(&mut self, key_id: &str, proposition: Proposition) -> usize {
        let composite = (key_id.to_string(), proposition.unique_id().clone());
        if let Some(&slot) = self.index.get(&composite) {
            merge(&mut self.arena[slot], proposition);
            return slot;
        }
        let slot = self.arena.len();
        self.arena.push(proposition);
        self.index.insert(composite, slot);
        match self.by_key.get_mut(key_id) {
            Some(slots) => slots.push(slot),
            None => {
                self.key_order.push(key_id.to_string());
                self.by_key.insert(key_id.to_string(), vec![slot]);
            }
        }
        slot
    }

    pub fn get(&self, key_id: &str, unique_id: &UniqueId) -> Option<&Proposition> {
        let slot = self
            .index
            .get(&(key_id.to_string(), unique_id.clone()))?;
        self.arena.get(*slot)
    }

    pub fn get_mut(&mut self, key_id: &str, unique_id: &UniqueId) -> Option<&mut Proposition> {
        let slot = *self.index.get(&(key_id.to_string(), unique_id.clone()))?;
        self.arena.get_mut(slot)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.key_order.iter().map(String::as_str)
    }

    pub fn propositions_for_key(&self, key_id: &str) -> impl Iterator<Item = &Proposition> {
        self.by_key
            .get(key_id)
            .into_iter()
            .flatten()
            .map(|&slot| &self.arena[slot])
    }

    /// Consume the cache into `(key id, propositions)` groups, keys in
    /// first-insertion order, propositions in arena (first-row) order.
    pub fn into_key_groups(self) -> Vec<(String, Vec<Proposition>)> {
        let mut slots: Vec<Option<Proposition>> = self.arena.into_iter().map(Some).collect();
        let mut groups = Vec::with_capacity(self.key_order.len());
        for key in self.key_order {
            let indices = self.by_key.get(&key).cloned().unwrap_or_default();
            let props: Vec<Proposition> = indices
                .into_iter()
                .filter_map(|slot| slots[slot].take())
                .collect();
            groups.push((key, props));
        }
        groups
    }
}

/// Merge `incoming` into `existing`: new properties and references are
/// added, already-populated fields keep their first-seen value.
fn merge(existing: &mut Proposition, incoming: Proposition) {
    let incoming = incoming.into_base();
    let base = existing.base_mut();
    for (name, value) in incoming.properties {
        match base.properties.entry(name) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
            Entry::Occupied(mut entry) => {
                if entry.get().is_none() {
                    entry.insert(value);
                }
            }
        }
    }
    for (name, targets) in incoming.references {
        let slot = base.references.entry(name).or_default();
        for target in targets {
            if !slot.contains(&target) {
                slot.push(target);
            }
        }
    }
    if base.value.is_none() {
        base.value = incoming.value;
    }
}
