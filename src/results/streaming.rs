//! Streaming result assembly: group key-sorted cursors into per-key row
//! batches, materialize and wire each key's propositions, and emit one
//! [`DataStreamingEvent`] per key.
//!
//! Every statement orders by key id, so the main cursor and each reference
//! cursor can be advanced in lock step, holding at most one key's rows in
//! memory at a time.

use std::collections::HashMap;

use crate::dataspec::proposition::{Proposition, UniqueId};
use crate::db::{DataReadError, Row, RowCursor};

use super::cache::ResultCache;
use super::errors::ResultsError;
use super::main_processor::MainResultProcessor;
use super::ref_processor::RefResultProcessor;

/// One key's fully assembled, fully wired batch.
#[derive(Debug)]
pub struct DataStreamingEvent {
    pub key_id: String,
    pub propositions: Vec<Proposition>,
    /// Owner unique id → referenced unique ids.
    pub forward_refs: HashMap<UniqueId, Vec<UniqueId>>,
    /// Referenced unique id → owner unique ids.
    pub backward_refs: HashMap<UniqueId, Vec<UniqueId>>,
}

impl DataStreamingEvent {
    /// Flatten a (single- or multi-key) cache into one event, deriving the
    /// reference maps from the wired propositions.
    pub fn from_cache(key_id: String, cache: ResultCache) -> Self {
        let mut propositions = Vec::new();
        for (_, props) in cache.into_key_groups() {
            propositions.extend(props);
        }
        let mut forward_refs: HashMap<UniqueId, Vec<UniqueId>> = HashMap::new();
        let mut backward_refs: HashMap<UniqueId, Vec<UniqueId>> = HashMap::new();
        for proposition in &propositions {
            let owner = proposition.unique_id();
            for targets in proposition.base().references.values() {
                for target in targets {
                    forward_refs
                        .entry(owner.clone())
                        .or_default()
                        .push(target.clone());
                    backward_refs
                        .entry(target.clone())
                        .or_default()
                        .push(owner.clone());
                }
            }
        }
        DataStreamingEvent {
            key_id,
            propositions,
            forward_refs,
            backward_refs,
        }
    }
}

/// Lookahead grouping of a key-sorted cursor into `(key id, rows)` runs.
pub struct KeyGroupCursor<'a> {
    cursor: Box<dyn RowCursor + 'a>,
    key_index: usize,
    lookahead: Option<Row>,
}

impl<'a> KeyGroupCursor<'a> {
    pub fn new(cursor: Box<dyn RowCursor + 'a>, key_index: usize) -> Self {
        KeyGroupCursor {
            cursor,
            key_index,
            lookahead: None,
        }
    }

    /// Next maximal run of rows sharing one key id. Relies on the statement's
    /// ORDER BY: a key never reappears after its run ends.
    pub fn next_group(&mut self) -> Result<Option<(String, Vec<Row>)>, DataReadError> {
        let first = match self.lookahead.take() {
            Some(row) => row,
            None => match self.cursor.next_row()? {
                Some(row) => row,
                None => return Ok(None),
            },
        };
        let key = first.get(self.key_index).unwrap_or_default().to_string();
        let mut rows = vec![first];
        while let Some(row) = self.cursor.next_row()? {
            if row.get(self.key_index).unwrap_or_default() == key {
                rows.push(row);
            } else {
                self.lookahead = Some(row);
                break;
            }
        }
        Ok(Some((key, rows)))
    }
}

/// One reference cursor advanced in step with the main cursor.
pub struct ReferencePass<'a> {
    processor: RefResultProcessor<'a>,
    groups: KeyGroupCursor<'a>,
    pending: Option<(String, Vec<Row>)>,
}

impl<'a> ReferencePass<'a> {
    pub fn new(processor: RefResultProcessor<'a>, cursor: Box<dyn RowCursor + 'a>) -> Self {
        let key_index = processor.key_id_index();
        ReferencePass {
            processor,
            groups: KeyGroupCursor::new(cursor, key_index),
            pending: None,
        }
    }

    /// Wire this pass's rows for `key_id` into the cache, if it has any.
    ///
    /// Both statements sort on the same key expression under the same
    /// restriction, so a pending reference group sorting before the current
    /// main key identifies owners the main pass never produced.
    fn apply(&mut self, key_id: &str, cache: &mut ResultCache) -> Result<(), ResultsError> {
        if self.pending.is_none() {
            self.pending = self.groups.next_group()?;
        }
        let Some((pending_key, rows)) = self.pending.take() else {
            return Ok(());
        };
        if pending_key.as_str() > key_id {
            // Future key; hold the group until the main cursor gets there.
            // Byte-wise comparison, so the statements' ORDER BY must sort
            // key ids under a binary collation.
            self.pending = Some((pending_key, rows));
            return Ok(());
        }
        if pending_key != key_id {
            return self.orphaned_group_error(&pending_key, &rows);
        }
        for row in &rows {
            self.processor.apply_row(row, cache)?;
        }
        Ok(())
    }

    /// Raise the consistency failure for a group whose key the main pass
    /// never delivered. Rows that carry no reference are ignored.
    fn orphaned_group_error(&self, key_id: &str, rows: &[Row]) -> Result<(), ResultsError> {
        for row in rows {
            if let Some((_, owner, _)) = self.processor.read_row(row)? {
                return Err(ResultsError::MissingReferenceOwner {
                    reference: self.processor.reference_name().to_string(),
                    owner: owner.to_string(),
                    key_id: key_id.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Check for leftover groups once the main cursor is exhausted.
    fn finish(&mut self) -> Result<(), ResultsError> {
        loop {
            if self.pending.is_none() {
                self.pending = self.groups.next_group()?;
            }
            let Some((key, rows)) = self.pending.take() else {
                return Ok(());
            };
            self.orphaned_group_error(&key, &rows)?;
        }
    }
}

/// Drives one entity's main cursor and its reference cursors key by key.
pub struct StreamingAssembler<'a> {
    main: MainResultProcessor<'a>,
    main_groups: KeyGroupCursor<'a>,
    references: Vec<ReferencePass<'a>>,
}

impl<'a> StreamingAssembler<'a> {
    pub fn new(
        main: MainResultProcessor<'a>,
        main_cursor: Box<dyn RowCursor + 'a>,
        references: Vec<ReferencePass<'a>>,
    ) -> Self {
        let key_index = main.key_id_index();
        StreamingAssembler {
            main,
            main_groups: KeyGroupCursor::new(main_cursor, key_index),
            references,
        }
    }

    /// Assemble the next key's event, or `None` once all cursors drain.
    pub fn next_event(&mut self) -> Result<Option<DataStreamingEvent>, ResultsError> {
        let Some((key_id, rows)) = self.main_groups.next_group()? else {
            for pass in &mut self.references {
                pass.finish()?;
            }
            return Ok(None);
        };
        let mut cache = ResultCache::new();
        for row in &rows {
            if let Some((row_key, proposition)) = self.main.read_row(row)? {
                cache.insert(&row_key, proposition);
            }
        }
        for pass in &mut self.references {
            pass.apply(&key_id, &mut cache)?;
        }
        Ok(Some(DataStreamingEvent::from_cache(key_id, cache)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::dataspec::entity_spec::{
        Cardinality, ColumnSpec, EntitySpec, JoinHop, PropositionKind, ReferenceSpec,
    };
    use crate::dataspec::value::ValueType;
    use crate::db::VecCursor;
    use crate::sqlgen::ColumnSpecInfoFactory;

    fn hop(from: &str, fcol: &str, to: &str, tcol: &str) -> JoinHop {
        JoinHop {
            from_table: from.to_string(),
            from_column: fcol.to_string(),
            to_table: to.to_string(),
            to_column: tcol.to_string(),
        }
    }

    fn lab() -> EntitySpec {
        EntitySpec {
            name: "Lab".to_string(),
            proposition_ids: vec!["LAB".to_string()],
            kind: PropositionKind::Primitive,
            base_spec: ColumnSpec::new("PATIENT", "id")
                .with_joins(vec![hop("LAB", "patient_id", "PATIENT", "id")]),
            unique_id_specs: vec![ColumnSpec::new("LAB", "lab_id")],
            code_spec: None,
            value_spec: Some(ColumnSpec::new("LAB", "value")),
            value_type: Some(ValueType::Number),
            start_time_spec: Some(ColumnSpec::new("LAB", "time")),
            finish_time_spec: None,
            property_specs: vec![],
            reference_specs: vec![ReferenceSpec {
                name: "patient".to_string(),
                target_entity: "Patient".to_string(),
                path: vec![hop("LAB", "patient_id", "PATIENT", "id")],
                cardinality: Cardinality::One,
                apply_constraints: true,
            }],
        }
    }

    fn patient() -> EntitySpec {
        EntitySpec {
            name: "Patient".to_string(),
            proposition_ids: vec!["PATIENT".to_string()],
            kind: PropositionKind::Constant,
            base_spec: ColumnSpec::new("PATIENT", "id"),
            unique_id_specs: vec![ColumnSpec::new("PATIENT", "id")],
            code_spec: None,
            value_spec: None,
            value_type: None,
            start_time_spec: None,
            finish_time_spec: None,
            property_specs: vec![],
            reference_specs: vec![],
        }
    }

    fn rows(data: &[&[Option<&str>]]) -> Box<dyn RowCursor + 'static> {
        Box::new(VecCursor::new(
            data.iter()
                .map(|cells| Row(cells.iter().map(|c| c.map(str::to_string)).collect()))
                .collect(),
        ))
    }

    #[test]
    fn groups_key_sorted_rows() {
        let cursor = rows(&[
            &[Some("P1"), Some("a")],
            &[Some("P1"), Some("b")],
            &[Some("P2"), Some("c")],
        ]);
        let mut groups = KeyGroupCursor::new(cursor, 0);
        let (key, batch) = groups.next_group().unwrap().unwrap();
        assert_eq!(key, "P1");
        assert_eq!(batch.len(), 2);
        let (key, batch) = groups.next_group().unwrap().unwrap();
        assert_eq!(key, "P2");
        assert_eq!(batch.len(), 1);
        assert!(groups.next_group().unwrap().is_none());
    }

    #[test]
    fn assembles_wired_events_key_by_key() {
        let lab = lab();
        let patient = patient();
        let prop_ids: HashSet<String> = ["LAB".to_string()].into();
        let main_info =
            ColumnSpecInfoFactory::compile(&prop_ids, &lab, &[&lab, &patient], &[]).unwrap();
        let ref_info = ColumnSpecInfoFactory::compile_reference(
            &lab,
            &lab.reference_specs[0],
            &patient,
            &prop_ids,
            &[],
        )
        .unwrap();

        // Main columns: key, lab_id, value, time. Reference columns: key
        // (doubling as the target patient id), lab_id.
        let main_cursor = rows(&[
            &[Some("P1"), Some("L1"), Some("7"), None],
            &[Some("P1"), Some("L2"), Some("9"), None],
            &[Some("P2"), Some("L3"), Some("10"), None],
        ]);
        let ref_cursor = rows(&[
            &[Some("P1"), Some("L1")],
            &[Some("P1"), Some("L2")],
            &[Some("P2"), Some("L3")],
        ]);

        let main = MainResultProcessor::new(&lab, &main_info, "clinical-db");
        let ref_processor =
            RefResultProcessor::new(&lab, &lab.reference_specs[0], &patient, &ref_info);
        let mut assembler = StreamingAssembler::new(
            main,
            main_cursor,
            vec![ReferencePass::new(ref_processor, ref_cursor)],
        );

        let first = assembler.next_event().unwrap().unwrap();
        assert_eq!(first.key_id, "P1");
        assert_eq!(first.propositions.len(), 2);
        let patient_uid = UniqueId::new("Patient", vec!["P1".to_string()]);
        for prop in &first.propositions {
            assert_eq!(prop.base().references["patient"], vec![patient_uid.clone()]);
        }
        assert_eq!(first.backward_refs[&patient_uid].len(), 2);

        let second = assembler.next_event().unwrap().unwrap();
        assert_eq!(second.key_id, "P2");
        assert_eq!(second.propositions.len(), 1);

        assert!(assembler.next_event().unwrap().is_none());
    }

    #[test]
    fn reference_row_without_owner_aborts() {
        let lab = lab();
        let patient = patient();
        let prop_ids: HashSet<String> = ["LAB".to_string()].into();
        let main_info =
            ColumnSpecInfoFactory::compile(&prop_ids, &lab, &[&lab, &patient], &[]).unwrap();
        let ref_info = ColumnSpecInfoFactory::compile_reference(
            &lab,
            &lab.reference_specs[0],
            &patient,
            &prop_ids,
            &[],
        )
        .unwrap();

        let main_cursor = rows(&[&[Some("P1"), Some("L1"), Some("7"), None]]);
        // L9 never appears in the main pass.
        let ref_cursor = rows(&[&[Some("P1"), Some("L9")]]);

        let main = MainResultProcessor::new(&lab, &main_info, "clinical-db");
        let ref_processor =
            RefResultProcessor::new(&lab, &lab.reference_specs[0], &patient, &ref_info);
        let mut assembler = StreamingAssembler::new(
            main,
            main_cursor,
            vec![ReferencePass::new(ref_processor, ref_cursor)],
        );

        assert!(matches!(
            assembler.next_event(),
            Err(ResultsError::MissingReferenceOwner { .. })
        ));
    }

    #[test]
    fn leftover_reference_group_aborts_at_end_of_stream() {
        let lab = lab();
        let patient = patient();
        let prop_ids: HashSet<String> = ["LAB".to_string()].into();
        let main_info =
            ColumnSpecInfoFactory::compile(&prop_ids, &lab, &[&lab, &patient], &[]).unwrap();
        let ref_info = ColumnSpecInfoFactory::compile_reference(
            &lab,
            &lab.reference_specs[0],
            &patient,
            &prop_ids,
            &[],
        )
        .unwrap();

        let main_cursor = rows(&[&[Some("P1"), Some("L1"), Some("7"), None]]);
        let ref_cursor = rows(&[
            &[Some("P1"), Some("L1")],
            // P9 has no main-pass rows at all.
            &[Some("P9"), Some("L9")],
        ]);

        let main = MainResultProcessor::new(&lab, &main_info, "clinical-db");
        let ref_processor =
            RefResultProcessor::new(&lab, &lab.reference_specs[0], &patient, &ref_info);
        let mut assembler = StreamingAssembler::new(
            main,
            main_cursor,
            vec![ReferencePass::new(ref_processor, ref_cursor)],
        );

        assembler.next_event().unwrap().unwrap();
        assert!(matches!(
            assembler.next_event(),
            Err(ResultsError::MissingReferenceOwner { key_id, .. }) if key_id == "P9"
        ));
    }
}
