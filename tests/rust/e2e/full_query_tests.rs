//! Full system flow: load a multi-entity catalog, execute a filtered query
//! over an embedded database, and verify the streamed batches and the cached
//! read agree.

#[cfg(test)]
mod full_query {
    use propstream::dataspec::{
        Comparator, DataSourceCatalog, Filter, UniqueId, Value, ValueFilter,
    };
    use propstream::db::{RowSource, SqliteRowSource};
    use propstream::executor::{CancelFlag, CollectingHandler, QueryExecutor, QueryRequest};
    use propstream::sqlgen::SqlOrder;

    const CATALOG: &str = r#"
backend_id: clinical-dw
dialect: sqlite
entities:
  - name: Patient
    proposition_ids: [PATIENT]
    kind: constant
    base_spec: { table: PATIENT, column: id }
    unique_id_specs:
      - { table: PATIENT, column: id }
    property_specs:
      - name: gender
        spec: { table: PATIENT, column: gender }
        value_type: nominal
  - name: Encounter
    proposition_ids: [ENCOUNTER]
    kind: event
    base_spec:
      joins:
        - { from_table: ENCOUNTER, from_column: patient_id,
            to_table: PATIENT, to_column: id }
      table: PATIENT
      column: id
    unique_id_specs:
      - { table: ENCOUNTER, column: encounter_id }
    start_time_spec: { table: ENCOUNTER, column: admit_dt }
    finish_time_spec: { table: ENCOUNTER, column: discharge_dt }
    reference_specs:
      - name: patient
        target_entity: Patient
        path:
          - { from_table: ENCOUNTER, from_column: patient_id,
              to_table: PATIENT, to_column: id }
        cardinality: one
  - name: Lab
    proposition_ids: [LAB]
    kind: primitive
    base_spec:
      joins:
        - { from_table: LAB, from_column: patient_id,
            to_table: PATIENT, to_column: id }
      table: PATIENT
      column: id
    unique_id_specs:
      - { table: LAB, column: lab_id }
    value_spec: { table: LAB, column: value }
    value_type: number
    start_time_spec: { table: LAB, column: time }
"#;

    fn seeded_source() -> SqliteRowSource {
        let source = SqliteRowSource::open_in_memory().unwrap();
        source
            .execute(
                "CREATE TABLE PATIENT (id TEXT, gender TEXT);
                 CREATE TABLE ENCOUNTER (encounter_id TEXT, patient_id TEXT,
                                         admit_dt TEXT, discharge_dt TEXT);
                 CREATE TABLE LAB (lab_id TEXT, patient_id TEXT, value REAL, time TEXT);
                 INSERT INTO PATIENT VALUES ('P1', 'F'), ('P2', 'M'), ('P3', 'F');
                 INSERT INTO ENCOUNTER VALUES
                   ('E1', 'P1', '2013-04-01 08:00:00', '2013-04-03 12:00:00'),
                   ('E2', 'P2', '2013-05-10 09:00:00', '2013-05-11 10:00:00');
                 INSERT INTO LAB VALUES
                   ('L1', 'P1', 7, '2013-04-01 09:00:00'),
                   ('L2', 'P1', 9, '2013-04-02 09:00:00'),
                   ('L3', 'P2', 10, '2013-05-10 11:00:00'),
                   ('L4', 'P2', 3, '2013-05-10 12:00:00'),
                   ('L5', 'P3', 50, '2013-06-01 09:00:00');",
            )
            .unwrap();
        source
    }

    fn request() -> QueryRequest {
        QueryRequest {
            query_id: "e2e".to_string(),
            prop_ids: [
                "PATIENT".to_string(),
                "ENCOUNTER".to_string(),
                "LAB".to_string(),
            ]
            .into(),
            key_ids: vec!["P1".to_string(), "P2".to_string()],
            filters: vec![Filter::Value(ValueFilter {
                proposition_ids: vec!["LAB".to_string()],
                comparator: Comparator::Gt,
                value: Value::Number(5.0),
            })],
            order: Some(SqlOrder::Ascending),
        }
    }

    #[test]
    fn streams_the_full_clinical_query() {
        let catalog = DataSourceCatalog::from_yaml_str(CATALOG).unwrap();
        let source = seeded_source();
        let executor = QueryExecutor::new(&catalog, &source);
        let mut handler = CollectingHandler::default();
        executor
            .execute_streaming(&request(), &mut handler, &CancelFlag::new())
            .unwrap();
        assert!(handler.finished);

        // One pass per entity, one event per key within a pass: Patient and
        // Encounter and Lab each over P1 and P2.
        assert_eq!(handler.events.len(), 6);
        for pair in handler.events.chunks(2) {
            assert_eq!(pair[0].key_id, "P1");
            assert_eq!(pair[1].key_id, "P2");
        }

        let lab_values: Vec<f64> = handler
            .events
            .iter()
            .flat_map(|e| &e.propositions)
            .filter(|p| p.base().id == "LAB")
            .filter_map(|p| p.base().value.as_ref().and_then(Value::as_number))
            .collect();
        // L4 fails the value filter; L5 belongs to a key outside the set.
        assert_eq!(lab_values, vec![7.0, 9.0, 10.0]);

        let encounters: Vec<_> = handler
            .events
            .iter()
            .flat_map(|e| &e.propositions)
            .filter(|p| p.base().id == "ENCOUNTER")
            .collect();
        assert_eq!(encounters.len(), 2);
        for encounter in encounters {
            assert!(encounter.start().is_some());
            assert_eq!(encounter.base().references["patient"].len(), 1);
        }

        let p1_patient_event = handler
            .events
            .iter()
            .find(|e| {
                e.key_id == "P1" && e.propositions.iter().any(|p| p.base().id == "PATIENT")
            })
            .unwrap();
        let patient = &p1_patient_event.propositions[0];
        assert_eq!(
            patient.base().properties["gender"],
            Some(Value::Nominal("F".to_string()))
        );
        assert_eq!(patient.base().provenance.backend_id, "clinical-dw");
    }

    #[test]
    fn cached_read_matches_the_streamed_result() {
        let catalog = DataSourceCatalog::from_yaml_str(CATALOG).unwrap();
        let source = seeded_source();
        let executor = QueryExecutor::new(&catalog, &source);

        let mut handler = CollectingHandler::default();
        executor
            .execute_streaming(&request(), &mut handler, &CancelFlag::new())
            .unwrap();
        let streamed: usize = handler.events.iter().map(|e| e.propositions.len()).sum();

        let cache = executor.read_into_cache(&request()).unwrap();
        assert_eq!(cache.len(), streamed);

        // The wired reference is identical in both modes.
        let e1 = cache
            .get("P1", &UniqueId::new("Encounter", vec!["E1".to_string()]))
            .unwrap();
        assert_eq!(
            e1.base().references["patient"],
            vec![UniqueId::new("Patient", vec!["P1".to_string()])]
        );
    }
}
