//! Integration tests for SQL generation driven by a YAML catalog: dialect
//! surfaces, code translation, and the reference-pass statements.

#[cfg(test)]
mod statement_generation {
    use std::collections::HashSet;

    use propstream::dataspec::{
        Comparator, DataSourceCatalog, Filter, Value, ValueFilter,
    };
    use propstream::sqlgen::{ReferenceStatement, SelectStatement, SqlOrder};

    const LAB_CATALOG: &str = r#"
backend_id: clinical-db
dialect: ansi
entities:
  - name: Patient
    proposition_ids: [PATIENT]
    kind: constant
    base_spec: { table: PATIENT, column: id }
    unique_id_specs:
      - { table: PATIENT, column: id }
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
    reference_specs:
      - name: patient
        target_entity: Patient
        path:
          - { from_table: LAB, from_column: patient_id,
              to_table: PATIENT, to_column: id }
        cardinality: one
"#;

    const DIAGNOSIS_CATALOG: &str = r#"
backend_id: clinical-db
dialect: mysql
entities:
  - name: Diagnosis
    proposition_ids: ["ICD9:250.00", "ICD9:401.9"]
    kind: event
    base_spec:
      joins:
        - { from_table: DIAGNOSIS, from_column: patient_id,
            to_table: PATIENT, to_column: id }
      table: PATIENT
      column: id
    unique_id_specs:
      - { table: DIAGNOSIS, column: dx_id }
    code_spec:
      table: DIAGNOSIS
      column: code
      code_mappings:
        - { proposition_id: "ICD9:250.00", sql_code: "25000" }
        - { proposition_id: "ICD9:401.9", sql_code: "4019" }
    start_time_spec: { table: DIAGNOSIS, column: start_dt }
    finish_time_spec: { table: DIAGNOSIS, column: end_dt }
  - name: Patient
    proposition_ids: [PATIENT]
    kind: constant
    base_spec: { table: PATIENT, column: id }
    unique_id_specs:
      - { table: PATIENT, column: id }
"#;

    fn requested(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn catalog_loads_from_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(&path, LAB_CATALOG).unwrap();
        let catalog = DataSourceCatalog::from_yaml_file(&path).unwrap();
        assert_eq!(catalog.backend_id(), "clinical-db");
        assert!(catalog.entity("Lab").is_some());
        assert!(catalog.entity_for_proposition("LAB").is_some());
    }

    #[test]
    fn filtered_lab_query_statement_shape() {
        let catalog = DataSourceCatalog::from_yaml_str(LAB_CATALOG).unwrap();
        let lab = catalog.entity("Lab").unwrap();
        let prop_ids = requested(&["LAB"]);
        let filters = vec![Filter::Value(ValueFilter {
            proposition_ids: vec!["LAB".to_string()],
            comparator: Comparator::Gt,
            value: Value::Number(5.0),
        })];
        let key_ids = vec!["P1".to_string(), "P2".to_string()];
        let (sql, info) = SelectStatement {
            entity_spec: lab,
            entity_specs: catalog.related_entities(lab),
            filters: &filters,
            prop_ids: &prop_ids,
            key_ids: &key_ids,
            order: Some(SqlOrder::Ascending),
            dialect: catalog.dialect().dialect(),
            wrap_key_id: false,
            staging: &[],
        }
        .generate()
        .unwrap();
        assert_eq!(
            sql,
            "SELECT a1.id, a0.lab_id, a0.value, a0.time \
             FROM LAB a0 JOIN PATIENT a1 ON a0.patient_id = a1.id \
             WHERE a1.id IN ('P1', 'P2') AND a0.value > 5 \
             ORDER BY a1.id, a0.time ASC"
        );
        assert_eq!(info.key_id_index, 0);
        assert_eq!(info.unique_id_indices["Lab"], vec![1]);
    }

    #[test]
    fn reference_statement_restricts_like_the_main_pass() {
        let catalog = DataSourceCatalog::from_yaml_str(LAB_CATALOG).unwrap();
        let lab = catalog.entity("Lab").unwrap();
        let patient = catalog.entity("Patient").unwrap();
        let prop_ids = requested(&["LAB", "PATIENT"]);
        let filters = vec![Filter::Value(ValueFilter {
            proposition_ids: vec!["LAB".to_string()],
            comparator: Comparator::Gt,
            value: Value::Number(5.0),
        })];
        let key_ids = vec!["P1".to_string()];
        let (sql, info) = ReferenceStatement {
            entity_spec: lab,
            reference_spec: &lab.reference_specs[0],
            target: patient,
            prop_ids: &prop_ids,
            filters: &filters,
            key_ids: &key_ids,
            dialect: catalog.dialect().dialect(),
            wrap_key_id: false,
            staging: &[],
        }
        .generate()
        .unwrap();
        assert_eq!(
            sql,
            "SELECT a1.id, a0.lab_id, a0.value \
             FROM LAB a0 JOIN PATIENT a1 ON a0.patient_id = a1.id \
             WHERE a1.id IN ('P1') AND a0.value > 5 ORDER BY a1.id"
        );
        // Target patient id collapses onto the key-id column.
        assert_eq!(info.reference_indices["patient"], vec![0]);
    }

    #[test]
    fn mysql_dialect_wraps_key_and_quotes_tables() {
        let catalog = DataSourceCatalog::from_yaml_str(DIAGNOSIS_CATALOG).unwrap();
        let diagnosis = catalog.entity("Diagnosis").unwrap();
        let prop_ids = requested(&["ICD9:250.00", "ICD9:401.9"]);
        let (sql, _) = SelectStatement {
            entity_spec: diagnosis,
            entity_specs: catalog.related_entities(diagnosis),
            filters: &[],
            prop_ids: &prop_ids,
            key_ids: &[],
            order: None,
            dialect: catalog.dialect().dialect(),
            wrap_key_id: true,
            staging: &[],
        }
        .generate()
        .unwrap();
        assert!(sql.starts_with("SELECT CONVERT(a1.id, CHAR)"), "{}", sql);
        assert!(sql.contains("FROM `DIAGNOSIS` a0 JOIN `PATIENT` a1"), "{}", sql);
    }

    #[test]
    fn discriminator_codes_are_translated_and_restricted() {
        let catalog = DataSourceCatalog::from_yaml_str(DIAGNOSIS_CATALOG).unwrap();
        let diagnosis = catalog.entity("Diagnosis").unwrap();
        // Only one of the two mapped ids requested.
        let prop_ids = requested(&["ICD9:250.00"]);
        let (sql, info) = SelectStatement {
            entity_spec: diagnosis,
            entity_specs: catalog.related_entities(diagnosis),
            filters: &[],
            prop_ids: &prop_ids,
            key_ids: &[],
            order: None,
            dialect: catalog.dialect().dialect(),
            wrap_key_id: false,
            staging: &[],
        }
        .generate()
        .unwrap();
        assert!(
            sql.contains("CASE a0.code WHEN '25000' THEN 'ICD9:250.00' ELSE a0.code END"),
            "{}",
            sql
        );
        assert!(sql.contains("WHERE a0.code IN ('25000')"), "{}", sql);
        assert!(info.code_index.is_some());
    }
}
