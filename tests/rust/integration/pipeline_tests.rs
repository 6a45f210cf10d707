//! Integration tests for the streaming pipeline: backpressure, ordering,
//! and failure propagation between the producer and consumer sides.

#[cfg(test)]
mod pipeline {
    use propstream::dataspec::DataSourceCatalog;
    use propstream::db::{RowSource, SqliteRowSource};
    use propstream::executor::{
        BatchHandler, CancelFlag, CollectingHandler, ExecutorConfig, ExecutorError, HandlerError,
        QueryExecutor, QueryRequest,
    };
    use propstream::results::DataStreamingEvent;
    use propstream::sqlgen::SqlOrder;

    const CATALOG: &str = r#"
backend_id: clinical-db
dialect: sqlite
entities:
  - name: Vital
    proposition_ids: [VITAL]
    kind: primitive
    base_spec: { table: VITAL, column: patient_id }
    unique_id_specs:
      - { table: VITAL, column: vital_id }
    value_spec: { table: VITAL, column: value }
    value_type: number
    start_time_spec: { table: VITAL, column: time }
"#;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn seeded_source(patients: usize, vitals_per_patient: usize) -> SqliteRowSource {
        let source = SqliteRowSource::open_in_memory().unwrap();
        source
            .execute("CREATE TABLE VITAL (vital_id TEXT, patient_id TEXT, value REAL, time TEXT)")
            .unwrap();
        for p in 0..patients {
            for v in 0..vitals_per_patient {
                source
                    .connection()
                    .execute(
                        "INSERT INTO VITAL VALUES (?1, ?2, ?3, ?4)",
                        rusqlite::params![
                            format!("V{}_{}", p, v),
                            format!("P{:04}", p),
                            98.6,
                            "2013-04-01 08:00:00"
                        ],
                    )
                    .unwrap();
            }
        }
        source
    }

    fn request(keys: usize) -> QueryRequest {
        QueryRequest {
            query_id: "pipeline-test".to_string(),
            prop_ids: ["VITAL".to_string()].into(),
            key_ids: (0..keys).map(|p| format!("P{:04}", p)).collect(),
            filters: vec![],
            order: Some(SqlOrder::Ascending),
        }
    }

    #[test]
    fn small_queue_capacity_still_delivers_every_batch() {
        init_logging();
        let catalog = DataSourceCatalog::from_yaml_str(CATALOG).unwrap();
        let source = seeded_source(50, 3);
        let executor = QueryExecutor::new(&catalog, &source).with_config(ExecutorConfig {
            queue_capacity: 2,
            wrap_key_id: false,
        });
        let mut handler = CollectingHandler::default();
        executor
            .execute_streaming(&request(50), &mut handler, &CancelFlag::new())
            .unwrap();
        assert_eq!(handler.events.len(), 50);
        assert!(handler.events.iter().all(|e| e.propositions.len() == 3));
    }

    #[test]
    fn batches_arrive_key_contiguous_and_sorted() {
        let catalog = DataSourceCatalog::from_yaml_str(CATALOG).unwrap();
        let source = seeded_source(10, 2);
        let executor = QueryExecutor::new(&catalog, &source);
        let mut handler = CollectingHandler::default();
        executor
            .execute_streaming(&request(10), &mut handler, &CancelFlag::new())
            .unwrap();
        let keys: Vec<&str> = handler.events.iter().map(|e| e.key_id.as_str()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup();
        // One event per key, in the statement's key order.
        assert_eq!(keys, sorted);
    }

    struct FailAtHandler {
        fail_at: usize,
        handled: usize,
    }

    impl BatchHandler for FailAtHandler {
        fn handle_batch(&mut self, _event: DataStreamingEvent) -> Result<(), HandlerError> {
            self.handled += 1;
            if self.handled >= self.fail_at {
                return Err(format!("refused batch {}", self.handled).into());
            }
            Ok(())
        }
    }

    #[test]
    fn first_handler_error_wins_and_unblocks_the_producer() {
        init_logging();
        let catalog = DataSourceCatalog::from_yaml_str(CATALOG).unwrap();
        let source = seeded_source(200, 1);
        // Tiny queue so the producer is actively blocked when the failure
        // hits; teardown must still complete.
        let executor = QueryExecutor::new(&catalog, &source).with_config(ExecutorConfig {
            queue_capacity: 1,
            wrap_key_id: false,
        });
        let mut handler = FailAtHandler {
            fail_at: 3,
            handled: 0,
        };
        let result = executor.execute_streaming(&request(200), &mut handler, &CancelFlag::new());
        assert!(matches!(
            result,
            Err(ExecutorError::Handler(msg)) if msg.contains("refused batch 3")
        ));
    }
}
