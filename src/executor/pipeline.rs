//! Query orchestration: compile one main statement (plus reference
//! statements) per matching entity, stream the key-grouped results through a
//! bounded queue to a consumer thread, and tear everything down on the first
//! failure from either side.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::dataspec::catalog::DataSourceCatalog;
use crate::dataspec::entity_spec::EntitySpec;
use crate::dataspec::filter::Filter;
use crate::db::RowSource;
use crate::sqlgen::SqlGenError;
use crate::results::{
    DataStreamingEvent, MainResultProcessor, RefResultProcessor, ReferencePass, ResultCache,
    StreamingAssembler,
};
use crate::sqlgen::{ReferenceStatement, SelectStatement, SqlOrder, StagingSpec};

use super::errors::ExecutorError;
use super::handler::BatchHandler;
use super::queue::{BoundedQueue, DEFAULT_QUEUE_CAPACITY};

/// One query: the proposition ids to reconstruct, restricted to the given
/// key ids, under the given filters.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub query_id: String,
    pub prop_ids: HashSet<String>,
    pub key_ids: Vec<String>,
    pub filters: Vec<Filter>,
    pub order: Option<SqlOrder>,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub queue_capacity: usize,
    /// Wrap the selected key-id column in the dialect's to-text conversion.
    /// Needed when the key column is not a character type.
    pub wrap_key_id: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            wrap_key_id: false,
        }
    }
}

/// Cooperative cancellation shared between the caller and a running query.
/// Checked between batches; a cancelled query stops after the in-flight key.
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Idle,
    Initializing,
    Running,
    Draining,
    Closed,
    Failed,
}

/// Failed is absorbing; everything else advances.
fn transition(state: &mut PipelineState, next: PipelineState, query_id: &str) {
    if *state == PipelineState::Failed {
        return;
    }
    log::debug!("Query '{}': {:?} -> {:?}", query_id, *state, next);
    *state = next;
}

enum QueueItem {
    Batch(DataStreamingEvent),
    Done,
}

pub struct QueryExecutor<'a> {
    catalog: &'a DataSourceCatalog,
    source: &'a dyn RowSource,
    config: ExecutorConfig,
    staging: Vec<StagingSpec>,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(catalog: &'a DataSourceCatalog, source: &'a dyn RowSource) -> Self {
        QueryExecutor {
            catalog,
            source,
            config: ExecutorConfig::default(),
            staging: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_staging(mut self, staging: Vec<StagingSpec>) -> Self {
        self.staging = staging;
        self
    }

    /// Streaming execution: this thread reads rows and assembles per-key
    /// batches; a consumer thread drains them into the handler through a
    /// bounded queue. Returns after both sides have shut down.
    pub fn execute_streaming(
        &self,
        request: &QueryRequest,
        handler: &mut dyn BatchHandler,
        cancel: &CancelFlag,
    ) -> Result<(), ExecutorError> {
        let mut state = PipelineState::Idle;
        transition(&mut state, PipelineState::Initializing, &request.query_id);
        self.validate(request)?;
        self.prepare_staging(request)?;
        handler
            .start()
            .map_err(|err| ExecutorError::Handler(err.to_string()))?;

        let queue: BoundedQueue<QueueItem> = BoundedQueue::new(self.config.queue_capacity);
        let first_error: Mutex<Option<ExecutorError>> = Mutex::new(None);

        transition(&mut state, PipelineState::Running, &request.query_id);
        std::thread::scope(|scope| {
            scope.spawn(|| loop {
                match queue.take() {
                    QueueItem::Done => break,
                    QueueItem::Batch(event) => {
                        if first_error.lock().is_some() {
                            // Already failed; drain to unblock the producer.
                            continue;
                        }
                        if let Err(err) = handler.handle_batch(event) {
                            record_first(&first_error, ExecutorError::Handler(err.to_string()));
                        }
                    }
                }
            });

            if let Err(err) = self.produce(request, &queue, &first_error, cancel) {
                record_first(&first_error, err);
            }
            // The sentinel must get through even when the queue is full.
            queue.force_put(QueueItem::Done);
        });

        transition(&mut state, PipelineState::Draining, &request.query_id);
        if let Some(err) = first_error.into_inner() {
            transition(&mut state, PipelineState::Failed, &request.query_id);
            log::warn!("Query '{}' failed: {}", request.query_id, err);
            return Err(err);
        }
        handler
            .finish()
            .map_err(|err| ExecutorError::Handler(err.to_string()))?;
        transition(&mut state, PipelineState::Closed, &request.query_id);
        Ok(())
    }

    /// Cached execution: every entity's propositions and references merged
    /// into one in-memory cache.
    pub fn read_into_cache(&self, request: &QueryRequest) -> Result<ResultCache, ExecutorError> {
        self.validate(request)?;
        self.prepare_staging(request)?;

        let dialect = self.catalog.dialect().dialect();
        let mut cache = ResultCache::new();
        for primary in self.catalog.entities_for_propositions(&request.prop_ids) {
            let related = self.catalog.related_entities(primary);
            let filters = applicable_filters(&request.filters, &related);
            let (main_sql, main_info) = SelectStatement {
                entity_spec: primary,
                entity_specs: related,
                filters: &filters,
                prop_ids: &request.prop_ids,
                key_ids: &request.key_ids,
                order: request.order,
                dialect,
                wrap_key_id: self.config.wrap_key_id,
                staging: &self.staging,
            }
            .generate()?;
            let mut cursor = self.read(&request.query_id, &main_sql)?;
            let main = MainResultProcessor::new(primary, &main_info, self.catalog.backend_id());
            main.process(cursor.as_mut(), &mut cache)?;

            for reference in &primary.reference_specs {
                let Some(target) = self.catalog.entity(&reference.target_entity) else {
                    continue;
                };
                if !target.matches_any(request.prop_ids.iter().map(String::as_str)) {
                    continue;
                }
                let (ref_sql, ref_info) = ReferenceStatement {
                    entity_spec: primary,
                    reference_spec: reference,
                    target,
                    prop_ids: &request.prop_ids,
                    filters: &filters,
                    key_ids: &request.key_ids,
                    dialect,
                    wrap_key_id: self.config.wrap_key_id,
                    staging: &self.staging,
                }
                .generate()?;
                let mut ref_cursor = self.read(&request.query_id, &ref_sql)?;
                let processor = RefResultProcessor::new(primary, reference, target, &ref_info);
                processor.process(ref_cursor.as_mut(), &mut cache)?;
            }
        }
        Ok(cache)
    }

    fn produce(
        &self,
        request: &QueryRequest,
        queue: &BoundedQueue<QueueItem>,
        first_error: &Mutex<Option<ExecutorError>>,
        cancel: &CancelFlag,
    ) -> Result<(), ExecutorError> {
        let dialect = self.catalog.dialect().dialect();
        for primary in self.catalog.entities_for_propositions(&request.prop_ids) {
            log::debug!(
                "Query '{}': streaming entity '{}'",
                request.query_id,
                primary.name
            );
            let related = self.catalog.related_entities(primary);
            let filters = applicable_filters(&request.filters, &related);
            let (main_sql, main_info) = SelectStatement {
                entity_spec: primary,
                entity_specs: related,
                filters: &filters,
                prop_ids: &request.prop_ids,
                key_ids: &request.key_ids,
                order: request.order,
                dialect,
                wrap_key_id: self.config.wrap_key_id,
                staging: &self.staging,
            }
            .generate()?;

            let mut reference_plans = Vec::new();
            for reference in &primary.reference_specs {
                let Some(target) = self.catalog.entity(&reference.target_entity) else {
                    continue;
                };
                if !target.matches_any(request.prop_ids.iter().map(String::as_str)) {
                    continue;
                }
                let (ref_sql, ref_info) = ReferenceStatement {
                    entity_spec: primary,
                    reference_spec: reference,
                    target,
                    prop_ids: &request.prop_ids,
                    filters: &filters,
                    key_ids: &request.key_ids,
                    dialect,
                    wrap_key_id: self.config.wrap_key_id,
                    staging: &self.staging,
                }
                .generate()?;
                reference_plans.push((reference, target, ref_sql, ref_info));
            }

            let main_cursor = self.read(&request.query_id, &main_sql)?;
            let mut passes = Vec::new();
            for (reference, target, ref_sql, ref_info) in &reference_plans {
                let cursor = self.read(&request.query_id, ref_sql)?;
                passes.push(ReferencePass::new(
                    RefResultProcessor::new(primary, reference, target, ref_info),
                    cursor,
                ));
            }

            let main = MainResultProcessor::new(primary, &main_info, self.catalog.backend_id());
            let mut assembler = StreamingAssembler::new(main, main_cursor, passes);
            while let Some(event) = assembler.next_event()? {
                if cancel.is_cancelled() {
                    log::info!("Query '{}' cancelled", request.query_id);
                    return Err(ExecutorError::Cancelled);
                }
                if first_error.lock().is_some() {
                    // Consumer already failed; stop producing.
                    return Ok(());
                }
                queue.put(QueueItem::Batch(event));
            }
        }
        Ok(())
    }

    /// Fail-fast validation of the request against the catalog: every
    /// requested and filtered proposition id must have an entity spec.
    /// Runs before any SQL executes.
    fn validate(&self, request: &QueryRequest) -> Result<(), ExecutorError> {
        self.catalog
            .validate_proposition_ids(request.prop_ids.iter().map(String::as_str))?;
        for filter in &request.filters {
            for prop_id in filter.proposition_ids() {
                if self.catalog.entity_for_proposition(prop_id).is_none() {
                    return Err(ExecutorError::Compilation(
                        SqlGenError::FilterOutsideKnownSet(prop_id.clone()),
                    ));
                }
            }
        }
        Ok(())
    }

    fn prepare_staging(&self, request: &QueryRequest) -> Result<(), ExecutorError> {
        let dialect = self.catalog.dialect().dialect();
        for staging in &self.staging {
            let sql = staging.create_statement(dialect)?;
            log::debug!(
                "Query '{}': staging '{}'",
                request.query_id,
                staging.staging_table
            );
            self.source
                .execute(&sql)
                .map_err(|source| ExecutorError::Read {
                    query_id: request.query_id.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    fn read(
        &self,
        query_id: &str,
        sql: &str,
    ) -> Result<Box<dyn crate::db::RowCursor + 'a>, ExecutorError> {
        self.source.rows(sql).map_err(|source| ExecutorError::Read {
            query_id: query_id.to_string(),
            source,
        })
    }
}

/// Filters usable by one statement pass: every id the filter names must be
/// producible within the pass's entity set. Catalog-wide validity was
/// already checked up front; inapplicable filters belong to other passes.
fn applicable_filters(filters: &[Filter], related: &[&EntitySpec]) -> Vec<Filter> {
    filters
        .iter()
        .filter(|f| {
            f.proposition_ids().iter().all(|id| {
                related
                    .iter()
                    .any(|e| e.proposition_ids.iter().any(|p| p == id))
            })
        })
        .cloned()
        .collect()
}

fn record_first(slot: &Mutex<Option<ExecutorError>>, err: ExecutorError) {
    let mut guard = slot.lock();
    if guard.is_none() {
        *guard = Some(err);
    } else {
        log::warn!("Suppressing later error: {}", err);
    }
}
