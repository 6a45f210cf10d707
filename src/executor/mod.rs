//! Query execution: statement orchestration, the bounded producer/consumer
//! handoff, and the batch-handler seam consumers implement.

pub mod errors;
pub mod handler;
pub mod pipeline;
pub mod queue;

pub use errors::ExecutorError;
pub use handler::{BatchHandler, CollectingHandler, HandlerError};
pub use pipeline::{CancelFlag, ExecutorConfig, QueryExecutor, QueryRequest};
pub use queue::{BoundedQueue, DEFAULT_QUEUE_CAPACITY};
