//! Result assembly: materialize propositions from positional result rows,
//! merge multi-pass contributions, wire references, and group everything by
//! key id for delivery.

pub mod cache;
pub mod errors;
pub mod main_processor;
pub mod ref_processor;
pub mod streaming;

pub use cache::ResultCache;
pub use errors::ResultsError;
pub use main_processor::MainResultProcessor;
pub use ref_processor::RefResultProcessor;
pub use streaming::{DataStreamingEvent, KeyGroupCursor, ReferencePass, StreamingAssembler};
