//! Consumer-side sink for assembled batches. Runs on the consumer thread;
//! implementations own whatever downstream state they write into.

use crate::results::DataStreamingEvent;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub trait BatchHandler: Send {
    /// Called once before the first batch.
    fn start(&mut self) -> Result<(), HandlerError> {
        Ok(())
    }

    /// One key's fully wired batch. An error here aborts the query; the
    /// producer stops at its next enqueue check.
    fn handle_batch(&mut self, event: DataStreamingEvent) -> Result<(), HandlerError>;

    /// Called once after the last batch, only when no error was recorded.
    fn finish(&mut self) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Collects every batch in memory. Test and small-result use.
#[derive(Debug, Default)]
pub struct CollectingHandler {
    pub events: Vec<DataStreamingEvent>,
    pub finished: bool,
}

impl BatchHandler for CollectingHandler {
    fn handle_batch(&mut self, event: DataStreamingEvent) -> Result<(), HandlerError> {
        self.events.push(event);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), HandlerError> {
        self.finished = true;
        Ok(())
    }
}
