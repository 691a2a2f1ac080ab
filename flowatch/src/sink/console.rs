use super::{Sink, SinkError};
use crate::event::ChangeEvent;

/// Append-only textual record of every event, through the logging
/// facade. Purely observational: it feeds nothing back into the engine.
pub struct LogSink;

impl Sink for LogSink {
    fn name(&self) -> String {
        "log".to_string()
    }

    fn deliver(&self, event: &ChangeEvent) -> Result<(), SinkError> {
        log::info!("[sink:log] {}", event.describe());
        Ok(())
    }
}
