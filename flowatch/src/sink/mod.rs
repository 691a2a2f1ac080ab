use mockall::automock;
use thiserror::Error;

use crate::event::ChangeEvent;

pub mod console;
pub mod record;

#[derive(Debug, Clone, Error)]
#[error("Sink delivery error: {0}")]
pub struct SinkError(pub String);

/// A downstream destination change events are applied to. Deliveries to
/// one sink happen in event order on a single thread; implementations
/// only need `Sync` because the same sink value is reused cycle after
/// cycle from the dispatcher's delivery threads.
#[automock]
pub trait Sink: Send + Sync {
    fn name(&self) -> String;
    fn deliver(&self, event: &ChangeEvent) -> Result<(), SinkError>;
}
