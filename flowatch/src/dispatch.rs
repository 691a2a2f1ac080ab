use std::sync::Arc;
use std::thread;
use std::time::Duration;

use flowatch_core::types::EntryId;

use crate::event::ChangeEvent;
use crate::sink::{Sink, SinkError};

/// Bounded exponential backoff between delivery attempts to one sink.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            // Zero attempts would silently drop every event
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay before the attempt following `failed_attempts` failures:
    /// base, base*2, base*4, ... capped at the maximum.
    pub fn delay(&self, failed_attempts: usize) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(32) as u32;
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: usize },
    Failed { attempts: usize, error: String },
}

impl DeliveryOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, DeliveryOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub sink: String,
    pub entry_id: EntryId,
    pub event: &'static str,
    pub outcome: DeliveryOutcome,
}

/// Applies one cycle's events to every configured sink. Sinks are
/// independent: each gets its own delivery thread and its own outcome
/// records, and one sink exhausting its retries never blocks the others
/// or the cycle. Within a sink, events are delivered strictly in diff
/// order.
pub struct Dispatcher {
    sinks: Vec<Arc<dyn Sink>>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(sinks: Vec<Arc<dyn Sink>>, retry: RetryPolicy) -> Self {
        Self { sinks, retry }
    }

    pub fn dispatch(&self, events: &[ChangeEvent]) -> Vec<DeliveryRecord> {
        if events.is_empty() || self.sinks.is_empty() {
            return vec![];
        }

        let mut handles = vec![];
        for sink in &self.sinks {
            let sink = sink.clone();
            let retry = self.retry.clone();
            let events = events.to_vec();
            handles.push(thread::spawn(move || deliver_all(sink, &events, &retry)));
        }

        let mut records = vec![];
        for handle in handles {
            match handle.join() {
                Ok(sink_records) => records.extend(sink_records),
                Err(_) => log::error!("Sink delivery thread panicked"),
            }
        }

        records
    }
}

fn deliver_all(
    sink: Arc<dyn Sink>,
    events: &[ChangeEvent],
    retry: &RetryPolicy,
) -> Vec<DeliveryRecord> {
    let sink_name = sink.name();
    events
        .iter()
        .map(|event| deliver_one(sink.as_ref(), &sink_name, event, retry))
        .collect()
}

fn deliver_one(
    sink: &dyn Sink,
    sink_name: &str,
    event: &ChangeEvent,
    retry: &RetryPolicy,
) -> DeliveryRecord {
    let mut attempts = 0;
    let outcome = loop {
        attempts += 1;
        match sink.deliver(event) {
            Ok(()) => {
                if attempts > 1 {
                    log::info!(
                        "Delivered {} to sink '{}' after {} attempts",
                        event.describe(),
                        sink_name,
                        attempts
                    );
                }
                break DeliveryOutcome::Delivered { attempts };
            }
            Err(error) => {
                if attempts >= retry.max_attempts() {
                    log::error!(
                        "Abandon delivery of {} to sink '{}' after {} attempts: {}",
                        event.describe(),
                        sink_name,
                        attempts,
                        error
                    );
                    break DeliveryOutcome::Failed {
                        attempts,
                        error: error.to_string(),
                    };
                }

                let delay = retry.delay(attempts);
                log::warn!(
                    "Delivery of {} to sink '{}' failed (attempt {}), retry in {:?}: {}",
                    event.describe(),
                    sink_name,
                    attempts,
                    delay,
                    error
                );
                thread::sleep(delay);
            }
        }
    };

    DeliveryRecord {
        sink: sink_name.to_string(),
        entry_id: event.entry_id().clone(),
        event: event.label(),
        outcome,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sink::MockSink;
    use crate::tests::build_entry;
    use mockall::predicate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn added(raw_id: &str) -> ChangeEvent {
        ChangeEvent::Added(build_entry((raw_id, Some("1"), &format!("{}.txt", raw_id), None)))
    }

    fn retry_fast(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(4),
        )
    }

    #[test]
    fn test_delay_doubles_up_to_cap() {
        // Given
        let retry = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5));

        // When / Then
        assert_eq!(retry.delay(1), Duration::from_secs(1));
        assert_eq!(retry.delay(2), Duration::from_secs(2));
        assert_eq!(retry.delay(3), Duration::from_secs(4));
        assert_eq!(retry.delay(4), Duration::from_secs(5));
        assert_eq!(retry.delay(10), Duration::from_secs(5));
    }

    #[test]
    fn test_events_delivered_in_order() {
        // Given
        let mut sink = MockSink::new();
        let mut sequence = mockall::Sequence::new();
        sink.expect_name().return_const("mock".to_string());
        for raw_id in ["1", "2", "3"] {
            sink.expect_deliver()
                .with(predicate::eq(added(raw_id)))
                .times(1)
                .in_sequence(&mut sequence)
                .returning(|_| Ok(()));
        }
        let dispatcher = Dispatcher::new(vec![Arc::new(sink)], retry_fast(1));

        // When
        let records = dispatcher.dispatch(&[added("1"), added("2"), added("3")]);

        // Then
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|record| !record.outcome.is_failed()));
    }

    #[test]
    fn test_delivery_succeeds_after_retries() {
        // Given : two failures then success
        let mut sink = MockSink::new();
        sink.expect_name().return_const("mock".to_string());
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        sink.expect_deliver().times(3).returning(move |_| {
            if counted.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(SinkError("boom".to_string()))
            } else {
                Ok(())
            }
        });
        let dispatcher = Dispatcher::new(vec![Arc::new(sink)], retry_fast(3));

        // When
        let records = dispatcher.dispatch(&[added("1")]);

        // Then
        assert_eq!(
            records[0].outcome,
            DeliveryOutcome::Delivered { attempts: 3 }
        );
    }

    #[test]
    fn test_exhausted_retries_do_not_block_next_event() {
        // Given : first event always fails, second succeeds
        let mut sink = MockSink::new();
        sink.expect_name().return_const("mock".to_string());
        sink.expect_deliver()
            .with(predicate::eq(added("1")))
            .times(2)
            .returning(|_| Err(SinkError("boom".to_string())));
        sink.expect_deliver()
            .with(predicate::eq(added("2")))
            .times(1)
            .returning(|_| Ok(()));
        let dispatcher = Dispatcher::new(vec![Arc::new(sink)], retry_fast(2));

        // When
        let records = dispatcher.dispatch(&[added("1"), added("2")]);

        // Then
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].outcome,
            DeliveryOutcome::Failed {
                attempts: 2,
                error: "Sink delivery error: boom".to_string()
            }
        );
        assert_eq!(
            records[1].outcome,
            DeliveryOutcome::Delivered { attempts: 1 }
        );
    }

    #[test]
    fn test_failing_sink_does_not_block_other_sinks() {
        // Given
        let mut broken = MockSink::new();
        broken.expect_name().return_const("broken".to_string());
        broken
            .expect_deliver()
            .returning(|_| Err(SinkError("down".to_string())));
        let mut healthy = MockSink::new();
        healthy.expect_name().return_const("healthy".to_string());
        healthy.expect_deliver().returning(|_| Ok(()));
        let dispatcher =
            Dispatcher::new(vec![Arc::new(broken), Arc::new(healthy)], retry_fast(2));

        // When
        let records = dispatcher.dispatch(&[added("1")]);

        // Then : one outcome per sink, independent of each other
        assert_eq!(records.len(), 2);
        let failed: Vec<&str> = records
            .iter()
            .filter(|record| record.outcome.is_failed())
            .map(|record| record.sink.as_str())
            .collect();
        assert_eq!(failed, vec!["broken"]);
    }

    #[test]
    fn test_no_events_means_no_deliveries() {
        let mut sink = MockSink::new();
        sink.expect_deliver().times(0);
        let dispatcher = Dispatcher::new(vec![Arc::new(sink)], retry_fast(1));
        assert!(dispatcher.dispatch(&[]).is_empty());
    }
}
