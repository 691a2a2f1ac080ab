use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use itertools::Itertools;
use strum_macros::Display;

use flowatch_core::snapshot::Snapshot;

use crate::diff::diff;
use crate::dispatch::{DeliveryRecord, Dispatcher};
use crate::error::RunnerError;
use crate::event::ChangeEvent;
use crate::lister::RemoteLister;
use crate::store::SnapshotStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PollState {
    Idle,
    Fetching,
    Diffing,
    Dispatching,
    Committing,
    Backoff,
    Fatal,
}

/// What the caller must do after one transition: keep ticking, sleep
/// first, or stop for good.
#[derive(Debug, PartialEq, Eq)]
pub enum Tick {
    Advanced,
    Sleep(Duration),
    Stopped,
}

/// Summary of one committed cycle, sent to the optional observer channel.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub entry_count: usize,
    pub event_count: usize,
    pub failed_deliveries: usize,
    pub finished_at: DateTime<Utc>,
}

/// Delay sequence after transient fetch failures: base, doubled on every
/// consecutive failure, capped, and reset after a fully successful cycle.
pub struct BackoffState {
    base: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl BackoffState {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            current: None,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = match self.current {
            None => self.base,
            Some(previous) => previous.saturating_mul(2),
        }
        .min(self.max);
        self.current = Some(delay);
        delay
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

/// The scheduler: one explicit state machine per watched folder, driving
/// fetch, diff, dispatch and commit in order. Cycles never overlap (a new
/// one starts only after the previous reached Idle), which keeps the
/// snapshot store single-writer.
pub struct PollLoop {
    state: PollState,
    lister: RemoteLister,
    store: Box<dyn SnapshotStore>,
    dispatcher: Dispatcher,
    interval: Duration,
    backoff: BackoffState,
    stop_signal: Arc<AtomicBool>,
    report_sender: Option<Sender<CycleReport>>,
    previous: Option<Snapshot>,
    fetched: Option<Snapshot>,
    events: Vec<ChangeEvent>,
    records: Vec<DeliveryRecord>,
    completed_cycles: u64,
}

impl PollLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lister: RemoteLister,
        store: Box<dyn SnapshotStore>,
        dispatcher: Dispatcher,
        interval: Duration,
        base_backoff: Duration,
        max_backoff: Duration,
        stop_signal: Arc<AtomicBool>,
        report_sender: Option<Sender<CycleReport>>,
    ) -> Result<Self, RunnerError> {
        let previous = store.load()?;
        match &previous {
            Some(snapshot) => log::info!(
                "Loaded snapshot of cycle {} ({} entries)",
                snapshot.cycle(),
                snapshot.len()
            ),
            None => log::info!("No committed snapshot found, first cycle will report everything"),
        }

        Ok(Self {
            state: PollState::Idle,
            lister,
            store,
            dispatcher,
            interval,
            backoff: BackoffState::new(base_backoff, max_backoff),
            stop_signal,
            report_sender,
            previous,
            fetched: None,
            events: vec![],
            records: vec![],
            completed_cycles: 0,
        })
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn previous(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }

    pub fn completed_cycles(&self) -> u64 {
        self.completed_cycles
    }

    fn advance(&mut self, next: PollState) {
        log::debug!("State {} -> {}", self.state, next);
        self.state = next;
    }

    /// Perform exactly one transition. Sleeping is the caller's business:
    /// wait requirements come back as `Tick::Sleep` values.
    pub fn tick(&mut self) -> Result<Tick, RunnerError> {
        match self.state {
            PollState::Idle => {
                if self.stop_signal.load(Ordering::Relaxed) {
                    return Ok(Tick::Stopped);
                }
                self.advance(PollState::Fetching);
                Ok(Tick::Sleep(self.interval))
            }
            PollState::Fetching => {
                let cycle = match &self.previous {
                    Some(snapshot) => snapshot.cycle() + 1,
                    None => 1,
                };
                match self.lister.snapshot(cycle) {
                    Ok(snapshot) => {
                        log::info!("Fetched {} entries (cycle {})", snapshot.len(), cycle);
                        self.fetched = Some(snapshot);
                        self.advance(PollState::Diffing);
                        Ok(Tick::Advanced)
                    }
                    Err(error) if error.is_auth() => {
                        log::error!("Remote authorization rejected: {}", error);
                        self.advance(PollState::Fatal);
                        Err(RunnerError::Authorization(error))
                    }
                    Err(error) => {
                        log::warn!("Fetch failed, backing off: {}", error);
                        self.advance(PollState::Backoff);
                        Ok(Tick::Advanced)
                    }
                }
            }
            PollState::Diffing => {
                let current = match &self.fetched {
                    Some(snapshot) => snapshot,
                    None => {
                        return Err(RunnerError::Unexpected(anyhow!(
                            "Diffing without a fetched snapshot"
                        )))
                    }
                };
                self.events = diff(self.previous.as_ref(), current);
                log::info!("Computed {} change events", self.events.len());
                self.advance(PollState::Dispatching);
                Ok(Tick::Advanced)
            }
            PollState::Dispatching => {
                self.records = self.dispatcher.dispatch(&self.events);
                let failed_by_sink = self
                    .records
                    .iter()
                    .filter(|record| record.outcome.is_failed())
                    .counts_by(|record| record.sink.clone());
                for (sink, failed) in &failed_by_sink {
                    log::error!("Sink '{}' permanently failed {} deliveries this cycle", sink, failed);
                }
                self.advance(PollState::Committing);
                Ok(Tick::Advanced)
            }
            PollState::Committing => {
                let snapshot = match self.fetched.take() {
                    Some(snapshot) => snapshot,
                    None => {
                        return Err(RunnerError::Unexpected(anyhow!(
                            "Committing without a fetched snapshot"
                        )))
                    }
                };
                if let Err(error) = self.store.commit(&snapshot) {
                    // No trustworthy baseline : the next diff would
                    // duplicate or lose events
                    self.advance(PollState::Fatal);
                    return Err(error.into());
                }

                let failed_deliveries = self
                    .records
                    .iter()
                    .filter(|record| record.outcome.is_failed())
                    .count();
                log::info!(
                    "Cycle {} committed ({} entries, {} events, {} failed deliveries)",
                    snapshot.cycle(),
                    snapshot.len(),
                    self.events.len(),
                    failed_deliveries
                );
                if let Some(report_sender) = &self.report_sender {
                    if report_sender
                        .send(CycleReport {
                            cycle: snapshot.cycle(),
                            entry_count: snapshot.len(),
                            event_count: self.events.len(),
                            failed_deliveries,
                            finished_at: Utc::now(),
                        })
                        .is_err()
                    {
                        log::debug!("No report listener anymore");
                    }
                }

                self.previous = Some(snapshot);
                self.events.clear();
                self.records.clear();
                self.backoff.reset();
                self.completed_cycles += 1;
                self.advance(PollState::Idle);
                Ok(Tick::Advanced)
            }
            PollState::Backoff => {
                let delay = self.backoff.next_delay();
                self.advance(PollState::Fetching);
                Ok(Tick::Sleep(delay))
            }
            PollState::Fatal => Ok(Tick::Stopped),
        }
    }
}
