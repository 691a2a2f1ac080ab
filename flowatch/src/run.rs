use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context as AnyhowContext, Result};
use crossbeam_channel::Sender;

use flowatch_core::config::SinkKind;

use crate::context::Context;
use crate::dispatch::{Dispatcher, RetryPolicy};
use crate::error::RunnerError;
use crate::lister::RemoteLister;
use crate::poll::{CycleReport, PollLoop, PollState, Tick};
use crate::sink::{console::LogSink, record::RecordSink, Sink};
use crate::store::disk::DiskStore;

const STOP_CHECK_PERIOD: Duration = Duration::from_millis(250);

fn build_sinks(context: &Context) -> Result<Vec<Arc<dyn Sink>>> {
    let mut sinks: Vec<Arc<dyn Sink>> = vec![];
    for sink_kind in &context.sinks {
        match sink_kind {
            SinkKind::Log => sinks.push(Arc::new(LogSink)),
            SinkKind::Record => {
                let record_context = context
                    .record_sink
                    .as_ref()
                    .context("Record sink enabled without record sink settings")?;
                sinks.push(Arc::new(
                    RecordSink::new(
                        record_context.address.clone(),
                        record_context.token.clone(),
                        record_context.removal,
                    )
                    .context("Create record sink")?,
                ));
            }
        }
    }

    Ok(sinks)
}

/// Sleep in small slices so a stop request interrupts the wait. Returns
/// false when the stop signal was raised.
fn sleep_or_stop(duration: Duration, stop_signal: &Arc<AtomicBool>) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if stop_signal.load(Ordering::Relaxed) {
            return false;
        }
        let slice = remaining.min(STOP_CHECK_PERIOD);
        thread::sleep(slice);
        remaining -= slice;
    }

    !stop_signal.load(Ordering::Relaxed)
}

pub fn run(
    context: Context,
    stop_signal: Arc<AtomicBool>,
    report_sender: Option<Sender<CycleReport>>,
) -> Result<(), RunnerError> {
    log::info!("Watch remote folder {}", &context.folder_id);

    let client = context.client().context("Create remote client")?;
    let lister = RemoteLister::new(Box::new(client), context.folder_id.clone());
    let store = Box::new(DiskStore::new(context.state_db_path.clone()));
    let dispatcher = Dispatcher::new(
        build_sinks(&context)?,
        RetryPolicy::new(
            context.max_sink_attempts,
            context.base_backoff,
            context.max_backoff,
        ),
    );

    let mut poll_loop = PollLoop::new(
        lister,
        store,
        dispatcher,
        context.poll_interval,
        context.base_backoff,
        context.max_backoff,
        stop_signal.clone(),
        report_sender,
    )?;

    loop {
        match poll_loop.tick() {
            Ok(Tick::Advanced) => {}
            Ok(Tick::Sleep(duration)) => {
                if !sleep_or_stop(duration, &stop_signal) {
                    log::info!("Stop requested, exit between cycles");
                    break;
                }
            }
            Ok(Tick::Stopped) => {
                log::info!("Poll loop stopped");
                break;
            }
            Err(error) => {
                log::error!("Fatal error in state {}: {:#}", poll_loop.state(), error);
                return Err(error);
            }
        }

        if context.once && poll_loop.state() == PollState::Idle && poll_loop.completed_cycles() > 0
        {
            log::info!("Single cycle done, exit");
            break;
        }
    }

    Ok(())
}
