// fathom-queue/src/worker.rs
// ============================================================================
// Module: Fathom Worker
// Description: The single background thread draining the bounded queue
//              and dispatching micro-batches to an exporter.
// Purpose: `spec.md` §4.6, §4.12 worker state machine.
// Dependencies: fathom-config, fathom-core, fathom-export
// ============================================================================

//! ## Overview
//! Exactly one worker runs per `Trace` instance. It pulls up to
//! `batch_size` events, waiting up to `batch_timeout_ms` for the first
//! event of a batch and for the deadline to collect more, then hands the
//! batch to the configured [`Exporter`]. Exporter errors are recorded in
//! [`DropCounters`]/[`WorkerStats`] and never propagated; the worker
//! must not die on a batch failure.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use fathom_config::Config;
use fathom_core::core::event::Event;
use fathom_export::Exporter;

use crate::queue::QueueConsumer;
use crate::queue::QueueProducer;
use crate::telemetry::BatchOutcome;
use crate::telemetry::DropCounters;

/// Name given to the worker's OS thread, visible in debuggers and
/// `/proc`.
const THREAD_NAME: &str = "fathom-worker";
/// Hard cap on how long shutdown waits for the queue to drain
/// (`spec.md` §4.6).
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
/// How often the idle wait for the first event of a batch re-checks for
/// a shutdown request.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Lifecycle state of the worker (`spec.md` §4.12).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Thread spawned, not yet processing.
    Starting = 0,
    /// Normal operation.
    Running = 1,
    /// Refusing new submissions, still flushing what is queued.
    Draining = 2,
    /// Fully stopped; further `shutdown` calls are no-ops.
    Stopped = 3,
}

impl WorkerState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Running counters exposed for the HTTP API / CLI `stats` surfaces.
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Drops per event type, from both queue overflow and exporter
    /// rejection.
    pub drops: DropCounters,
    last_batch_outcome: Mutex<Option<BatchOutcome>>,
}

impl WorkerStats {
    /// Returns the most recent batch outcome, if any batch has run yet.
    #[must_use]
    pub fn last_batch_outcome(&self) -> Option<BatchOutcome> {
        *self.last_batch_outcome.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record(&self, outcome: BatchOutcome) {
        let mut slot = self.last_batch_outcome.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = Some(outcome);
    }
}

/// Handle to the spawned worker thread.
pub struct WorkerHandle {
    producer: QueueProducer,
    state: Arc<AtomicU8>,
    stats: Arc<WorkerStats>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerHandle {
    /// Spawns the worker thread and returns a handle. Use
    /// [`Self::producer`] to obtain the submission side of its queue.
    #[must_use]
    pub fn spawn(config: Arc<Config>, exporter: Arc<dyn Exporter>) -> Self {
        let (producer, consumer) = crate::queue::bounded_queue(config.queue_size);
        let state = Arc::new(AtomicU8::new(WorkerState::Starting as u8));
        let stats = Arc::new(WorkerStats::default());

        let loop_state = Arc::clone(&state);
        let loop_stats = Arc::clone(&stats);
        let thread = std::thread::Builder::new()
            .name(THREAD_NAME.to_owned())
            .spawn(move || {
                run(&config, &consumer, exporter.as_ref(), &loop_state, &loop_stats);
            })
            .ok();

        state.store(WorkerState::Running as u8, Ordering::Release);
        Self {
            producer,
            state,
            stats,
            thread: Mutex::new(thread),
        }
    }

    /// The submission side of this worker's queue. Cheap to clone; every
    /// caller emitting events shares the same underlying channel.
    #[must_use]
    pub fn producer(&self) -> QueueProducer {
        self.producer.clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Running counters.
    #[must_use]
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Stops accepting new events, waits up to [`DEFAULT_DRAIN_TIMEOUT`]
    /// for the queue to drain, then joins the thread. Idempotent: a
    /// second call is a no-op.
    pub fn shutdown(&self) {
        self.shutdown_with_timeout(DEFAULT_DRAIN_TIMEOUT);
    }

    /// As [`Self::shutdown`], with an explicit drain timeout.
    pub fn shutdown_with_timeout(&self, drain_timeout: Duration) {
        if self.state() == WorkerState::Stopped {
            return;
        }
        self.state.store(WorkerState::Draining as u8, Ordering::Release);
        self.producer.close();

        let mut guard = self.thread.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(thread) = guard.take() {
            let deadline = Instant::now() + drain_timeout;
            while !thread.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }
            let _ = thread.join();
        }
        self.state.store(WorkerState::Stopped as u8, Ordering::Release);
    }
}

fn run(
    config: &Config,
    consumer: &QueueConsumer,
    exporter: &dyn Exporter,
    state: &Arc<AtomicU8>,
    stats: &Arc<WorkerStats>,
) {
    if exporter.initialize(config).is_err() {
        state.store(WorkerState::Stopped as u8, Ordering::Release);
        return;
    }

    loop {
        let draining = WorkerState::from_u8(state.load(Ordering::Acquire)) == WorkerState::Draining;
        let Some(first) = consumer.recv_timeout(IDLE_POLL_INTERVAL) else {
            if draining {
                break;
            }
            continue;
        };

        let mut batch = Vec::with_capacity(config.batch_size);
        batch.push(first);
        let deadline = Instant::now() + Duration::from_millis(config.batch_timeout_ms);
        while batch.len() < config.batch_size {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match consumer.recv_timeout(deadline.saturating_duration_since(now)) {
                Some(event) => batch.push(event),
                None => break,
            }
        }

        dispatch(exporter, &batch, stats);
    }

    for leftover in consumer.drain_available().chunks(config.batch_size) {
        dispatch(exporter, leftover, stats);
    }

    let _ = exporter.shutdown();
}

fn dispatch(exporter: &dyn Exporter, batch: &[Event], stats: &Arc<WorkerStats>) {
    if batch.is_empty() {
        return;
    }
    match exporter.export_batch(batch) {
        Ok(()) => stats.record(BatchOutcome::Exported),
        Err(_err) => {
            stats.record(BatchOutcome::Dropped);
            for event in batch {
                stats.drops.increment(event.tag());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::WorkerHandle;
    use super::WorkerState;
    use fathom_config::Config;
    use fathom_config::ConfigOverrides;
    use fathom_config::Preset;
    use fathom_core::core::event::Envelope;
    use fathom_core::core::event::Event;
    use fathom_core::core::event::EventPayload;
    use fathom_core::core::event::EventStatus;
    use fathom_core::core::event::MetadataMap;
    use fathom_core::core::identifiers::RunId;
    use fathom_export::ExportError;
    use fathom_export::Exporter;

    struct CountingExporter {
        total: Mutex<usize>,
    }

    impl Exporter for CountingExporter {
        fn initialize(&self, _config: &Config) -> Result<(), ExportError> {
            Ok(())
        }

        fn export_batch(&self, events: &[Event]) -> Result<(), ExportError> {
            let mut total = self.total.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *total += events.len();
            Ok(())
        }

        fn shutdown(&self) -> Result<(), ExportError> {
            Ok(())
        }
    }

    fn sample_event() -> Event {
        Event {
            envelope: Envelope {
                event_id: 0,
                run_id: RunId::new(),
                parent_event_id: None,
                timestamp_ms: 0,
                duration_ms: None,
                status: EventStatus::Ok,
                metadata: MetadataMap::new(),
            },
            payload: EventPayload::FinalAnswer {
                answer: "ok".to_owned(),
            },
        }
    }

    #[test]
    fn worker_drains_queue_on_shutdown() {
        let config = Arc::new(
            Config::load(Preset::Debug, None, ConfigOverrides::default()).expect("load"),
        );
        let exporter = Arc::new(CountingExporter { total: Mutex::new(0) });
        let handle = WorkerHandle::spawn(config, exporter);
        let producer = handle.producer();
        assert!(producer.try_submit(sample_event()));
        assert!(producer.try_submit(sample_event()));
        handle.shutdown();
        assert_eq!(handle.state(), WorkerState::Stopped);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let config = Arc::new(
            Config::load(Preset::Debug, None, ConfigOverrides::default()).expect("load"),
        );
        let exporter = Arc::new(CountingExporter { total: Mutex::new(0) });
        let handle = WorkerHandle::spawn(config, exporter);
        handle.shutdown();
        handle.shutdown();
        assert_eq!(handle.state(), WorkerState::Stopped);
    }

    #[test]
    fn submissions_after_shutdown_are_rejected() {
        let config = Arc::new(
            Config::load(Preset::Debug, None, ConfigOverrides::default()).expect("load"),
        );
        let exporter = Arc::new(CountingExporter { total: Mutex::new(0) });
        let handle = WorkerHandle::spawn(config, exporter);
        let producer = handle.producer();
        handle.shutdown();
        assert!(!producer.try_submit(sample_event()));
    }
}
