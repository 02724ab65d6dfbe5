// fathom/src/trace.rs
// ============================================================================
// Module: Fathom Trace
// Description: The facade's entry point: owns the worker, the sampler,
//              the producer handle, and the process-wide default instance.
// Purpose: `spec.md` §4.11 `Trace` type, §9 "global trace instance".
// Dependencies: fathom-config, fathom-core, fathom-export, fathom-queue
// ============================================================================

//! ## Overview
//! [`Trace`] is a cheap `Clone` handle (`Arc<TraceInner>`) around a running
//! [`fathom_queue::WorkerHandle`]. Construction is fail-fast: the supplied
//! [`fathom_export::Exporter`] is initialized synchronously before the
//! worker thread is spawned, so a misconfigured exporter surfaces as a
//! [`crate::error::TraceError`] at the call site rather than as a silent
//! stream of dropped batches later. [`set_trace`]/[`get_trace`] back the
//! process-wide default described in `spec.md` §9: a caller who never
//! wires up storage still gets a [`Trace`] that accepts every emission,
//! with a [`NullExporter`] quietly discarding the batches.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::time::Duration;

use fathom_config::Config;
use fathom_core::HashSampler;
use fathom_core::RunId;
use fathom_core::Sampler;
use fathom_export::ExportError;
use fathom_export::Exporter;
use fathom_queue::DropCounters;
use fathom_queue::QueueProducer;
use fathom_queue::WorkerHandle;
use fathom_queue::WorkerStats;

use crate::error::TraceError;
use crate::scope::RunGuard;
use crate::telemetry::EmitOutcome;
use crate::telemetry::Reporter;
use crate::telemetry::StderrReporter;

struct TraceInner {
    config: Config,
    sampler: Box<dyn Sampler>,
    worker: WorkerHandle,
    reporter: Box<dyn Reporter>,
    emit_drops: DropCounters,
}

/// A running trace pipeline: config, sampler, and worker bundled behind a
/// cheap, `Clone`-able handle.
#[derive(Clone)]
pub struct Trace(Arc<TraceInner>);

impl Trace {
    /// Builds a trace with the default [`HashSampler`].
    pub fn new(config: Config, exporter: impl Exporter + 'static) -> Result<Self, TraceError> {
        Self::with_sampler(config, exporter, Box::new(HashSampler))
    }

    /// Builds a trace with a caller-supplied [`Sampler`].
    pub fn with_sampler(
        config: Config,
        exporter: impl Exporter + 'static,
        sampler: Box<dyn Sampler>,
    ) -> Result<Self, TraceError> {
        exporter.initialize(&config)?;
        let exporter: Arc<dyn Exporter> = Arc::new(exporter);
        let worker = WorkerHandle::spawn(Arc::new(config.clone()), exporter);
        Ok(Self(Arc::new(TraceInner {
            config,
            sampler,
            worker,
            reporter: Box::new(StderrReporter),
            emit_drops: DropCounters::default(),
        })))
    }

    pub(crate) fn config(&self) -> &Config {
        &self.0.config
    }

    pub(crate) fn sampler(&self) -> &dyn Sampler {
        self.0.sampler.as_ref()
    }

    pub(crate) fn producer(&self) -> QueueProducer {
        self.0.worker.producer()
    }

    pub(crate) fn emit_drops(&self) -> &DropCounters {
        &self.0.emit_drops
    }

    pub(crate) fn report(&self, outcome: EmitOutcome, run_id: &RunId, event_type: &str) {
        self.0.reporter.report(outcome, run_id, event_type);
    }

    /// Opens a new run scope. The returned [`RunGuard`] emits `run_start`
    /// immediately and is guaranteed to emit `run_end` when dropped.
    pub fn run(&self, name: impl Into<String>, metadata: fathom_core::MetadataMap) -> RunGuard {
        RunGuard::enter(self, name, metadata)
    }

    /// Snapshot of the worker's batch/drop counters.
    #[must_use]
    pub fn worker_stats(&self) -> &WorkerStats {
        self.0.worker.stats()
    }

    /// Snapshot of drops observed at emission time (queue full, or emitted
    /// after the owning run already ended), distinct from the worker's
    /// own exporter-rejection counters.
    #[must_use]
    pub fn emission_drops(&self) -> &DropCounters {
        &self.0.emit_drops
    }

    /// Drains the queue and shuts down the worker, using the default
    /// drain timeout.
    pub fn shutdown(&self) {
        self.0.worker.shutdown();
    }

    /// Drains the queue and shuts down the worker within `timeout`.
    pub fn shutdown_with_timeout(&self, timeout: Duration) {
        self.0.worker.shutdown_with_timeout(timeout);
    }
}

/// Exporter used by the process-wide default [`Trace`] before a real one
/// is installed via [`set_trace`]. Accepts and discards every batch.
struct NullExporter;

impl Exporter for NullExporter {
    fn initialize(&self, _config: &Config) -> Result<(), ExportError> {
        Ok(())
    }

    fn export_batch(&self, _events: &[fathom_core::Event]) -> Result<(), ExportError> {
        Ok(())
    }

    fn shutdown(&self) -> Result<(), ExportError> {
        Ok(())
    }
}

/// Config for the lazy process-wide default. `Preset::Production` with no
/// file and no overrides cannot fail validation; the literal below is a
/// last-resort fallback so this path has no `.unwrap()`/`.expect()`.
fn fallback_config() -> Config {
    let overrides = fathom_config::ConfigOverrides::default();
    Config::load(fathom_config::Preset::Production, None, overrides.clone())
        .or_else(|_| Config::load(fathom_config::Preset::Debug, None, overrides))
        .unwrap_or_else(|_| literal_fallback_config())
}

fn literal_fallback_config() -> Config {
    Config {
        sample_rate: 1.0,
        only_on_error: false,
        queue_size: 2048,
        batch_size: 256,
        batch_timeout_ms: 1_000,
        redact_keys: Vec::new(),
        redact_patterns: Vec::new(),
        compression_enabled: false,
        compression_level: 6,
        encryption_enabled: false,
        encryption_key: None,
        db_path: std::path::PathBuf::from("fathom.db"),
        retention_days: 30,
        block_on_run_end: false,
        run_end_block_timeout_ms: 5_000,
        blob_max_bytes: 10 * 1024 * 1024,
    }
}

fn default_trace() -> Trace {
    let config = fallback_config();
    let exporter = NullExporter;
    Trace(Arc::new(TraceInner {
        sampler: Box::new(HashSampler),
        worker: WorkerHandle::spawn(Arc::new(config.clone()), Arc::new(exporter)),
        reporter: Box::new(StderrReporter),
        emit_drops: DropCounters::default(),
        config,
    }))
}

static DEFAULT_TRACE: OnceLock<Trace> = OnceLock::new();
static INJECTED_TRACE: OnceLock<Mutex<Option<Trace>>> = OnceLock::new();

/// Installs `trace` as the process-wide default returned by [`get_trace`].
/// Intended to be called once, at startup, before any code calls
/// [`get_trace`] on another thread.
pub fn set_trace(trace: Trace) {
    let slot = INJECTED_TRACE.get_or_init(|| Mutex::new(None));
    *slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(trace);
}

/// Returns the process-wide default [`Trace`]: the one installed via
/// [`set_trace`], or a lazily constructed no-op trace otherwise.
#[must_use]
pub fn get_trace() -> Trace {
    if let Some(slot) = INJECTED_TRACE.get() {
        if let Some(trace) = slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone() {
            return trace;
        }
    }
    DEFAULT_TRACE.get_or_init(default_trace).clone()
}
