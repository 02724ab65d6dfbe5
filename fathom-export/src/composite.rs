// fathom-export/src/composite.rs
// ============================================================================
// Module: Fathom Composite Exporter
// Description: Fans a batch out to every configured exporter.
// Purpose: Let a deployment combine the storage exporter with additional
//          sinks without the worker knowing about either (`spec.md` §4.7).
// Dependencies: fathom-core
// ============================================================================

//! ## Overview
//! [`CompositeExporter`] delivers each batch to every registered
//! exporter in registration order. One exporter failing does not stop
//! the others from receiving the batch; the composite reports failure
//! only if *every* exporter failed, and always surfaces the first error
//! it saw.

use fathom_config::Config;
use fathom_core::core::event::Event;

use crate::exporter::ExportError;
use crate::exporter::Exporter;

/// Builder for a [`CompositeExporter`].
#[derive(Default)]
pub struct CompositeExporterBuilder {
    exporters: Vec<Box<dyn Exporter>>,
}

impl CompositeExporterBuilder {
    /// Registers an exporter to receive every batch, in the order
    /// registered.
    #[must_use]
    pub fn exporter(mut self, exporter: impl Exporter + 'static) -> Self {
        self.exporters.push(Box::new(exporter));
        self
    }

    /// Builds the composite. An empty composite is valid: it accepts
    /// every batch and does nothing with it.
    #[must_use]
    pub fn build(self) -> CompositeExporter {
        CompositeExporter {
            exporters: self.exporters,
        }
    }
}

/// Fans batches out to a fixed list of exporters.
pub struct CompositeExporter {
    exporters: Vec<Box<dyn Exporter>>,
}

impl CompositeExporter {
    /// Returns a builder for the composite.
    #[must_use]
    pub fn builder() -> CompositeExporterBuilder {
        CompositeExporterBuilder::default()
    }
}

impl Exporter for CompositeExporter {
    fn initialize(&self, config: &Config) -> Result<(), ExportError> {
        let mut first_error = None;
        for exporter in &self.exporters {
            if let Err(err) = exporter.initialize(config) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn export_batch(&self, events: &[Event]) -> Result<(), ExportError> {
        let mut first_error = None;
        let mut any_succeeded = self.exporters.is_empty();
        for exporter in &self.exporters {
            match exporter.export_batch(events) {
                Ok(()) => any_succeeded = true,
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        if any_succeeded {
            Ok(())
        } else {
            Err(first_error.unwrap_or_else(|| ExportError::Batch("no exporters configured".to_owned())))
        }
    }

    fn shutdown(&self) -> Result<(), ExportError> {
        let mut first_error = None;
        for exporter in &self.exporters {
            if let Err(err) = exporter.shutdown() {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::CompositeExporter;
    use crate::exporter::ExportError;
    use crate::exporter::Exporter;
    use fathom_config::Config;
    use fathom_config::ConfigOverrides;
    use fathom_config::Preset;
    use fathom_core::core::event::Envelope;
    use fathom_core::core::event::Event;
    use fathom_core::core::event::EventPayload;
    use fathom_core::core::event::EventStatus;
    use fathom_core::core::event::MetadataMap;
    use fathom_core::core::identifiers::RunId;

    struct RecordingExporter {
        received: Mutex<usize>,
    }

    impl RecordingExporter {
        fn new() -> Self {
            Self {
                received: Mutex::new(0),
            }
        }
    }

    impl Exporter for RecordingExporter {
        fn initialize(&self, _config: &Config) -> Result<(), ExportError> {
            Ok(())
        }

        fn export_batch(&self, events: &[Event]) -> Result<(), ExportError> {
            let mut received = self.received.lock().unwrap_or_else(|poison| poison.into_inner());
            *received += events.len();
            Ok(())
        }

        fn shutdown(&self) -> Result<(), ExportError> {
            Ok(())
        }
    }

    struct FailingExporter;

    impl Exporter for FailingExporter {
        fn initialize(&self, _config: &Config) -> Result<(), ExportError> {
            Ok(())
        }

        fn export_batch(&self, _events: &[Event]) -> Result<(), ExportError> {
            Err(ExportError::Batch("boom".to_owned()))
        }

        fn shutdown(&self) -> Result<(), ExportError> {
            Ok(())
        }
    }

    fn sample_batch() -> Vec<Event> {
        vec![Event {
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
        }]
    }

    #[test]
    fn every_exporter_receives_the_batch() {
        let config = Config::load(Preset::Debug, None, ConfigOverrides::default()).expect("load");
        let composite = CompositeExporter::builder()
            .exporter(RecordingExporter::new())
            .exporter(RecordingExporter::new())
            .build();
        composite.initialize(&config).expect("initialize");
        composite.export_batch(&sample_batch()).expect("export");
    }

    #[test]
    fn one_failing_exporter_does_not_block_others() {
        let batch = sample_batch();
        let composite = CompositeExporter::builder()
            .exporter(FailingExporter)
            .exporter(RecordingExporter::new())
            .build();
        composite.export_batch(&batch).expect("at least one exporter succeeded");
    }

    #[test]
    fn all_exporters_failing_surfaces_an_error() {
        let batch = sample_batch();
        let composite = CompositeExporter::builder().exporter(FailingExporter).build();
        assert!(composite.export_batch(&batch).is_err());
    }
}
