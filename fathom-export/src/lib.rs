// fathom-export/src/lib.rs
// ============================================================================
// Module: Fathom Export Library
// Description: The Exporter contract and a fan-out Composite implementation.
// Purpose: Public API surface consumed by the worker and the storage crate.
// Dependencies: crate::exporter, crate::composite
// ============================================================================

//! ## Overview
//! Exporters are the worker's only way to persist a batch. This crate
//! defines the contract ([`Exporter`]) and a fan-out implementation
//! ([`CompositeExporter`]); `fathom-store-sqlite` provides the concrete
//! durable-storage exporter.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod composite;
pub mod exporter;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use composite::CompositeExporter;
pub use composite::CompositeExporterBuilder;
pub use exporter::ExportError;
pub use exporter::Exporter;
