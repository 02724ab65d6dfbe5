// fathom-core/src/lib.rs
// ============================================================================
// Module: Fathom Core Library
// Description: Public API surface for the Fathom core types.
// Purpose: Expose the event model, identifiers, hashing, and sampler shared
//          by every other Fathom crate.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Fathom core provides the event model, run/event identifiers, canonical
//! hashing, and the default sampler. It has no dependency on any other
//! Fathom crate and no I/O of its own; everything here is pure data and
//! pure functions.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::DEFAULT_HASH_ALGORITHM;
pub use core::Envelope;
pub use core::Event;
pub use core::EventIdSequence;
pub use core::EventPayload;
pub use core::EventStatus;
pub use core::FinalStatus;
pub use core::HashAlgorithm;
pub use core::HashDigest;
pub use core::HashSampler;
pub use core::MetadataMap;
pub use core::MetadataValue;
pub use core::PromptValue;
pub use core::Run;
pub use core::RunId;
pub use core::RunStatus;
pub use core::Sampler;
pub use core::should_sample;
