// fathom-core/src/core/mod.rs
// ============================================================================
// Module: Fathom Core Types
// Description: Event model, identifiers, hashing, and sampler.
// Purpose: Provide the stable, serializable types shared by every other
//          Fathom crate.
// Dependencies: serde, sha2
// ============================================================================

//! ## Overview
//! Fathom core types are the canonical source of truth for the event
//! envelope and run identifiers that every later stage of the pipeline
//! (redaction, storage, the read contract, the HTTP API) builds on.

pub mod event;
pub mod hashing;
pub mod identifiers;
pub mod run;
pub mod sampler;

pub use event::Envelope;
pub use event::Event;
pub use event::EventPayload;
pub use event::EventStatus;
pub use event::FinalStatus;
pub use event::MetadataMap;
pub use event::MetadataValue;
pub use event::PromptValue;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use identifiers::EventIdSequence;
pub use identifiers::RunId;
pub use run::Run;
pub use run::RunStatus;
pub use sampler::HashSampler;
pub use sampler::Sampler;
pub use sampler::should_sample;
