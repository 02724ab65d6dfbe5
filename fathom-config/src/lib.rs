// fathom-config/src/lib.rs
// ============================================================================
// Module: Fathom Config Library
// Description: Public API surface for configuration loading and docs.
// Purpose: Single entry point other Fathom crates depend on for `Config`.
// Dependencies: crate::config, crate::docs, crate::examples
// ============================================================================

//! ## Overview
//! Loads and validates the configuration consumed by every other Fathom
//! crate: the pipeline's redaction/compression/encryption stages, the
//! queue's capacity and batching knobs, and the store's retention window.
//! See [`config::Config::load`] for the precedence rules.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod docs;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::CONFIG_ENV_VAR;
pub use config::Config;
pub use config::ConfigError;
pub use config::ConfigOverrides;
pub use config::EncryptionKey;
pub use config::Preset;
pub use config::REDACTION_MARKER;
pub use docs::config_docs_markdown;
pub use examples::example_config_toml;
