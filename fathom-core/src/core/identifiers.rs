// fathom-core/src/core/identifiers.rs
// ============================================================================
// Module: Fathom Identifiers
// Description: Canonical opaque identifiers for runs and events.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! This module defines the identifiers used throughout Fathom. `RunId` is
//! backed by a UUID so it is safe to generate client-side without
//! coordination; `EventIdSequence` hands out the per-run monotonic counter
//! assigned by the run context, not by the store, so ordering survives the
//! queue.

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Opaque 128-bit run identifier, stringified in hyphenated form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generates a fresh, random run identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing identifier string without validating its shape.
    #[must_use]
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self::from_raw(value)
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self::from_raw(value)
    }
}

/// Per-run monotonic event sequence generator.
///
/// Assigning the id in the run context (rather than at the store) keeps
/// event ordering meaningful even though events cross a queue boundary
/// before being committed.
#[derive(Debug, Default)]
pub struct EventIdSequence(AtomicU64);

impl EventIdSequence {
    /// Creates a sequence starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Returns the next event id for this run, starting at zero.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}
