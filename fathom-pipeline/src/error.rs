// fathom-pipeline/src/error.rs
// ============================================================================
// Module: Fathom Pipeline Errors
// Description: Per-stage failure taxonomy.
// Purpose: Let callers distinguish a dropped event (redaction or
//          encryption failure) from a degraded one (compression only).
// Dependencies: thiserror
// ============================================================================

use thiserror::Error;

/// Failure of the redaction stage. Per `spec.md` §4.4, a redaction
/// failure always drops the event; the original data is never stored
/// unredacted.
#[derive(Debug, Error)]
pub enum RedactionError {
    /// The payload nested deeper than the traversal is willing to follow.
    #[error("payload nests deeper than the {max}-level traversal limit")]
    TooDeep {
        /// The configured maximum nesting depth.
        max: usize,
    },
}

/// Failure of the encode pipeline that must drop the event rather than
/// store it. Per `spec.md` §4.4/§4.13/§7, only compression may degrade;
/// a redaction or encryption failure always drops the event instead of
/// persisting unredacted or unencrypted bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The payload could not be redacted.
    #[error(transparent)]
    Redaction(#[from] RedactionError),
    /// Encryption was enabled but the cipher call failed.
    #[error("encryption failed: {0}")]
    Encryption(String),
}

/// Failure decoding a stored blob back into JSON.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The blob's nonce prefix was shorter than [`crate::codec::NONCE_BYTES`].
    #[error("encrypted blob is too short to contain a nonce")]
    TruncatedNonce,
    /// AES-GCM authentication failed; the blob is corrupt or the
    /// configured key does not match the one used to encrypt it.
    #[error("decryption failed: ciphertext did not authenticate")]
    Decryption,
    /// Gzip decompression failed.
    #[error("decompression failed: {0}")]
    Decompression(String),
    /// The decoded bytes did not parse as JSON.
    #[error("decoded blob is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
