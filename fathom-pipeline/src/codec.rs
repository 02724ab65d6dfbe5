// fathom-pipeline/src/codec.rs
// ============================================================================
// Module: Fathom Codec Tags
// Description: Records which pipeline stages were actually applied.
// Purpose: Let the read store reverse exactly the stages that ran, even
//          when a stage degraded on error (`spec.md` §4.4).
// Dependencies: serde
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

/// Size, in bytes, of the AES-GCM nonce prepended to an encrypted blob.
pub const NONCE_BYTES: usize = 12;

/// Which pipeline stages were applied to a stored blob, independent of
/// whether those stages are currently enabled in config. A batch encoded
/// before a config change may carry different tags than one encoded
/// after it; decoding always follows the tags, never the current config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecTags {
    /// The blob was gzip-compressed.
    pub compressed: bool,
    /// The blob was AES-256-GCM encrypted. The first [`NONCE_BYTES`] bytes
    /// of the blob are the nonce when this is true.
    pub encrypted: bool,
}

impl CodecTags {
    /// Tags for a blob that went through neither compression nor
    /// encryption.
    #[must_use]
    pub const fn plain() -> Self {
        Self {
            compressed: false,
            encrypted: false,
        }
    }

    /// Renders the tags as the single-word `blob_codec` column stored
    /// alongside each step (`spec.md` §4.9).
    #[must_use]
    pub const fn as_column(self) -> &'static str {
        match (self.compressed, self.encrypted) {
            (false, false) => "raw",
            (true, false) => "gzip",
            (false, true) => "aes256gcm",
            (true, true) => "gzip+aes256gcm",
        }
    }

    /// Parses a `blob_codec` column value back into tags.
    #[must_use]
    pub fn from_column(value: &str) -> Option<Self> {
        match value {
            "raw" => Some(Self::plain()),
            "gzip" => Some(Self {
                compressed: true,
                encrypted: false,
            }),
            "aes256gcm" => Some(Self {
                compressed: false,
                encrypted: true,
            }),
            "gzip+aes256gcm" => Some(Self {
                compressed: true,
                encrypted: true,
            }),
            _ => None,
        }
    }
}
