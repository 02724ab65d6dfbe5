// fathom-pipeline/src/decode.rs
// ============================================================================
// Module: Fathom Decode Pipeline
// Description: Inverse of encode, driven by stored codec tags.
// Purpose: Used by the read store at query time (`spec.md` §4.4, §4.10).
// Dependencies: fathom-config
// ============================================================================

//! ## Overview
//! Always reverses exactly the stages [`crate::codec::CodecTags`] records,
//! never the stages the current config happens to have enabled — a blob
//! written under an old config must still decode after the config changes.

use fathom_config::EncryptionKey;
use serde_json::Value;

use crate::codec::CodecTags;
use crate::compress;
use crate::encrypt;
use crate::error::DecodeError;

/// Decodes a stored blob back into its JSON payload.
///
/// # Errors
///
/// Returns [`DecodeError`] if decryption, decompression, or JSON parsing
/// fails. `encryption_key` must be `Some` whenever `tags.encrypted` is
/// true.
pub fn decode(
    blob: &[u8],
    tags: CodecTags,
    encryption_key: Option<&EncryptionKey>,
) -> Result<Value, DecodeError> {
    let mut bytes = blob.to_vec();

    if tags.encrypted {
        let key = encryption_key.ok_or(DecodeError::Decryption)?;
        bytes = encrypt::decrypt(&bytes, key)?;
    }

    if tags.compressed {
        bytes = compress::decompress(&bytes).map_err(|err| DecodeError::Decompression(err.to_string()))?;
    }

    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::decode;
    use crate::codec::CodecTags;
    use crate::encode::encode;
    use fathom_config::Config;
    use fathom_config::ConfigOverrides;
    use fathom_config::Preset;
    use fathom_core::core::event::Envelope;
    use fathom_core::core::event::Event;
    use fathom_core::core::event::EventPayload;
    use fathom_core::core::event::EventStatus;
    use fathom_core::core::event::MetadataMap;
    use fathom_core::core::identifiers::RunId;

    fn sample_event() -> Event {
        Event {
            envelope: Envelope {
                event_id: 1,
                run_id: RunId::new(),
                parent_event_id: None,
                timestamp_ms: 1_700_000_000_000,
                duration_ms: None,
                status: EventStatus::Ok,
                metadata: MetadataMap::new(),
            },
            payload: EventPayload::FinalAnswer {
                answer: "42".to_owned(),
            },
        }
    }

    #[test]
    fn decode_reverses_encode_with_compression_and_encryption() {
        let overrides = ConfigOverrides {
            compression_enabled: Some(true),
            encryption_enabled: Some(true),
            encryption_key: Some("a-sufficiently-long-test-passphrase".to_owned()),
            ..ConfigOverrides::default()
        };
        let config = Config::load(Preset::Debug, None, overrides).expect("load");
        let (blob, tags) = encode(&sample_event(), &config).expect("encode");
        let value = decode(&blob, tags, config.encryption_key.as_ref()).expect("decode");
        assert_eq!(value["answer"], serde_json::json!("42"));
    }

    #[test]
    fn decode_without_any_stage_round_trips() {
        let config = Config::load(Preset::Debug, None, ConfigOverrides::default()).expect("load");
        let (blob, tags) = encode(&sample_event(), &config).expect("encode");
        assert_eq!(tags, CodecTags::plain());
        let value = decode(&blob, tags, None).expect("decode");
        assert_eq!(value["answer"], serde_json::json!("42"));
    }

    #[test]
    fn missing_key_for_encrypted_blob_errors() {
        let overrides = ConfigOverrides {
            encryption_enabled: Some(true),
            encryption_key: Some("a-sufficiently-long-test-passphrase".to_owned()),
            ..ConfigOverrides::default()
        };
        let config = Config::load(Preset::Debug, None, overrides).expect("load");
        let (blob, tags) = encode(&sample_event(), &config).expect("encode");
        assert!(decode(&blob, tags, None).is_err());
    }
}
