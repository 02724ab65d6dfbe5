// fathom-pipeline/src/encode.rs
// ============================================================================
// Module: Fathom Encode Pipeline
// Description: Orchestrates redact -> serialize -> compress -> encrypt.
// Purpose: The pure function the storage exporter calls per event
//          (`spec.md` §4.4).
// Dependencies: fathom-config, fathom-core
// ============================================================================

//! ## Overview
//! [`encode`] runs the four pipeline stages in the order the read store
//! must reverse them. Compression is the one stage allowed to degrade
//! independently on failure: [`CodecTags`] always reflects what was
//! actually applied, so decoding never has to guess. Redaction and
//! encryption failures both drop the event outright, since the
//! alternative would be storing unredacted or unencrypted data.

use fathom_config::Config;
use fathom_core::core::event::Event;

use crate::codec::CodecTags;
use crate::compress;
use crate::encrypt;
use crate::error::EncodeError;
use crate::redact::redact;
use crate::serialize::serialize_canonical;

/// Runs the full encode pipeline over `event`.
///
/// # Errors
///
/// Returns [`EncodeError`] if the payload cannot be traversed for
/// redaction, or if encryption was enabled and the cipher call failed;
/// in either case the caller must drop the event rather than store it.
pub fn encode(event: &Event, config: &Config) -> Result<(Vec<u8>, CodecTags), EncodeError> {
    let payload = event.payload_as_json().unwrap_or_else(|err| {
        serde_json::json!({"__type__": "unserializable", "__repr__": err.to_string()})
    });
    let redacted = redact(&payload, config)?;
    let serialized = serialize_canonical(&redacted);

    let mut tags = CodecTags::plain();
    let mut bytes = serialized;

    if config.compression_enabled {
        match compress::compress(&bytes, config.compression_level) {
            Ok(compressed) => {
                bytes = compressed;
                tags.compressed = true;
            }
            Err(_err) => {
                // Degraded: persist uncompressed rather than drop the event.
            }
        }
    }

    if config.encryption_enabled {
        if let Some(key) = &config.encryption_key {
            let encrypted = encrypt::encrypt(&bytes, key)
                .map_err(|err| EncodeError::Encryption(err.to_string()))?;
            bytes = encrypted;
            tags.encrypted = true;
        }
    }

    Ok((bytes, tags))
}

#[cfg(test)]
mod tests {
    use super::encode;
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
            payload: EventPayload::ToolCall {
                tool_name: "search".to_owned(),
                tool_args: serde_json::json!({"api_key": "sk-12345"}),
                tool_result: serde_json::json!({"hits": 1}),
            },
        }
    }

    #[test]
    fn redacted_keys_never_reach_the_stored_blob() {
        let overrides = ConfigOverrides {
            redact_keys: Some(vec!["api_key".to_owned()]),
            ..ConfigOverrides::default()
        };
        let config = Config::load(Preset::Debug, None, overrides).expect("load");
        let (blob, tags) = encode(&sample_event(), &config).expect("encode");
        assert!(!tags.compressed);
        assert!(!tags.encrypted);
        let text = String::from_utf8(blob).expect("utf8");
        assert!(!text.contains("sk-12345"));
    }

    #[test]
    fn compression_and_encryption_tags_match_config() {
        let overrides = ConfigOverrides {
            compression_enabled: Some(true),
            encryption_enabled: Some(true),
            encryption_key: Some("a-sufficiently-long-test-passphrase".to_owned()),
            ..ConfigOverrides::default()
        };
        let config = Config::load(Preset::Debug, None, overrides).expect("load");
        let (blob, tags) = encode(&sample_event(), &config).expect("encode");
        assert!(tags.compressed);
        assert!(tags.encrypted);
        assert!(!blob.is_empty());
    }
}
