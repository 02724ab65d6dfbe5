// fathom-config/src/examples.rs
// ============================================================================
// Module: Fathom Config Examples
// Description: A ready-to-edit `fathom.toml`.
// Purpose: Back the `fathom init` CLI command.
// Dependencies: none
// ============================================================================

//! ## Overview
//! [`example_config_toml`] returns the file written by `fathom init`. Every
//! key matches a [`crate::config::ConfigOverrides`] field.

/// Returns a commented, ready-to-edit `fathom.toml`.
#[must_use]
pub const fn example_config_toml() -> &'static str {
    r#"# Fathom configuration.
# Values here are layered under TRACE_* environment variables and any
# explicit overrides passed to Config::load, and on top of the chosen
# preset's defaults (production / development / debug).

# Fraction of runs recorded, 0.0..=1.0.
sample_rate = 1.0

# Buffer events in memory and only emit them if the run ends failed.
only_on_error = false

# Capacity of the ingestion channel.
queue_size = 2048

# Max events per exporter batch.
batch_size = 256

# Max staleness, in milliseconds, of a partial batch.
batch_timeout_ms = 1000

# Keys whose values are always replaced with the redaction marker.
redact_keys = ["api_key", "authorization", "password"]

# Regex patterns matched against string values at any depth.
redact_patterns = []

# Gzip the serialized event blob before storage.
compression_enabled = false
compression_level = 6

# Encrypt the (optionally compressed) blob with AES-256-GCM.
encryption_enabled = false
# encryption_key = "set via TRACE_ENCRYPTION_KEY instead of committing it here"

# Where the SQLite store keeps its data.
db_path = "fathom.db"

# Retention window used by `fathom prune`, in days.
retention_days = 30

# Allow run_end submissions to wait for queue capacity instead of
# dropping immediately.
block_on_run_end = false
run_end_block_timeout_ms = 2000

# Blobs larger than this are dropped rather than stored.
blob_max_bytes = 10485760
"#
}

#[cfg(test)]
mod tests {
    use super::example_config_toml;

    #[test]
    fn parses_as_valid_overrides() {
        let overrides: crate::config::ConfigOverrides =
            toml::from_str(example_config_toml()).expect("parse");
        assert_eq!(overrides.sample_rate, Some(1.0));
        assert_eq!(overrides.db_path.as_deref(), Some(std::path::Path::new("fathom.db")));
    }
}
