// fathom-config/src/config.rs
// ============================================================================
// Module: Fathom Config
// Description: Canonical configuration model, layered loading, validation.
// Purpose: Single source of truth for `fathom.toml` / `TRACE_*` semantics.
// Dependencies: fathom-core, regex, serde, toml
// ============================================================================

//! ## Overview
//! [`Config`] is immutable once built. Layering precedence, highest wins:
//! explicit [`ConfigOverrides`] > `TRACE_*` environment variables > a
//! [`Preset`] > built-in defaults (`spec.md` §4.1). Validation is
//! fail-closed: out-of-range values and weak/missing encryption keys are
//! rejected at construction, never silently clamped.

use std::env;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable naming the config file to load.
pub const CONFIG_ENV_VAR: &str = "TRACE_CONFIG";
/// Default config file name probed when no explicit path is given.
const DEFAULT_CONFIG_NAME: &str = "fathom.toml";
/// Maximum size of a config file this crate will read.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Minimum bounded-queue capacity.
const MIN_QUEUE_SIZE: u64 = 1;
/// Maximum bounded-queue capacity; guards against runaway memory use.
const MAX_QUEUE_SIZE: u64 = 1_000_000;
/// Minimum events per exporter batch.
const MIN_BATCH_SIZE: u64 = 1;
/// Maximum events per exporter batch.
const MAX_BATCH_SIZE: u64 = 100_000;
/// Minimum gzip compression level.
const MIN_COMPRESSION_LEVEL: u32 = 1;
/// Maximum gzip compression level.
const MAX_COMPRESSION_LEVEL: u32 = 9;
/// Minimum length, in bytes, of a raw encryption key or passphrase.
const MIN_KEY_MATERIAL_BYTES: usize = 16;
/// Size, in bytes, of a raw (non-derived) AES-256 key.
const RAW_KEY_BYTES: usize = 32;
/// Default blob size guard: events producing a blob larger than this are
/// dropped rather than stored (`spec.md` §4.8).
const DEFAULT_BLOB_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Default sampling fraction.
const DEFAULT_SAMPLE_RATE: f64 = 1.0;
/// Default bounded-queue capacity.
const DEFAULT_QUEUE_SIZE: u64 = 2048;
/// Default exporter batch size.
const DEFAULT_BATCH_SIZE: u64 = 256;
/// Default max staleness, in milliseconds, of a partial batch.
const DEFAULT_BATCH_TIMEOUT_MS: u64 = 1_000;
/// Default gzip level.
const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
/// Default storage file path.
const DEFAULT_DB_PATH: &str = "fathom.db";
/// Default retention window, in days.
const DEFAULT_RETENTION_DAYS: u64 = 30;
/// Default max wait for a `run_end` bounded-wait enqueue.
const DEFAULT_RUN_END_BLOCK_TIMEOUT_MS: u64 = 2_000;

/// Marker substituted for any redacted value.
pub const REDACTION_MARKER: &str = "***REDACTED***";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric field fell outside its accepted range.
    #[error("{field} must be between {min} and {max}, got {actual}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Minimum accepted value, inclusive.
        min: String,
        /// Maximum accepted value, inclusive.
        max: String,
        /// Value that was rejected.
        actual: String,
    },
    /// A `redact_patterns` entry did not compile as a regular expression.
    #[error("invalid redaction pattern {pattern:?}: {source}")]
    InvalidRegex {
        /// The offending pattern text.
        pattern: String,
        /// Underlying compiler error.
        #[source]
        source: regex::Error,
    },
    /// Encryption was enabled but no key was supplied.
    #[error("encryption_enabled is true but no encryption_key was provided")]
    MissingKey,
    /// The supplied key or passphrase was shorter than the accepted
    /// minimum.
    #[error(
        "encryption_key material is too short ({actual} bytes, minimum {min})"
    )]
    WeakKey {
        /// Length of the supplied material, in bytes.
        actual: usize,
        /// Minimum accepted length, in bytes.
        min: usize,
    },
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file exceeded [`MAX_CONFIG_FILE_SIZE`].
    #[error("config file {path} is {actual} bytes, exceeding the {max} byte limit")]
    FileTooLarge {
        /// Path of the oversized file.
        path: PathBuf,
        /// Actual file size in bytes.
        actual: u64,
        /// Maximum accepted size in bytes.
        max: u64,
    },
    /// The config file did not parse as TOML.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying parser error.
        #[source]
        source: Box<toml::de::Error>,
    },
    /// A `TRACE_*` environment variable held a value of the wrong shape.
    #[error("environment variable {var} has an invalid value: {reason}")]
    InvalidEnvValue {
        /// Name of the offending variable.
        var: &'static str,
        /// Human-readable reason the value was rejected.
        reason: String,
    },
}

// ============================================================================
// SECTION: Presets
// ============================================================================

/// Named starting points layered under the file and environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Low sampling, compression and encryption on. Intended for
    /// production deployments.
    Production,
    /// Moderate sampling, compression on, encryption off. Intended for
    /// local development.
    Development,
    /// Full sampling, no compression, no encryption, one event per
    /// batch. Intended for debugging the pipeline itself.
    Debug,
}

impl Preset {
    /// Parses a preset name as accepted on the CLI and in `TRACE_PROFILE`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnvValue`] for any value other than
    /// `production`, `development`, or `debug`.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            "debug" => Ok(Self::Debug),
            other => Err(ConfigError::InvalidEnvValue {
                var: "TRACE_PROFILE",
                reason: format!("unknown profile {other:?}"),
            }),
        }
    }

    fn overrides(self) -> ConfigOverrides {
        match self {
            Self::Production => ConfigOverrides {
                sample_rate: Some(0.01),
                compression_enabled: Some(true),
                encryption_enabled: Some(true),
                ..ConfigOverrides::default()
            },
            Self::Development => ConfigOverrides {
                sample_rate: Some(0.5),
                compression_enabled: Some(true),
                encryption_enabled: Some(false),
                ..ConfigOverrides::default()
            },
            Self::Debug => ConfigOverrides {
                sample_rate: Some(1.0),
                compression_enabled: Some(false),
                encryption_enabled: Some(false),
                batch_size: Some(1),
                ..ConfigOverrides::default()
            },
        }
    }
}

// ============================================================================
// SECTION: Key material
// ============================================================================

/// Resolved 32-byte symmetric key material for the pipeline's encryption
/// stage.
#[derive(Clone)]
pub struct EncryptionKey([u8; RAW_KEY_BYTES]);

impl EncryptionKey {
    /// Returns the raw key bytes.
    #[must_use]
    pub const fn bytes(&self) -> &[u8; RAW_KEY_BYTES] {
        &self.0
    }

    /// Resolves key material supplied as config: a 64-character lowercase
    /// hex string is used as a raw key, anything else is treated as a
    /// passphrase and derived via SHA-256.
    fn resolve(material: &str) -> Self {
        if material.len() == RAW_KEY_BYTES * 2 {
            if let Some(bytes) = hex_decode(material) {
                return Self(bytes);
            }
        }
        let mut hasher = Sha256::new();
        hasher.update(material.as_bytes());
        let digest = hasher.finalize();
        let mut out = [0_u8; RAW_KEY_BYTES];
        out.copy_from_slice(&digest);
        Self(out)
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

fn hex_decode(value: &str) -> Option<[u8; RAW_KEY_BYTES]> {
    let mut out = [0_u8; RAW_KEY_BYTES];
    if value.len() != RAW_KEY_BYTES * 2 {
        return None;
    }
    for (index, chunk) in value.as_bytes().chunks(2).enumerate() {
        let high = (chunk[0] as char).to_digit(16)?;
        let low = (chunk[1] as char).to_digit(16)?;
        out[index] = ((high << 4) | low) as u8;
    }
    Some(out)
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Immutable, validated Fathom configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Fraction of runs recorded, `0.0..=1.0`.
    pub sample_rate: f64,
    /// When true, events are buffered in-memory and only emitted if the
    /// run ends in `failed`.
    pub only_on_error: bool,
    /// Capacity of the ingestion channel.
    pub queue_size: usize,
    /// Max events per exporter call.
    pub batch_size: usize,
    /// Max staleness, in milliseconds, of a partial batch.
    pub batch_timeout_ms: u64,
    /// Keys whose values are replaced with the redaction marker, at any
    /// depth. Case-sensitive, exact match.
    pub redact_keys: Vec<String>,
    /// Compiled patterns applied to string values at any depth; a full
    /// match replaces the entire string with the redaction marker.
    pub redact_patterns: Vec<regex::Regex>,
    /// Enables the gzip compression stage.
    pub compression_enabled: bool,
    /// Gzip level, `1..=9`.
    pub compression_level: u32,
    /// Enables the AES-256-GCM encryption stage.
    pub encryption_enabled: bool,
    /// Resolved key material, present iff `encryption_enabled`.
    pub encryption_key: Option<EncryptionKey>,
    /// Storage file path.
    pub db_path: PathBuf,
    /// Retention window used by `prune`, in days.
    pub retention_days: u64,
    /// If true, `run_end` submissions may wait for queue capacity.
    pub block_on_run_end: bool,
    /// Max wait, in milliseconds, for a `run_end` bounded-wait enqueue.
    pub run_end_block_timeout_ms: u64,
    /// Blobs larger than this are dropped rather than stored.
    pub blob_max_bytes: u64,
}

impl Config {
    /// Loads configuration with the documented precedence: defaults,
    /// then `preset`, then the TOML file at `file_path` (or
    /// [`DEFAULT_CONFIG_NAME`] / `TRACE_CONFIG` when `None`, if present),
    /// then `TRACE_*` environment variables, then `overrides`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, if an
    /// environment variable holds a malformed value, or if the final
    /// merged configuration fails [`Self::validate`].
    pub fn load(
        preset: Preset,
        file_path: Option<&Path>,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut merged = ConfigOverrides::defaults();
        merged.merge(preset.overrides());
        if let Some(from_file) = load_file_overrides(file_path)? {
            merged.merge(from_file);
        }
        merged.merge(ConfigOverrides::from_env()?);
        merged.merge(overrides);
        merged.into_config()
    }

    /// Validates the documented invariants on an already-constructed
    /// [`Config`]. Called automatically by [`Self::load`]; exposed so
    /// callers building a `Config` directly (e.g. in tests) can validate
    /// it too.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("sample_rate", self.sample_rate, 0.0, 1.0)?;
        check_range_u64(
            "queue_size",
            self.queue_size as u64,
            MIN_QUEUE_SIZE,
            MAX_QUEUE_SIZE,
        )?;
        check_range_u64(
            "batch_size",
            self.batch_size as u64,
            MIN_BATCH_SIZE,
            MAX_BATCH_SIZE,
        )?;
        check_range_u64("batch_timeout_ms", self.batch_timeout_ms, 1, u64::MAX)?;
        check_range_u64(
            "compression_level",
            u64::from(self.compression_level),
            u64::from(MIN_COMPRESSION_LEVEL),
            u64::from(MAX_COMPRESSION_LEVEL),
        )?;
        if self.encryption_enabled && self.encryption_key.is_none() {
            return Err(ConfigError::MissingKey);
        }
        Ok(())
    }

    /// Returns the effective preset-independent option table as
    /// `(name, value)` pairs, used by [`crate::docs::config_docs_markdown`].
    #[must_use]
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        vec![
            ("sample_rate", self.sample_rate.to_string()),
            ("only_on_error", self.only_on_error.to_string()),
            ("queue_size", self.queue_size.to_string()),
            ("batch_size", self.batch_size.to_string()),
            ("batch_timeout_ms", self.batch_timeout_ms.to_string()),
            ("compression_enabled", self.compression_enabled.to_string()),
            ("compression_level", self.compression_level.to_string()),
            ("encryption_enabled", self.encryption_enabled.to_string()),
            ("db_path", self.db_path.display().to_string()),
            ("retention_days", self.retention_days.to_string()),
            ("block_on_run_end", self.block_on_run_end.to_string()),
            (
                "run_end_block_timeout_ms",
                self.run_end_block_timeout_ms.to_string(),
            ),
            ("blob_max_bytes", self.blob_max_bytes.to_string()),
        ]
    }
}

// ============================================================================
// SECTION: Overrides
// ============================================================================

/// Every field optional; used to merge defaults, a preset, a file, the
/// environment, and explicit caller overrides in precedence order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    /// See [`Config::sample_rate`].
    pub sample_rate: Option<f64>,
    /// See [`Config::only_on_error`].
    pub only_on_error: Option<bool>,
    /// See [`Config::queue_size`].
    pub queue_size: Option<usize>,
    /// See [`Config::batch_size`].
    pub batch_size: Option<usize>,
    /// See [`Config::batch_timeout_ms`].
    pub batch_timeout_ms: Option<u64>,
    /// See [`Config::redact_keys`].
    pub redact_keys: Option<Vec<String>>,
    /// Raw (uncompiled) redaction patterns.
    pub redact_patterns: Option<Vec<String>>,
    /// See [`Config::compression_enabled`].
    pub compression_enabled: Option<bool>,
    /// See [`Config::compression_level`].
    pub compression_level: Option<u32>,
    /// See [`Config::encryption_enabled`].
    pub encryption_enabled: Option<bool>,
    /// Raw key or passphrase, before resolution to [`EncryptionKey`].
    pub encryption_key: Option<String>,
    /// See [`Config::db_path`].
    pub db_path: Option<PathBuf>,
    /// See [`Config::retention_days`].
    pub retention_days: Option<u64>,
    /// See [`Config::block_on_run_end`].
    pub block_on_run_end: Option<bool>,
    /// See [`Config::run_end_block_timeout_ms`].
    pub run_end_block_timeout_ms: Option<u64>,
    /// See [`Config::blob_max_bytes`].
    pub blob_max_bytes: Option<u64>,
}

impl ConfigOverrides {
    /// Returns the built-in defaults as an overrides layer, the lowest
    /// precedence layer in [`Config::load`].
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            sample_rate: Some(DEFAULT_SAMPLE_RATE),
            only_on_error: Some(false),
            queue_size: Some(DEFAULT_QUEUE_SIZE as usize),
            batch_size: Some(DEFAULT_BATCH_SIZE as usize),
            batch_timeout_ms: Some(DEFAULT_BATCH_TIMEOUT_MS),
            redact_keys: Some(Vec::new()),
            redact_patterns: Some(Vec::new()),
            compression_enabled: Some(false),
            compression_level: Some(DEFAULT_COMPRESSION_LEVEL),
            encryption_enabled: Some(false),
            encryption_key: None,
            db_path: Some(PathBuf::from(DEFAULT_DB_PATH)),
            retention_days: Some(DEFAULT_RETENTION_DAYS),
            block_on_run_end: Some(false),
            run_end_block_timeout_ms: Some(DEFAULT_RUN_END_BLOCK_TIMEOUT_MS),
            blob_max_bytes: Some(DEFAULT_BLOB_MAX_BYTES),
        }
    }

    /// Overlays `other` on top of `self`; any field set in `other` wins.
    pub fn merge(&mut self, other: Self) {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field;
                }
            };
        }
        take!(sample_rate);
        take!(only_on_error);
        take!(queue_size);
        take!(batch_size);
        take!(batch_timeout_ms);
        take!(redact_keys);
        take!(redact_patterns);
        take!(compression_enabled);
        take!(compression_level);
        take!(encryption_enabled);
        take!(encryption_key);
        take!(db_path);
        take!(retention_days);
        take!(block_on_run_end);
        take!(run_end_block_timeout_ms);
        take!(blob_max_bytes);
    }

    /// Reads `TRACE_*` environment variables as an overrides layer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnvValue`] when a variable is present
    /// but cannot be parsed into its field's type.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut overrides = Self::default();
        if let Some(value) = read_env("TRACE_SAMPLE_RATE")? {
            overrides.sample_rate = Some(parse_env("TRACE_SAMPLE_RATE", &value)?);
        }
        if let Some(value) = read_env("TRACE_ONLY_ON_ERROR")? {
            overrides.only_on_error = Some(parse_env("TRACE_ONLY_ON_ERROR", &value)?);
        }
        if let Some(value) = read_env("TRACE_QUEUE_SIZE")? {
            overrides.queue_size = Some(parse_env("TRACE_QUEUE_SIZE", &value)?);
        }
        if let Some(value) = read_env("TRACE_BATCH_SIZE")? {
            overrides.batch_size = Some(parse_env("TRACE_BATCH_SIZE", &value)?);
        }
        if let Some(value) = read_env("TRACE_BATCH_TIMEOUT_MS")? {
            overrides.batch_timeout_ms = Some(parse_env("TRACE_BATCH_TIMEOUT_MS", &value)?);
        }
        if let Some(value) = read_env("TRACE_REDACT_KEYS")? {
            overrides.redact_keys =
                Some(value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect());
        }
        if let Some(value) = read_env("TRACE_COMPRESSION_ENABLED")? {
            overrides.compression_enabled = Some(parse_env("TRACE_COMPRESSION_ENABLED", &value)?);
        }
        if let Some(value) = read_env("TRACE_COMPRESSION_LEVEL")? {
            overrides.compression_level = Some(parse_env("TRACE_COMPRESSION_LEVEL", &value)?);
        }
        if let Some(value) = read_env("TRACE_ENCRYPTION_ENABLED")? {
            overrides.encryption_enabled = Some(parse_env("TRACE_ENCRYPTION_ENABLED", &value)?);
        }
        if let Some(value) = read_env("TRACE_ENCRYPTION_KEY")? {
            overrides.encryption_key = Some(value);
        }
        if let Some(value) = read_env("TRACE_DB_PATH")? {
            overrides.db_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("TRACE_RETENTION_DAYS")? {
            overrides.retention_days = Some(parse_env("TRACE_RETENTION_DAYS", &value)?);
        }
        if let Some(value) = read_env("TRACE_BLOCK_ON_RUN_END")? {
            overrides.block_on_run_end = Some(parse_env("TRACE_BLOCK_ON_RUN_END", &value)?);
        }
        if let Some(value) = read_env("TRACE_RUN_END_BLOCK_TIMEOUT_MS")? {
            overrides.run_end_block_timeout_ms =
                Some(parse_env("TRACE_RUN_END_BLOCK_TIMEOUT_MS", &value)?);
        }
        Ok(overrides)
    }

    fn into_config(self) -> Result<Config, ConfigError> {
        let redact_keys = self.redact_keys.unwrap_or_default();
        let raw_patterns = self.redact_patterns.unwrap_or_default();
        let mut redact_patterns = Vec::with_capacity(raw_patterns.len());
        for pattern in raw_patterns {
            let compiled = regex::Regex::new(&pattern).map_err(|source| ConfigError::InvalidRegex {
                pattern: pattern.clone(),
                source,
            })?;
            redact_patterns.push(compiled);
        }

        let encryption_enabled = self.encryption_enabled.unwrap_or(false);
        let encryption_key = match self.encryption_key {
            Some(material) if encryption_enabled || !material.is_empty() => {
                if material.len() < MIN_KEY_MATERIAL_BYTES {
                    return Err(ConfigError::WeakKey {
                        actual: material.len(),
                        min: MIN_KEY_MATERIAL_BYTES,
                    });
                }
                Some(EncryptionKey::resolve(&material))
            }
            _ => None,
        };

        let config = Config {
            sample_rate: self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            only_on_error: self.only_on_error.unwrap_or(false),
            queue_size: self.queue_size.unwrap_or(DEFAULT_QUEUE_SIZE as usize),
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE as usize),
            batch_timeout_ms: self.batch_timeout_ms.unwrap_or(DEFAULT_BATCH_TIMEOUT_MS),
            redact_keys,
            redact_patterns,
            compression_enabled: self.compression_enabled.unwrap_or(false),
            compression_level: self.compression_level.unwrap_or(DEFAULT_COMPRESSION_LEVEL),
            encryption_enabled,
            encryption_key,
            db_path: self.db_path.unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            retention_days: self.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS),
            block_on_run_end: self.block_on_run_end.unwrap_or(false),
            run_end_block_timeout_ms: self
                .run_end_block_timeout_ms
                .unwrap_or(DEFAULT_RUN_END_BLOCK_TIMEOUT_MS),
            blob_max_bytes: self.blob_max_bytes.unwrap_or(DEFAULT_BLOB_MAX_BYTES),
        };
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// SECTION: File loading
// ============================================================================

fn load_file_overrides(explicit: Option<&Path>) -> Result<Option<ConfigOverrides>, ConfigError> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => env::var(CONFIG_ENV_VAR)
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                let default_path = PathBuf::from(DEFAULT_CONFIG_NAME);
                default_path.exists().then_some(default_path)
            }),
    };
    let Some(path) = path else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    let metadata = std::fs::metadata(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::FileTooLarge {
            path,
            actual: metadata.len(),
            max: MAX_CONFIG_FILE_SIZE,
        });
    }
    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let overrides = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path,
        source: Box::new(source),
    })?;
    Ok(Some(overrides))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn read_env(name: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidEnvValue {
            var: name,
            reason: "value is not valid UTF-8".to_owned(),
        }),
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_err| ConfigError::InvalidEnvValue {
        var: name,
        reason: format!("could not parse {value:?}"),
    })
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            min: min.to_string(),
            max: max.to_string(),
            actual: value.to_string(),
        });
    }
    Ok(())
}

fn check_range_u64(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            min: min.to_string(),
            max: max.to_string(),
            actual: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Config;
    use super::ConfigError;
    use super::ConfigOverrides;
    use super::Preset;

    #[test]
    fn defaults_validate_cleanly() {
        let config = Config::load(Preset::Debug, None, ConfigOverrides::default()).expect("load");
        assert!((config.sample_rate - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.batch_size, 1);
        assert!(!config.compression_enabled);
    }

    #[test]
    fn explicit_overrides_win_over_preset() {
        let overrides = ConfigOverrides {
            sample_rate: Some(0.25),
            ..ConfigOverrides::default()
        };
        let config = Config::load(Preset::Production, None, overrides).expect("load");
        assert!((config.sample_rate - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_sample_rate_is_rejected() {
        let overrides = ConfigOverrides {
            sample_rate: Some(1.5),
            ..ConfigOverrides::default()
        };
        let err = Config::load(Preset::Debug, None, overrides).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "sample_rate", .. }));
    }

    #[test]
    fn encryption_without_key_is_rejected() {
        let overrides = ConfigOverrides {
            encryption_enabled: Some(true),
            ..ConfigOverrides::default()
        };
        let err = Config::load(Preset::Debug, None, overrides).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey));
    }

    #[test]
    fn invalid_redact_pattern_is_rejected() {
        let overrides = ConfigOverrides {
            redact_patterns: Some(vec!["(".to_owned()]),
            ..ConfigOverrides::default()
        };
        let err = Config::load(Preset::Debug, None, overrides).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { .. }));
    }

    #[test]
    fn production_preset_enables_compression_and_encryption() {
        let overrides = ConfigOverrides {
            encryption_key: Some("a-sufficiently-long-passphrase".to_owned()),
            ..ConfigOverrides::default()
        };
        let config = Config::load(Preset::Production, None, overrides).expect("load");
        assert!(config.compression_enabled);
        assert!(config.encryption_enabled);
        assert!(config.encryption_key.is_some());
    }
}
