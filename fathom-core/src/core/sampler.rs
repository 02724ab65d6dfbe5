// fathom-core/src/core/sampler.rs
// ============================================================================
// Module: Fathom Sampler
// Description: Deterministic, pluggable run-sampling decision.
// Purpose: Decide, once per run, whether a run is traced.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! The sampler is consulted exactly once per run, at `run_start`; the
//! decision is cached on the run context and every subsequent event in the
//! run inherits it. The default implementation is a deterministic hash of
//! the run id so the same run id always samples the same way, in any
//! process, which is what makes the decision reproducible for tests and
//! for replays (`spec.md` §8, invariant 8).

use sha2::Digest;
use sha2::Sha256;

use crate::core::identifiers::RunId;

/// Interface for pluggable sampling strategies.
pub trait Sampler: Send + Sync {
    /// Returns whether the run identified by `run_id` should be traced.
    fn should_sample(&self, run_id: &RunId, run_name: &str, sample_rate: f64) -> bool;
}

/// Default sampler: `hash(run_id) / 2^64 < sample_rate`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashSampler;

impl Sampler for HashSampler {
    fn should_sample(&self, run_id: &RunId, _run_name: &str, sample_rate: f64) -> bool {
        should_sample(run_id, sample_rate)
    }
}

/// Computes the default hash-based sampling decision directly, without
/// constructing a [`HashSampler`].
#[must_use]
pub fn should_sample(run_id: &RunId, sample_rate: f64) -> bool {
    if sample_rate <= 0.0 {
        return false;
    }
    if sample_rate >= 1.0 {
        return true;
    }
    let fraction = unit_interval_hash(run_id.as_str().as_bytes());
    fraction < sample_rate
}

/// Hashes `bytes` with SHA-256 and maps the first eight digest bytes onto
/// `[0, 1)` as a big-endian fraction of `2^64`.
fn unit_interval_hash(bytes: &[u8]) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut prefix = [0_u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let value = u64::from_be_bytes(prefix);
    (value as f64) / 2_f64.powi(64)
}

#[cfg(test)]
mod tests {
    use super::HashSampler;
    use super::Sampler;
    use super::should_sample;
    use crate::core::identifiers::RunId;

    #[test]
    fn zero_rate_never_samples() {
        let run_id = RunId::new();
        assert!(!should_sample(&run_id, 0.0));
    }

    #[test]
    fn full_rate_always_samples() {
        let run_id = RunId::new();
        assert!(should_sample(&run_id, 1.0));
    }

    #[test]
    fn decision_is_stable_for_a_fixed_run_id() {
        let run_id = RunId::from_raw("fixed-run-id-for-determinism-test");
        let first = should_sample(&run_id, 0.5);
        let second = should_sample(&run_id, 0.5);
        assert_eq!(first, second);
    }

    #[test]
    fn sampler_trait_delegates_to_default_impl() {
        let run_id = RunId::from_raw("fixed-run-id-for-determinism-test");
        let sampler = HashSampler;
        assert_eq!(
            sampler.should_sample(&run_id, "demo", 0.5),
            should_sample(&run_id, 0.5)
        );
    }
}
