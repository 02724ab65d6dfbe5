// fathom-pipeline/src/compress.rs
// ============================================================================
// Module: Fathom Compression Stage
// Description: Gzip the serialized payload.
// Purpose: Third pipeline stage (`spec.md` §4.4, item 3).
// Dependencies: flate2
// ============================================================================

use std::io::Write as _;

use flate2::Compression;
use flate2::write::GzEncoder;
use flate2::read::GzDecoder;
use std::io::Read as _;

/// Gzips `bytes` at `level` (`1..=9`).
///
/// # Errors
///
/// Returns the underlying I/O error if the in-memory encoder fails, which
/// should only happen under allocation failure.
pub fn compress(bytes: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// Reverses [`compress`].
///
/// # Errors
///
/// Returns the underlying I/O error if `bytes` is not a valid gzip
/// stream.
pub fn decompress(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::compress;
    use super::decompress;

    #[test]
    fn round_trips() {
        let original = b"the quick brown fox jumps over the lazy dog".repeat(16);
        let compressed = compress(&original, 6).expect("compress");
        assert!(compressed.len() < original.len());
        let restored = decompress(&compressed).expect("decompress");
        assert_eq!(restored, original);
    }

    #[test]
    fn garbage_fails_to_decompress() {
        assert!(decompress(b"not gzip").is_err());
    }
}
