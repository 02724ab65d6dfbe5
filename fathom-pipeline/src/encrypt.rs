// fathom-pipeline/src/encrypt.rs
// ============================================================================
// Module: Fathom Encryption Stage
// Description: AES-256-GCM over the post-compression bytes, nonce-per-event.
// Purpose: Fourth pipeline stage (`spec.md` §4.4, item 4).
// Dependencies: aes-gcm
// ============================================================================

//! ## Overview
//! Each call generates a fresh random 96-bit nonce and prepends it to the
//! ciphertext, so the blob is self-describing at decrypt time: no nonce
//! needs to travel alongside it out of band.

use aes_gcm::Aes256Gcm;
use aes_gcm::Key;
use aes_gcm::Nonce;
use aes_gcm::aead::Aead;
use aes_gcm::aead::AeadCore;
use aes_gcm::aead::KeyInit;
use aes_gcm::aead::OsRng;
use fathom_config::EncryptionKey;

use crate::codec::NONCE_BYTES;
use crate::error::DecodeError;

/// Encrypts `bytes` under `key`, returning `nonce || ciphertext`.
///
/// # Errors
///
/// Returns [`DecodeError::Decryption`] if the underlying cipher rejects
/// the input. The caller must not persist `bytes` tagged as encrypted in
/// that case.
pub fn encrypt(bytes: &[u8], key: &EncryptionKey) -> Result<Vec<u8>, DecodeError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, bytes)
        .map_err(|_err| DecodeError::Decryption)?;
    let mut out = Vec::with_capacity(NONCE_BYTES + ciphertext.len());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Reverses [`encrypt`].
///
/// # Errors
///
/// Returns [`DecodeError::TruncatedNonce`] if `blob` is shorter than the
/// nonce prefix, or [`DecodeError::Decryption`] if authentication fails.
pub fn decrypt(blob: &[u8], key: &EncryptionKey) -> Result<Vec<u8>, DecodeError> {
    if blob.len() < NONCE_BYTES {
        return Err(DecodeError::TruncatedNonce);
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_BYTES);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.bytes()));
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_err| DecodeError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::decrypt;
    use super::encrypt;
    use fathom_config::Config;
    use fathom_config::ConfigOverrides;
    use fathom_config::Preset;

    fn key() -> fathom_config::EncryptionKey {
        let overrides = ConfigOverrides {
            encryption_enabled: Some(true),
            encryption_key: Some("a-sufficiently-long-test-passphrase".to_owned()),
            ..ConfigOverrides::default()
        };
        let config = Config::load(Preset::Debug, None, overrides).expect("load");
        config.encryption_key.expect("key resolved")
    }

    #[test]
    fn round_trips() {
        let key = key();
        let plaintext = b"top secret event payload";
        let blob = encrypt(plaintext, &key).expect("encrypt");
        assert_ne!(&blob[super::NONCE_BYTES..], plaintext);
        let restored = decrypt(&blob, &key).expect("decrypt");
        assert_eq!(restored, plaintext);
    }

    #[test]
    fn nonce_differs_between_calls() {
        let key = key();
        let a = encrypt(b"same plaintext", &key).expect("encrypt");
        let b = encrypt(b"same plaintext", &key).expect("encrypt");
        assert_ne!(a[..super::NONCE_BYTES], b[..super::NONCE_BYTES]);
    }

    #[test]
    fn tampered_ciphertext_fails_to_authenticate() {
        let key = key();
        let mut blob = encrypt(b"payload", &key).expect("encrypt");
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        assert!(decrypt(&blob, &key).is_err());
    }
}
