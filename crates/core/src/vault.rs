//! Symmetric encryption for per-user credential material at rest.
//!
//! Ciphertext format is `hex(nonce):hex(payload)` with a literal `:`
//! separator and a fresh random nonce per call, so the same plaintext
//! never encrypts to the same value twice. The key is derived once per
//! process from the configured secret: a 64-char hex secret is used
//! directly as key bytes, anything else is hashed to key length.
//!
//! Decryption failures are deterministic and typed so upstream code can
//! tell "needs migration" from "corrupt data" from "wrong key".

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Values written before the vault existed carry this prefix. They must
/// be re-encrypted by a migration, not decrypted here.
pub const LEGACY_MARKER: &str = "legacy:v1:";

/// AES-256 key length in bytes.
const KEY_LENGTH: usize = 32;

/// AES-GCM standard nonce length in bytes.
const NONCE_LENGTH: usize = 12;

/// Why a ciphertext could not be decrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VaultError {
    /// The value carries [`LEGACY_MARKER`] and needs migration.
    #[error("ciphertext uses the legacy format and must be migrated")]
    NeedsMigration,

    /// The value does not match the `hex:hex` shape.
    #[error("ciphertext does not match the expected nonce:payload hex shape")]
    InvalidFormat,

    /// Authentication failed: wrong key or corrupt data.
    #[error("decryption failed (wrong key or corrupt data)")]
    DecryptFailed,
}

/// Encrypts and decrypts credential strings with a process-wide key.
///
/// Pure transform of input + key: no I/O, safe to share behind an `Arc`.
pub struct Vault {
    cipher: Aes256Gcm,
}

impl Vault {
    /// Build a vault from the configured secret.
    pub fn new(secret: &str) -> Self {
        let key = derive_key(secret);
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
        }
    }

    /// Encrypt a plaintext string into `hex(nonce):hex(payload)`.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::rng().fill(&mut nonce_bytes[..]);

        let payload = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .expect("AES-GCM encryption of an in-memory buffer cannot fail");

        format!("{}:{}", hex::encode(&nonce_bytes), hex::encode(&payload))
    }

    /// Decrypt a `hex(nonce):hex(payload)` ciphertext.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, VaultError> {
        if ciphertext.starts_with(LEGACY_MARKER) {
            return Err(VaultError::NeedsMigration);
        }

        let (nonce_hex, payload_hex) = ciphertext
            .split_once(':')
            .ok_or(VaultError::InvalidFormat)?;
        let nonce = hex::decode(nonce_hex).ok_or(VaultError::InvalidFormat)?;
        let payload = hex::decode(payload_hex).ok_or(VaultError::InvalidFormat)?;
        if nonce.len() != NONCE_LENGTH || payload.is_empty() {
            return Err(VaultError::InvalidFormat);
        }

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), payload.as_ref())
            .map_err(|_| VaultError::DecryptFailed)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::DecryptFailed)
    }
}

/// Derive the 32-byte key from the configured secret.
///
/// A secret that is already a valid hex string of key length is decoded
/// directly; anything else is hashed to key length with SHA-256.
fn derive_key(secret: &str) -> [u8; KEY_LENGTH] {
    if secret.len() == KEY_LENGTH * 2 {
        if let Some(bytes) = hex::decode(secret) {
            let mut key = [0u8; KEY_LENGTH];
            key.copy_from_slice(&bytes);
            return key;
        }
    }
    Sha256::digest(secret.as_bytes()).into()
}

/// hex encoding helpers (no extra dep)
mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Decode a hex string; `None` on odd length or non-hex characters.
    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn vault() -> Vault {
        Vault::new("test-secret")
    }

    // -- Round trip ---------------------------------------------------------

    #[test]
    fn decrypt_recovers_encrypted_plaintext() {
        let v = vault();
        for plaintext in ["", "refresh-token-value", "appid:with:colons", "über 🦀"] {
            let ct = v.encrypt(plaintext);
            assert_eq!(v.decrypt(&ct).unwrap(), plaintext);
        }
    }

    #[test]
    fn ciphertext_is_nonce_payload_hex() {
        let ct = vault().encrypt("secret");
        let (nonce, payload) = ct.split_once(':').expect("must contain separator");
        assert_eq!(nonce.len(), NONCE_LENGTH * 2);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(payload.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let v = vault();
        assert_ne!(v.encrypt("secret"), v.encrypt("secret"));
    }

    // -- Key derivation -----------------------------------------------------

    #[test]
    fn hex_secret_is_used_as_raw_key() {
        let hex_secret = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
        let a = Vault::new(hex_secret);
        let b = Vault::new(hex_secret);
        let ct = a.encrypt("x");
        assert_eq!(b.decrypt(&ct).unwrap(), "x");
    }

    #[test]
    fn non_hex_secret_of_hex_length_is_hashed() {
        // 64 chars but not valid hex: must fall through to hashing
        // rather than failing key derivation.
        let secret = "zz112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
        let v = Vault::new(secret);
        let ct = v.encrypt("x");
        assert_eq!(v.decrypt(&ct).unwrap(), "x");
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let ct = Vault::new("key-a").encrypt("secret");
        assert_matches!(
            Vault::new("key-b").decrypt(&ct),
            Err(VaultError::DecryptFailed)
        );
    }

    // -- Failure shapes -----------------------------------------------------

    #[test]
    fn legacy_marker_reports_needs_migration() {
        assert_matches!(
            vault().decrypt("legacy:v1:old-plaintext-value"),
            Err(VaultError::NeedsMigration)
        );
    }

    #[test]
    fn missing_separator_is_invalid_format() {
        assert_matches!(vault().decrypt("deadbeef"), Err(VaultError::InvalidFormat));
    }

    #[test]
    fn non_hex_parts_are_invalid_format() {
        assert_matches!(
            vault().decrypt("not-hex:alsonothex"),
            Err(VaultError::InvalidFormat)
        );
    }

    #[test]
    fn wrong_nonce_length_is_invalid_format() {
        assert_matches!(
            vault().decrypt("deadbeef:00112233445566778899"),
            Err(VaultError::InvalidFormat)
        );
    }

    #[test]
    fn tampered_payload_fails_authentication() {
        let v = vault();
        let ct = v.encrypt("secret");
        let (nonce, payload) = ct.split_once(':').unwrap();
        // Flip the last hex digit of the payload.
        let flipped = if payload.ends_with('0') { "1" } else { "0" };
        let tampered = format!("{nonce}:{}{}", &payload[..payload.len() - 1], flipped);
        assert_matches!(v.decrypt(&tampered), Err(VaultError::DecryptFailed));
    }

    // -- hex helpers --------------------------------------------------------

    #[test]
    fn hex_decode_round_trips() {
        let bytes = vec![0u8, 1, 127, 128, 255];
        assert_eq!(hex::decode(&hex::encode(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn hex_decode_rejects_odd_length() {
        assert_eq!(hex::decode("abc"), None);
    }
}
