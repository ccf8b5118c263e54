//! Encryption at rest for memory content.
//!
//! Content is sealed with AES-256-GCM under a key derived once from the
//! deployment secret (PBKDF2-HMAC-SHA256, fixed salt). Every call to
//! [`Cipher::encrypt`] draws a fresh 96-bit nonce from the OS CSPRNG, so nonce
//! reuse cannot happen across restarts. Decryption either returns the full
//! plaintext or an error; there is no best-effort path.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce, Tag};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Salt for key derivation. Changing it makes every stored blob unreadable.
pub const KDF_SALT: &[u8] = b"memorylink_salt_2024";

/// PBKDF2 iteration count.
pub const KDF_ITERATIONS: u32 = 100_000;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption secret is not configured")]
    MissingSecret,

    #[error("cipher failure: {0}")]
    Encryption(String),

    #[error("ciphertext failed tag verification")]
    Authentication,

    #[error("{0}")]
    Format(String),
}

/// Sealed memory content. Only this is ever written to disk.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
    tag: [u8; TAG_LEN],
}

impl EncryptedBlob {
    /// Reassemble a blob from its stored columns.
    pub fn from_parts(nonce: &[u8], ciphertext: Vec<u8>, tag: &[u8]) -> Result<Self, CryptoError> {
        let nonce: [u8; NONCE_LEN] = nonce.try_into().map_err(|_| {
            CryptoError::Format(format!(
                "nonce must be {NONCE_LEN} bytes, got {}",
                nonce.len()
            ))
        })?;
        let tag: [u8; TAG_LEN] = tag.try_into().map_err(|_| {
            CryptoError::Format(format!("tag must be {TAG_LEN} bytes, got {}", tag.len()))
        })?;
        Ok(Self {
            nonce,
            ciphertext,
            tag,
        })
    }

    /// Parse the packed `nonce ‖ tag ‖ ciphertext` layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Format(format!(
                "blob is {} bytes, shorter than nonce and tag",
                bytes.len()
            )));
        }
        let (nonce, rest) = bytes.split_at(NONCE_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);
        Self::from_parts(nonce, ciphertext.to_vec(), tag)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + TAG_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.tag);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn tag(&self) -> &[u8] {
        &self.tag
    }
}

impl std::fmt::Debug for EncryptedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedBlob")
            .field("nonce", &hex::encode(self.nonce))
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

/// Symmetric cipher holding the process-lifetime key.
#[derive(Clone)]
pub struct Cipher {
    aead: Aes256Gcm,
}

impl Cipher {
    /// Derive the key from the deployment secret. Fails on an absent or blank secret.
    pub fn from_secret(secret: Option<&str>) -> Result<Self, CryptoError> {
        let secret = secret
            .filter(|s| !s.trim().is_empty())
            .ok_or(CryptoError::MissingSecret)?;

        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(secret.as_bytes(), KDF_SALT, KDF_ITERATIONS, &mut key);
        let cipher = Self::from_key(key);
        key.fill(0);

        tracing::debug!(iterations = KDF_ITERATIONS, "encryption key derived");
        Ok(cipher)
    }

    /// Build from raw key bytes, skipping derivation.
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self {
            aead: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedBlob, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = self
            .aead
            .encrypt_in_place_detached(&nonce, b"", &mut buffer)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(nonce.as_slice());
        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag.as_slice());

        Ok(EncryptedBlob {
            nonce: nonce_bytes,
            ciphertext: buffer,
            tag: tag_bytes,
        })
    }

    pub fn decrypt(&self, blob: &EncryptedBlob) -> Result<String, CryptoError> {
        let mut buffer = blob.ciphertext.clone();
        self.aead
            .decrypt_in_place_detached(
                Nonce::from_slice(&blob.nonce),
                b"",
                &mut buffer,
                Tag::from_slice(&blob.tag),
            )
            .map_err(|_| CryptoError::Authentication)?;

        String::from_utf8(buffer)
            .map_err(|_| CryptoError::Format("decrypted content is not valid UTF-8".into()))
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Cipher { key: <redacted> }")
    }
}

/// Hex SHA-256 of the content. Embedding cache key and integrity check.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// A fresh random secret suitable for `security.encryption_key`.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
