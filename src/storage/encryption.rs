// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 CyberGuard Contributors

//! Encryption provider: the process-wide symmetric key, AES-256-GCM
//! encrypt/decrypt of JSON values, content digests and password hashing.
//!
//! Cipher text wire format (standard base64):
//!   [ nonce (12 bytes) | ciphertext + tag ]
//!
//! The key is generated lazily, persisted hex-encoded in the local
//! key-value store and never rotated. Losing it strands every record that
//! was stored encrypted.

use std::sync::{Arc, Mutex};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::Argon2;
use base64ct::{Base64, Encoding};
use rand::{rngs::OsRng, RngCore};
use serde_json::Value;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::kv::LocalKv;
use super::paths::ENCRYPTION_KEY_NAME;
use super::{StorageError, StorageResult};

/// Key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;
const SALT_LEN: usize = 16;
const PASSWORD_HASH_LEN: usize = 32;

// =============================================================================
// EncryptionKey
// =============================================================================

/// 32-byte symmetric key. Zeroized on drop.
#[derive(Clone)]
pub struct EncryptionKey(Zeroizing<[u8; KEY_LEN]>);

impl EncryptionKey {
    /// Fresh key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(Zeroizing::new(bytes))
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Parse the persisted hex form.
    pub fn from_hex(encoded: &str) -> StorageResult<Self> {
        let decoded = Zeroizing::new(hex::decode(encoded.trim()).map_err(|e| {
            StorageError::EncryptionUnavailable(format!("stored key is not valid hex: {e}"))
        })?);
        let bytes: [u8; KEY_LEN] = decoded.as_slice().try_into().map_err(|_| {
            StorageError::EncryptionUnavailable(format!(
                "stored key has {} bytes, expected {KEY_LEN}",
                decoded.len()
            ))
        })?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0.as_slice()))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

// =============================================================================
// EncryptionProvider
// =============================================================================

/// Owns the persisted key and performs all encrypt/decrypt calls.
pub struct EncryptionProvider {
    kv: Arc<LocalKv>,
    create_lock: Mutex<()>,
}

impl EncryptionProvider {
    pub fn new(kv: Arc<LocalKv>) -> Self {
        Self {
            kv,
            create_lock: Mutex::new(()),
        }
    }

    /// The persisted key, if one has been created.
    pub fn current_key(&self) -> StorageResult<Option<EncryptionKey>> {
        match self.kv.get_setting(ENCRYPTION_KEY_NAME)? {
            Some(encoded) => Ok(Some(EncryptionKey::from_hex(&encoded)?)),
            None => Ok(None),
        }
    }

    /// Return the persisted key, generating and persisting one on first use.
    ///
    /// Creation is serialised so concurrent first calls agree on one key.
    pub fn get_or_create_key(&self) -> StorageResult<EncryptionKey> {
        let _guard = self
            .create_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(key) = self.current_key()? {
            return Ok(key);
        }

        let key = EncryptionKey::generate();
        self.kv
            .put_setting(ENCRYPTION_KEY_NAME, key.to_hex().as_str())
            .map_err(|e| {
                StorageError::EncryptionUnavailable(format!("failed to persist new key: {e}"))
            })?;
        tracing::info!("Generated new storage encryption key");
        Ok(key)
    }

    /// Encrypt `value` (its canonical string form) under `key` or the
    /// persisted key.
    pub fn encrypt(&self, value: &Value, key: Option<&EncryptionKey>) -> StorageResult<String> {
        let key = self.resolve_key(key)?;
        let plaintext = Zeroizing::new(canonical_string(value));
        seal(&key, plaintext.as_bytes())
    }

    /// Reverse [`encrypt`](Self::encrypt). Decrypted text that is not JSON
    /// comes back as a JSON string.
    pub fn decrypt(&self, cipher_text: &str, key: Option<&EncryptionKey>) -> StorageResult<Value> {
        let key = self.resolve_key(key)?;
        let plaintext = open(&key, cipher_text)?;
        let text = String::from_utf8(plaintext.to_vec())
            .map_err(|_| StorageError::DecryptionFailed("plaintext is not UTF-8".to_string()))?;
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    fn resolve_key(&self, key: Option<&EncryptionKey>) -> StorageResult<EncryptionKey> {
        match key {
            Some(key) => Ok(key.clone()),
            None => self.current_key()?.ok_or_else(|| {
                StorageError::EncryptionUnavailable("no encryption key available".to_string())
            }),
        }
    }
}

fn seal(key: &EncryptionKey, plaintext: &[u8]) -> StorageResult<String> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| StorageError::EncryptionUnavailable(format!("invalid key: {e}")))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| StorageError::EncryptionUnavailable(format!("encryption failed: {e}")))?;

    // Prepend nonce
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(Base64::encode_string(&out))
}

fn open(key: &EncryptionKey, cipher_text: &str) -> StorageResult<Zeroizing<Vec<u8>>> {
    let data = Base64::decode_vec(cipher_text.trim())
        .map_err(|_| StorageError::DecryptionFailed("cipher text is not base64".to_string()))?;
    if data.len() < NONCE_LEN {
        return Err(StorageError::DecryptionFailed(
            "cipher text too short".to_string(),
        ));
    }
    let (nonce_bytes, ct) = data.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| StorageError::DecryptionFailed(format!("invalid key: {e}")))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ct)
        .map_err(|_| {
            StorageError::DecryptionFailed("authentication tag mismatch".to_string())
        })?;

    Ok(Zeroizing::new(plaintext))
}

// =============================================================================
// Hashing
// =============================================================================

/// Strings are used verbatim; everything else is serialized as compact JSON.
pub fn canonical_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// SHA-256 of the canonical string form, lowercase hex.
pub fn hash(value: &Value) -> String {
    digest_hex(canonical_string(value).as_bytes())
}

/// SHA-256 of raw bytes, lowercase hex.
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Random 16-byte salt, hex-encoded.
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    hex::encode(salt)
}

/// Derive a password hash (Argon2id, 32-byte output, hex).
pub fn hash_password(password: &str, salt: &str) -> StorageResult<String> {
    let mut output = Zeroizing::new([0u8; PASSWORD_HASH_LEN]);
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt.as_bytes(), output.as_mut_slice())
        .map_err(|e| StorageError::PasswordHash(e.to_string()))?;
    Ok(hex::encode(output.as_slice()))
}

// =============================================================================
// Tests
// =============================================================================
