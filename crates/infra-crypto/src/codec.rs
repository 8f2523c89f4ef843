//! Secret codec for connector configs.
//!
//! Three modes, picked from the configured secret:
//! - empty: pass-through (logged loudly, never silent)
//! - `arn:aws:kms:...`: delegate to the key-management service
//! - anything else: AES-256-GCM with key = SHA-256(secret)
//!
//! Ciphertext is `base64(nonce || sealed)` wrapped as a JSON string literal.

use crate::error::CryptoError;
use crate::kms::KmsApi;
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};

pub const KMS_KEY_PREFIX: &str = "arn:aws:kms:";

const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecMode {
    Disabled,
    Local,
    Kms,
}

#[derive(Clone)]
enum Inner {
    Disabled,
    Local(Aes256Gcm),
    Kms { key_id: String, api: Arc<dyn KmsApi> },
}

#[derive(Clone)]
pub struct SecretCodec {
    inner: Inner,
}

impl SecretCodec {
    /// Pass-through codec
    pub fn disabled() -> Self {
        warn!("Encryption disabled: no secret key configured, connector configs are stored in plaintext");
        Self {
            inner: Inner::Disabled,
        }
    }

    /// Local AES-256-GCM keyed by SHA-256 of the passphrase
    pub fn local(secret: &str) -> Self {
        let key = Sha256::digest(secret.as_bytes());
        Self {
            inner: Inner::Local(Aes256Gcm::new(&key)),
        }
    }

    pub fn kms(key_id: impl Into<String>, api: Arc<dyn KmsApi>) -> Self {
        Self {
            inner: Inner::Kms {
                key_id: key_id.into(),
                api,
            },
        }
    }

    pub fn is_kms_key(secret: &str) -> bool {
        secret.trim().starts_with(KMS_KEY_PREFIX)
    }

    /// Pick the mode from the configured secret.
    ///
    /// A KMS ARN without a KMS client is a configuration error.
    pub fn from_secret(secret: &str, kms: Option<Arc<dyn KmsApi>>) -> Result<Self, CryptoError> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Ok(Self::disabled());
        }
        if Self::is_kms_key(secret) {
            let api = kms.ok_or_else(|| {
                CryptoError::Config(
                    "secret key is a KMS ARN but no KMS client is available".to_string(),
                )
            })?;
            info!("Encryption enabled (KMS)");
            return Ok(Self::kms(secret, api));
        }
        info!("Encryption enabled (local AES-256-GCM)");
        Ok(Self::local(secret))
    }

    pub fn mode(&self) -> CodecMode {
        match self.inner {
            Inner::Disabled => CodecMode::Disabled,
            Inner::Local(_) => CodecMode::Local,
            Inner::Kms { .. } => CodecMode::Kms,
        }
    }

    /// Blank plaintext is returned unchanged in every mode
    pub async fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        if plaintext.trim().is_empty() {
            return Ok(plaintext.to_string());
        }

        let sealed = match &self.inner {
            Inner::Disabled => return Ok(plaintext.to_string()),
            Inner::Local(cipher) => {
                let mut nonce_bytes = [0u8; NONCE_LEN];
                rand::thread_rng().fill_bytes(&mut nonce_bytes);
                let nonce = Nonce::from_slice(&nonce_bytes);
                let ciphertext = cipher
                    .encrypt(nonce, plaintext.as_bytes())
                    .map_err(|e| CryptoError::Encrypt(e.to_string()))?;
                let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
                out.extend_from_slice(&nonce_bytes);
                out.extend_from_slice(&ciphertext);
                out
            }
            Inner::Kms { key_id, api } => api.encrypt(key_id, plaintext.as_bytes()).await?,
        };

        serde_json::to_string(&STANDARD.encode(sealed))
            .map_err(|e| CryptoError::Encrypt(e.to_string()))
    }

    /// Blank input is rejected even when encryption is disabled
    pub async fn decrypt(&self, encrypted: &str) -> Result<String, CryptoError> {
        if encrypted.trim().is_empty() {
            return Err(CryptoError::EmptyInput);
        }

        if let Inner::Disabled = self.inner {
            return Ok(encrypted.to_string());
        }

        let encoded: String =
            serde_json::from_str(encrypted).map_err(|e| CryptoError::Json(e.to_string()))?;
        let data = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::Base64(e.to_string()))?;

        let plaintext = match &self.inner {
            Inner::Disabled => return Ok(encrypted.to_string()),
            Inner::Local(cipher) => {
                if data.len() < NONCE_LEN {
                    return Err(CryptoError::TooShort);
                }
                let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
                cipher
                    .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
                    .map_err(|e| CryptoError::Decrypt(e.to_string()))?
            }
            Inner::Kms { api, .. } => api.decrypt(&data).await?,
        };

        String::from_utf8(plaintext).map_err(|e| CryptoError::Decrypt(e.to_string()))
    }
}

impl std::fmt::Debug for SecretCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCodec")
            .field("mode", &self.mode())
            .finish()
    }
}
