//! Key-management service port.
//!
//! The codec hands raw bytes to the service and gets raw bytes back; framing
//! (base64, JSON quoting) stays in the codec.

use crate::error::CryptoError;
use async_trait::async_trait;

#[async_trait]
pub trait KmsApi: Send + Sync {
    async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Real AWS KMS adapter (only compiled when the `kms` feature is enabled).
#[cfg(feature = "kms")]
pub mod real {
    use super::KmsApi;
    use crate::error::CryptoError;
    use aws_sdk_kms::primitives::Blob;
    use aws_sdk_kms::Client as KmsClient;
    use tracing::instrument;

    #[derive(Clone)]
    pub struct AwsKmsApi {
        inner: KmsClient,
    }

    impl AwsKmsApi {
        pub fn new(inner: KmsClient) -> Self {
            Self { inner }
        }

        /// Client from the default AWS credential/region chain
        pub async fn from_env() -> Self {
            let config = aws_config::load_from_env().await;
            Self::new(KmsClient::new(&config))
        }
    }

    #[async_trait::async_trait]
    impl KmsApi for AwsKmsApi {
        #[instrument(level = "debug", skip(self, plaintext))]
        async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
            let resp = self
                .inner
                .encrypt()
                .key_id(key_id)
                .plaintext(Blob::new(plaintext))
                .send()
                .await
                .map_err(|e| CryptoError::Kms(format!("failed to encrypt with KMS: {e}")))?;
            resp.ciphertext_blob
                .map(|b| b.into_inner())
                .ok_or_else(|| CryptoError::Kms("KMS returned no ciphertext".to_string()))
        }

        #[instrument(level = "debug", skip(self, ciphertext))]
        async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
            let resp = self
                .inner
                .decrypt()
                .ciphertext_blob(Blob::new(ciphertext))
                .send()
                .await
                .map_err(|e| CryptoError::Kms(format!("failed to decrypt with KMS: {e}")))?;
            resp.plaintext
                .map(|b| b.into_inner())
                .ok_or_else(|| CryptoError::Kms("KMS returned no plaintext".to_string()))
        }
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reversible fake KMS: blob = `<key_id>\0<plaintext>` with every byte flipped
    #[derive(Default)]
    pub struct FakeKms {
        calls: AtomicUsize,
    }

    impl FakeKms {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KmsApi for FakeKms {
        async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut blob = key_id.as_bytes().to_vec();
            blob.push(0);
            blob.extend_from_slice(plaintext);
            Ok(blob.into_iter().map(|b| !b).collect())
        }

        async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let blob: Vec<u8> = ciphertext.iter().map(|b| !b).collect();
            let split = blob
                .iter()
                .position(|b| *b == 0)
                .ok_or_else(|| CryptoError::Kms("malformed blob".to_string()))?;
            Ok(blob[split + 1..].to_vec())
        }
    }
}
