// Crypto Error Types

use conduit_core::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("cannot decrypt empty or whitespace-only input")]
    EmptyInput,

    #[error("failed to unmarshal JSON string: {0}")]
    Json(String),

    #[error("failed to decode base64 data: {0}")]
    Base64(String),

    #[error("ciphertext too short")]
    TooShort,

    #[error("failed to encrypt: {0}")]
    Encrypt(String),

    #[error("failed to decrypt: {0}")]
    Decrypt(String),

    #[error("KMS error: {0}")]
    Kms(String),

    #[error("Invalid key configuration: {0}")]
    Config(String),
}

impl From<CryptoError> for AppError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Config(msg) => AppError::Config(msg),
            other => AppError::Crypto(other.to_string()),
        }
    }
}
