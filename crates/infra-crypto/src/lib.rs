// Conduit Infra Crypto - Secret codec for connector configs at rest

pub mod codec;
pub mod error;
pub mod kms;

pub use codec::{CodecMode, SecretCodec, KMS_KEY_PREFIX};
pub use error::CryptoError;
pub use kms::KmsApi;
