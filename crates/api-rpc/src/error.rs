//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use conduit_core::error::AppError;
use conduit_core::port::EngineError;
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const THROTTLED: i32 = 4003;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
    pub const SYSTEM_ERROR: i32 = 5002;
}

fn owned(code: i32, msg: impl Into<String>) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, msg.into(), None::<()>)
}

pub fn throttled() -> ErrorObjectOwned {
    owned(code::THROTTLED, "Rate limit exceeded. Please slow down.")
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::Validation(msg) => owned(code::VALIDATION_ERROR, msg),
        AppError::Domain(e) => owned(code::VALIDATION_ERROR, e.to_string()),
        AppError::Serialization(e) => owned(code::VALIDATION_ERROR, e.to_string()),
        AppError::NotFound(msg) => owned(code::NOT_FOUND, msg),
        AppError::Conflict(msg) => owned(code::CONFLICT, msg),
        AppError::Database(msg) => owned(code::DB_ERROR, msg),
        AppError::Engine(e) => {
            let code = match &e {
                EngineError::NotFound(_) => code::NOT_FOUND,
                EngineError::AlreadyExists(_) => code::CONFLICT,
                EngineError::InvalidSpec(_) => code::VALIDATION_ERROR,
                EngineError::WorkflowFailed { .. } | EngineError::Unavailable(_) => {
                    code::SYSTEM_ERROR
                }
            };
            owned(code, e.to_string())
        }
        AppError::Runner(e) => owned(code::SYSTEM_ERROR, e.to_string()),
        AppError::Activity(e) => owned(code::SYSTEM_ERROR, e.to_string()),
        AppError::Io(e) => owned(code::SYSTEM_ERROR, e.to_string()),
        AppError::Crypto(msg) => owned(code::INTERNAL_ERROR, msg),
        AppError::Config(msg) => owned(code::INTERNAL_ERROR, msg),
        AppError::Internal(msg) => owned(code::INTERNAL_ERROR, msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            to_rpc_error(AppError::Validation("x".into())).code(),
            code::VALIDATION_ERROR
        );
        assert_eq!(
            to_rpc_error(AppError::Conflict("schedule already exists".into())).code(),
            code::CONFLICT
        );
        assert_eq!(
            to_rpc_error(AppError::Engine(EngineError::NotFound("s".into()))).code(),
            code::NOT_FOUND
        );
        assert_eq!(
            to_rpc_error(AppError::Database("locked".into())).code(),
            code::DB_ERROR
        );
        assert_eq!(throttled().code(), code::THROTTLED);
    }
}
