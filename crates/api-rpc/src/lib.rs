//! JSON-RPC API Layer
//!
//! JSON-RPC 2.0 server for job schedule management and on-demand connector
//! operations. Binds to localhost only.

pub mod error;
pub mod handler;
pub mod rate_limiter;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
