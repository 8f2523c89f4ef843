//! JSON-RPC Server
//!
//! jsonrpsee has no Unix socket transport, so the server binds TCP on
//! localhost only.

use crate::handler::RpcHandler;
use crate::types::{CheckRequest, DiscoverRequest, LastRunRequest, ManageSyncRequest, SpecRequest};
use conduit_core::config::RpcSettings;
use conduit_core::error::{AppError, Result};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::sync::Arc;
use tracing::info;

pub const METHOD_SYNC_MANAGE: &str = "sync.manage.v1";
pub const METHOD_SYNC_LAST_RUN: &str = "sync.last_run.v1";
pub const METHOD_CONNECTOR_CHECK: &str = "connector.check.v1";
pub const METHOD_CONNECTOR_DISCOVER: &str = "connector.discover.v1";
pub const METHOD_CONNECTOR_SPEC: &str = "connector.spec.v1";

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl From<&RpcSettings> for RpcServerConfig {
    fn from(s: &RpcSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
        }
    }
}

fn register_err(e: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("failed to register RPC method: {}", e))
}

pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: Arc<RpcHandler>) -> Self {
        Self { config, handler }
    }

    /// Build the method table
    pub fn module(handler: Arc<RpcHandler>) -> Result<RpcModule<()>> {
        let mut module = RpcModule::new(());

        let h = handler.clone();
        module
            .register_async_method(METHOD_SYNC_MANAGE, move |params, _, _| {
                let h = h.clone();
                async move {
                    let req: ManageSyncRequest = params.parse()?;
                    h.manage_sync(req).await
                }
            })
            .map_err(register_err)?;

        let h = handler.clone();
        module
            .register_async_method(METHOD_SYNC_LAST_RUN, move |params, _, _| {
                let h = h.clone();
                async move {
                    let req: LastRunRequest = params.parse()?;
                    h.last_run(req).await
                }
            })
            .map_err(register_err)?;

        let h = handler.clone();
        module
            .register_async_method(METHOD_CONNECTOR_CHECK, move |params, _, _| {
                let h = h.clone();
                async move {
                    let req: CheckRequest = params.parse()?;
                    h.check(req).await
                }
            })
            .map_err(register_err)?;

        let h = handler.clone();
        module
            .register_async_method(METHOD_CONNECTOR_DISCOVER, move |params, _, _| {
                let h = h.clone();
                async move {
                    let req: DiscoverRequest = params.parse()?;
                    h.discover(req).await
                }
            })
            .map_err(register_err)?;

        let h = handler;
        module
            .register_async_method(METHOD_CONNECTOR_SPEC, move |params, _, _| {
                let h = h.clone();
                async move {
                    let req: SpecRequest = params.parse()?;
                    h.spec(req).await
                }
            })
            .map_err(register_err)?;

        Ok(module)
    }

    /// Bind and start serving; the handle stops the server
    pub async fn start(self) -> Result<ServerHandle> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP (localhost only)"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| AppError::Config(format!("Failed to build server on {}: {}", addr, e)))?;

        let module = Self::module(self.handler)?;
        let handle = server.start(module);
        info!("JSON-RPC server started");
        Ok(handle)
    }
}
