// Connector Service - one-off connector operations executed through the engine

use crate::domain::{ConnectorParams, WorkflowId, WorkflowRequest};
use crate::error::{AppError, Result};
use crate::port::{ConnectionStatus, EngineError, IdProvider, TimeProvider, WorkflowEngine};
use std::sync::Arc;
use tracing::info;

pub struct ConnectorService {
    engine: Arc<dyn WorkflowEngine>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
}

impl ConnectorService {
    pub fn new(
        engine: Arc<dyn WorkflowEngine>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        Self {
            engine,
            time_provider,
            id_provider,
        }
    }

    /// Run `check` for a connector config and wait for its status
    pub async fn test_connection(&self, params: ConnectorParams) -> Result<ConnectionStatus> {
        let workflow_id = self.operation_id("test-connection", &params.connector_type);
        info!(
            workflow_id = %workflow_id,
            connector_type = %params.connector_type,
            "Executing test connection workflow"
        );

        let value = self
            .run(workflow_id, WorkflowRequest::TestConnection { params })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Run `discover` and return the catalog
    pub async fn discover_catalog(&self, params: ConnectorParams) -> Result<serde_json::Value> {
        let workflow_id = self.operation_id("discover-catalog", &params.connector_type);
        info!(
            workflow_id = %workflow_id,
            connector_type = %params.connector_type,
            "Executing discover catalog workflow"
        );

        self.run(workflow_id, WorkflowRequest::DiscoverCatalog { params })
            .await
    }

    /// Fetch the connector's spec
    pub async fn spec(&self, connector_type: &str, version: &str) -> Result<serde_json::Value> {
        let workflow_id = self.operation_id("spec", connector_type);
        info!(workflow_id = %workflow_id, connector_type = %connector_type, "Executing spec workflow");

        self.run(
            workflow_id,
            WorkflowRequest::Spec {
                connector_type: connector_type.to_string(),
                version: version.to_string(),
            },
        )
        .await
    }

    /// Unique per request, so concurrent operations never share a working directory
    fn operation_id(&self, operation: &str, connector_type: &str) -> WorkflowId {
        let unix_secs = self.time_provider.now_millis() / 1000;
        let run_id = self.id_provider.generate_id();
        WorkflowId::for_operation(operation, connector_type, unix_secs, &run_id)
    }

    async fn run(
        &self,
        workflow_id: WorkflowId,
        request: WorkflowRequest,
    ) -> Result<serde_json::Value> {
        if request_type_is_blank(&request) {
            return Err(AppError::Validation("connector type is required".to_string()));
        }
        match self.engine.execute_workflow(workflow_id, request).await {
            Ok(v) => Ok(v),
            Err(EngineError::WorkflowFailed {
                message,
                retryable: false,
                ..
            }) => Err(AppError::Validation(message)),
            Err(e) => Err(e.into()),
        }
    }
}

fn request_type_is_blank(request: &WorkflowRequest) -> bool {
    let connector_type = match request {
        WorkflowRequest::DiscoverCatalog { params } | WorkflowRequest::TestConnection { params } => {
            &params.connector_type
        }
        WorkflowRequest::Spec { connector_type, .. } => connector_type,
        WorkflowRequest::RunSync { .. } => return false,
    };
    connector_type.trim().is_empty()
}
