//! `reqwest`-based transport: talks to the dispatcher's JSON RPC surface
//! (§6, `rpc::server`) over HTTP.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::dispatcher::{ActionDescriptor, ActionStatusReport};
use crate::error::{Error, Result};
use crate::models::{AgentAttributes, AgentId};
use crate::rpc::types::{ErrorResponse, GetActionRequest, ReportActionStatusRequest};

use super::{Reader, Writer};

#[derive(Debug, Clone)]
pub struct RpcClientTransport {
    base_url: String,
    client: Client,
}

impl RpcClientTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        RpcClientTransport {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    fn to_error(status: StatusCode, body: &str) -> Error {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(resp) => match resp.code {
                "INVALID_ARGUMENT" => Error::InvalidArgument(resp.message),
                "NOT_FOUND" => Error::NotFound(resp.message),
                "FAILED_PRECONDITION" => Error::FailedPrecondition(resp.message),
                "DEADLINE_EXCEEDED" => Error::DeadlineExceeded(resp.message),
                "CANCELED" => Error::Canceled,
                _ => Error::Internal(resp.message),
            },
            Err(_) => Error::Internal(format!("dispatcher returned {status}: {body}")),
        }
    }
}

#[async_trait]
impl Reader for RpcClientTransport {
    async fn get_action(
        &self,
        agent_id: &AgentId,
        attributes: Option<&AgentAttributes>,
    ) -> Result<ActionDescriptor> {
        let request = GetActionRequest {
            agent_id: agent_id.to_string(),
            attributes: attributes.cloned(),
        };

        let response = self
            .client
            .post(format!("{}/v1/actions", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(Error::backend_read)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::backend_read)?;
        if !status.is_success() {
            return Err(Self::to_error(status, &body));
        }
        serde_json::from_str(&body).map_err(Error::from)
    }
}

#[async_trait]
impl Writer for RpcClientTransport {
    async fn report_action_status(&self, report: ActionStatusReport) -> Result<()> {
        let request = ReportActionStatusRequest {
            workflow_id: report.workflow_id,
            task_id: report.task_id.to_string(),
            action_id: report.action_id.to_string(),
            agent_id: report.agent_id.to_string(),
            action_name: report.action_name,
            state: report.state.to_string(),
            execution_start: report.execution_start,
            execution_stop: report.execution_stop,
            execution_duration: report.execution_duration,
            message: report.message,
        };

        let response = self
            .client
            .post(format!("{}/v1/actions/status", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(Error::backend_write)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::to_error(status, &body));
        }
        Ok(())
    }
}
