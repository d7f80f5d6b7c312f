//! `async-nats` request/reply transport: the agent publishes a request on a
//! per-agent subject (`<prefix>.actions.<agentID>`, `<prefix>.events.<agentID>`)
//! and waits for the dispatcher's reply, rather than making a direct HTTP
//! call. Useful when agent and dispatcher sit on opposite sides of a NAT and
//! only the message bus is reachable from both.
//!
//! Durability for dispatcher state lives in the object store, not this
//! transport, so request/reply runs over core NATS rather than a JetStream
//! push consumer per agent - one fewer durable resource to provision per
//! agent for a channel that is, by design, a thin RPC pipe.

use async_trait::async_trait;

use crate::dispatcher::{ActionDescriptor, ActionStatusReport};
use crate::error::{Error, Result};
use crate::models::{AgentAttributes, AgentId};
use crate::rpc::types::{ErrorResponse, GetActionRequest, ReportActionStatusRequest};

use super::{Reader, Writer};

#[derive(Debug, Clone)]
pub struct BusTransport {
    client: async_nats::Client,
    subject_prefix: String,
    agent_id: String,
}

impl BusTransport {
    pub fn new(client: async_nats::Client, subject_prefix: impl Into<String>, agent_id: impl Into<String>) -> Self {
        BusTransport {
            client,
            subject_prefix: subject_prefix.into(),
            agent_id: agent_id.into(),
        }
    }

    fn get_action_subject(&self) -> String {
        format!("{}.actions.{}", self.subject_prefix, self.agent_id)
    }

    fn report_status_subject(&self) -> String {
        format!("{}.events.{}", self.subject_prefix, self.agent_id)
    }

    async fn request<Req: serde::Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        subject: &str,
        request: &Req,
    ) -> Result<Resp> {
        let payload = serde_json::to_vec(request)?;
        let message = self
            .client
            .request(subject.to_string(), payload.into())
            .await
            .map_err(|e| Error::backend_write(anyhow::anyhow!(e.to_string())))?;

        if let Ok(err) = serde_json::from_slice::<ErrorResponse>(&message.payload) {
            return Err(match err.code {
                "INVALID_ARGUMENT" => Error::InvalidArgument(err.message),
                "NOT_FOUND" => Error::NotFound(err.message),
                "FAILED_PRECONDITION" => Error::FailedPrecondition(err.message),
                "DEADLINE_EXCEEDED" => Error::DeadlineExceeded(err.message),
                "CANCELED" => Error::Canceled,
                _ => Error::Internal(err.message),
            });
        }
        Ok(serde_json::from_slice(&message.payload)?)
    }
}

#[async_trait]
impl Reader for BusTransport {
    async fn get_action(
        &self,
        agent_id: &AgentId,
        attributes: Option<&AgentAttributes>,
    ) -> Result<ActionDescriptor> {
        let request = GetActionRequest {
            agent_id: agent_id.to_string(),
            attributes: attributes.cloned(),
        };
        self.request(&self.get_action_subject(), &request).await
    }
}

#[async_trait]
impl Writer for BusTransport {
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
        let subject = self.report_status_subject();
        let _: serde_json::Value = self.request(&subject, &request).await?;
        Ok(())
    }
}
