//! Wire DTOs for the dispatcher's JSON RPC surface (§6). These are the
//! structured request/response shapes; serde derives the JSON encoding.

use serde::{Deserialize, Serialize};

use crate::dispatcher::ActionDescriptor;
use crate::models::AgentAttributes;

#[derive(Debug, Serialize, Deserialize)]
pub struct GetActionRequest {
    pub agent_id: String,
    #[serde(default)]
    pub attributes: Option<AgentAttributes>,
}

pub type GetActionResponse = ActionDescriptor;

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportActionStatusRequest {
    pub workflow_id: String,
    pub task_id: String,
    pub action_id: String,
    pub agent_id: String,
    pub action_name: String,
    pub state: String,
    #[serde(default)]
    pub execution_start: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub execution_stop: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub execution_duration: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ReportActionStatusResponse {}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

impl From<&crate::error::Error> for ErrorResponse {
    fn from(err: &crate::error::Error) -> Self {
        use crate::error::Error;
        let code = match err {
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::NotFound(_) => "NOT_FOUND",
            Error::FailedPrecondition(_) => "FAILED_PRECONDITION",
            Error::BackendRead(_) | Error::BackendWrite(_) => "INTERNAL",
            Error::DeadlineExceeded(_) => "DEADLINE_EXCEEDED",
            Error::Canceled => "CANCELED",
            Error::Serialization(_) => "INTERNAL",
            Error::Internal(_) => "INTERNAL",
        };
        ErrorResponse {
            code,
            message: err.to_string(),
        }
    }
}
