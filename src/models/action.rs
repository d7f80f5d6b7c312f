//! A single containerised operation inside a [`Task`](super::task::Task).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ids::ActionId;

/// Lifecycle state of an [`Action`].
///
/// Progression is monotonic: `PENDING -> RUNNING -> {SUCCESS, FAILED, TIMEOUT}`,
/// with an optional `PREPARING`/`POST` straddling the boundary at the
/// workflow level. An action never returns to `PENDING` once it has left it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionState {
    Pending,
    Preparing,
    Running,
    Post,
    Success,
    Failed,
    Timeout,
}

impl ActionState {
    /// Terminal states end an action's execution for good.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionState::Success | ActionState::Failed | ActionState::Timeout
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionState::Success)
    }
}

impl std::str::FromStr for ActionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ActionState::Pending),
            "PREPARING" => Ok(ActionState::Preparing),
            "RUNNING" => Ok(ActionState::Running),
            "POST" => Ok(ActionState::Post),
            "SUCCESS" => Ok(ActionState::Success),
            "FAILED" => Ok(ActionState::Failed),
            "TIMEOUT" => Ok(ActionState::Timeout),
            other => Err(format!("unknown action state: {other}")),
        }
    }
}

impl std::fmt::Display for ActionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionState::Pending => "PENDING",
            ActionState::Preparing => "PREPARING",
            ActionState::Running => "RUNNING",
            ActionState::Post => "POST",
            ActionState::Success => "SUCCESS",
            ActionState::Failed => "FAILED",
            ActionState::Timeout => "TIMEOUT",
        };
        write!(f, "{s}")
    }
}

/// One containerised operation: an image, a command, and the state it has
/// progressed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// Namespace hint, e.g. `host` to share the host's network namespace.
    #[serde(default)]
    pub pid: Option<String>,
    pub timeout_seconds: u64,
    /// Retry budget; `0` is floored to `1` by the agent runner (see §4.5).
    #[serde(default)]
    pub retries: u32,
    pub state: ActionState,
    pub execution_start: Option<DateTime<Utc>>,
    pub execution_stop: Option<DateTime<Utc>>,
    pub execution_duration: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl Action {
    pub fn new(id: impl Into<ActionId>, name: impl Into<String>, image: impl Into<String>) -> Self {
        Action {
            id: id.into(),
            name: name.into(),
            image: image.into(),
            command: Vec::new(),
            volumes: Vec::new(),
            environment: HashMap::new(),
            pid: None,
            timeout_seconds: 0,
            retries: 0,
            state: ActionState::Pending,
            execution_start: None,
            execution_stop: None,
            execution_duration: None,
            message: String::new(),
        }
    }

    /// Retry budget actually used at execution time: `0` becomes `1`
    /// (source behaviour preserved per DESIGN.md open-question #3).
    pub fn effective_retries(&self) -> u32 {
        self.retries.max(1)
    }

    /// Record a terminal (or intermediate) report from the agent.
    pub fn record_report(
        &mut self,
        state: ActionState,
        execution_start: Option<DateTime<Utc>>,
        execution_stop: Option<DateTime<Utc>>,
        execution_duration: Option<String>,
        message: impl Into<String>,
    ) {
        self.state = state;
        self.execution_start = execution_start;
        self.execution_stop = execution_stop;
        self.execution_duration = execution_duration;
        self.message = message.into();
    }
}
