//! Dispatcher core: `GetAction` (§4.1), `ReportActionStatus` (§4.2),
//! auto-enrollment (§4.3), and auto-discovery (§4.4), wired together behind
//! a single [`Dispatcher`] handle the RPC layer drives.

pub mod discovery;
pub mod enrollment;
pub mod get_action;
pub mod report_status;
pub mod retry;

use std::sync::Arc;

use crate::error::Result;
use crate::models::{ActionId, ActionState, AgentAttributes, AgentId, Namespace, TaskId};
use crate::store::ObjectStore;

/// Feature toggles and defaults the dispatcher runs with.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub auto_discovery_enabled: bool,
    pub auto_enrollment_enabled: bool,
    pub discovery_namespace: Namespace,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            auto_discovery_enabled: true,
            auto_enrollment_enabled: true,
            discovery_namespace: "discovery".into(),
        }
    }
}

/// The action descriptor `GetAction` returns to an agent (§6).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ActionDescriptor {
    pub workflow_id: String,
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub action_id: ActionId,
    pub name: String,
    pub image: String,
    pub timeout: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    pub command: Vec<String>,
    pub volumes: Vec<String>,
    pub environment: Vec<String>,
    pub pid: Option<String>,
}

fn default_retries() -> u32 {
    1
}

/// Status report from an agent for one action (§4.2, §6).
#[derive(Debug, Clone)]
pub struct ActionStatusReport {
    pub workflow_id: String,
    pub task_id: TaskId,
    pub action_id: ActionId,
    pub agent_id: AgentId,
    pub action_name: String,
    pub state: ActionState,
    pub execution_start: Option<chrono::DateTime<chrono::Utc>>,
    pub execution_stop: Option<chrono::DateTime<chrono::Utc>>,
    pub execution_duration: Option<String>,
    pub message: String,
}

/// Dispatcher handle: an object store plus the feature toggles. Cheap to
/// clone (the store is behind an `Arc`); one instance is shared across all
/// concurrent RPCs.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn ObjectStore>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn ObjectStore>, config: DispatcherConfig) -> Self {
        Dispatcher { store, config }
    }

    pub async fn get_action(
        &self,
        agent_id: &AgentId,
        attributes: Option<&AgentAttributes>,
    ) -> Result<ActionDescriptor> {
        get_action::get_action(self.store.as_ref(), &self.config, agent_id, attributes).await
    }

    pub async fn report_action_status(&self, report: ActionStatusReport) -> Result<()> {
        report_status::report_action_status(self.store.as_ref(), report).await
    }
}
