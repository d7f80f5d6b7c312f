//! Top-level unit of work for one agent: a spec plus the status the core
//! writes as it advances the agent through its tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ids::{ActionId, AgentId, Namespace, TaskId, WorkflowName};
use super::task::Task;

/// Overall workflow state machine (§4.1).
///
/// ```text
/// PREPARING -> PENDING -> RUNNING -> (SUCCESS | FAILED | TIMEOUT)
///                                 \-> POST -> (SUCCESS | FAILED)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowState {
    Preparing,
    Pending,
    Running,
    Post,
    Success,
    Failed,
    Timeout,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Success | WorkflowState::Failed | WorkflowState::Timeout
        )
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowState::Preparing => "PREPARING",
            WorkflowState::Pending => "PENDING",
            WorkflowState::Running => "RUNNING",
            WorkflowState::Post => "POST",
            WorkflowState::Success => "SUCCESS",
            WorkflowState::Failed => "FAILED",
            WorkflowState::Timeout => "TIMEOUT",
        };
        write!(f, "{s}")
    }
}

/// Cursor identifying which action the agent is known to be working on
/// right now. The single source of truth for "what's current" (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentState {
    pub agent_id: AgentId,
    pub task_id: TaskId,
    pub action_id: ActionId,
    pub state: super::action::ActionState,
    pub task_name: String,
    pub action_name: String,
}

/// A condition record on workflow status: type/status/reason/message/time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub condition_type: String,
    pub status: bool,
    pub reason: String,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Everything but the timestamp, for `SetConditionIfDifferent` (§6).
    fn semantically_eq(&self, other: &Condition) -> bool {
        self.condition_type == other.condition_type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Input side of a workflow: what a controller or the enrollment matcher
/// authored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub template_ref: String,
    #[serde(default)]
    pub hardware_ref: Option<String>,
    /// Template-placeholder -> agent-address.
    #[serde(default)]
    pub hardware_map: HashMap<String, String>,
    #[serde(default)]
    pub boot_mode: Option<String>,
}

/// Output side of a workflow: what the dispatcher writes as execution
/// proceeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStatus {
    pub state: WorkflowState,
    pub tasks: Vec<Task>,
    pub current_state: Option<CurrentState>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl WorkflowStatus {
    pub fn new() -> Self {
        WorkflowStatus {
            state: WorkflowState::Pending,
            tasks: Vec::new(),
            current_state: None,
            conditions: Vec::new(),
        }
    }

    /// Replace any existing condition of the same type.
    pub fn set_condition(&mut self, condition: Condition) {
        self.conditions.retain(|c| c.condition_type != condition.condition_type);
        self.conditions.push(condition);
    }

    /// Like [`Self::set_condition`], but skips the write entirely when
    /// nothing but the timestamp would change (noise control, §9).
    pub fn set_condition_if_different(&mut self, condition: Condition) {
        let unchanged = self
            .conditions
            .iter()
            .any(|c| c.semantically_eq(&condition));
        if !unchanged {
            self.set_condition(condition);
        }
    }
}

impl Default for WorkflowStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner reference to a `WorkflowRuleSet`, held as data rather than a
/// pointer (§9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

/// Top-level workflow record. Identity is `(namespace, name)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub namespace: Namespace,
    pub name: WorkflowName,
    pub spec: WorkflowSpec,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(namespace: impl Into<Namespace>, name: impl Into<WorkflowName>, spec: WorkflowSpec) -> Self {
        Workflow {
            namespace: namespace.into(),
            name: name.into(),
            spec,
            status: WorkflowStatus::new(),
            owner_references: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.state.is_terminal()
    }

    pub fn task(&self, task_id: &TaskId) -> Option<&Task> {
        self.status.tasks.iter().find(|t| &t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &TaskId) -> Option<&mut Task> {
        self.status.tasks.iter_mut().find(|t| &t.id == task_id)
    }

    /// Invariant check (§3): `CurrentState`, when set, must name an action
    /// that actually exists among this workflow's tasks.
    pub fn cursor_is_consistent(&self) -> bool {
        match &self.status.current_state {
            None => true,
            Some(cursor) => self
                .task(&cursor.task_id)
                .map(|t| t.action(&cursor.action_id).is_some())
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::action::{Action, ActionState};

    fn sample_spec() -> WorkflowSpec {
        WorkflowSpec {
            template_ref: "tmpl".into(),
            hardware_ref: None,
            hardware_map: HashMap::new(),
            boot_mode: None,
        }
    }

    #[test]
    fn fresh_workflow_has_consistent_cursor() {
        let workflow = Workflow::new("default", "wf-1", sample_spec());
        assert!(workflow.cursor_is_consistent());
        assert_eq!(workflow.id(), "default/wf-1");
    }

    #[test]
    fn cursor_consistency_detects_dangling_reference() {
        let mut workflow = Workflow::new("default", "wf-1", sample_spec());
        let mut task = Task::new("t-1", "t-1", "machine-mac-1");
        task.actions.push(Action::new("a1", "a1", "busybox"));
        workflow.status.tasks.push(task);

        workflow.status.current_state = Some(CurrentState {
            agent_id: "machine-mac-1".into(),
            task_id: "t-1".into(),
            action_id: "a1".into(),
            state: ActionState::Pending,
            task_name: "t-1".into(),
            action_name: "a1".into(),
        });
        assert!(workflow.cursor_is_consistent());

        workflow.status.current_state.as_mut().unwrap().action_id = "does-not-exist".into();
        assert!(!workflow.cursor_is_consistent());
    }

    #[test]
    fn set_condition_if_different_skips_timestamp_only_noise() {
        let mut status = WorkflowStatus::new();
        status.set_condition(Condition {
            condition_type: "Ready".into(),
            status: true,
            reason: "ok".into(),
            message: "all good".into(),
            last_transition_time: Utc::now(),
        });
        assert_eq!(status.conditions.len(), 1);

        status.set_condition_if_different(Condition {
            condition_type: "Ready".into(),
            status: true,
            reason: "ok".into(),
            message: "all good".into(),
            last_transition_time: Utc::now(),
        });
        assert_eq!(status.conditions.len(), 1, "timestamp-only change must not write");
    }
}
