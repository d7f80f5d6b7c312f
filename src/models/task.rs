//! An ordered group of actions assigned to a single agent.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::action::{Action, ActionState};
use super::ids::{AgentId, TaskId};

/// Ordered list of [`Action`]s assigned to one agent, sharing a volume and
/// environment baseline that each action's own settings override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub agent_id: AgentId,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, name: impl Into<String>, agent_id: impl Into<AgentId>) -> Self {
        Task {
            id: id.into(),
            name: name.into(),
            agent_id: agent_id.into(),
            actions: Vec::new(),
            volumes: Vec::new(),
            environment: HashMap::new(),
        }
    }

    /// A task is successful iff its last action is SUCCESS. A task with no
    /// actions is vacuously not successful.
    pub fn is_successful(&self) -> bool {
        matches!(self.actions.last(), Some(a) if a.state == ActionState::Success)
    }

    /// The task is "in progress" (§4.1 step 7) if its last action has not
    /// reached SUCCESS yet.
    pub fn is_in_progress(&self) -> bool {
        !self.is_successful()
    }

    pub fn action_index(&self, action_id: &super::ids::ActionId) -> Option<usize> {
        self.actions.iter().position(|a| &a.id == action_id)
    }

    pub fn action(&self, action_id: &super::ids::ActionId) -> Option<&Action> {
        self.actions.iter().find(|a| &a.id == action_id)
    }

    pub fn action_mut(&mut self, action_id: &super::ids::ActionId) -> Option<&mut Action> {
        self.actions.iter_mut().find(|a| &a.id == action_id)
    }

    /// Sorted-union environment: task-level keys, overridden by the given
    /// action's own keys on collision (§4.1 step 9).
    pub fn merged_environment(&self, action: &Action) -> Vec<String> {
        let mut merged: HashMap<&str, &str> = HashMap::new();
        for (k, v) in &self.environment {
            merged.insert(k, v);
        }
        for (k, v) in &action.environment {
            merged.insert(k, v);
        }
        let mut pairs: Vec<String> = merged.into_iter().map(|(k, v)| format!("{k}={v}")).collect();
        pairs.sort();
        pairs
    }

    pub fn merged_volumes(&self, action: &Action) -> Vec<String> {
        let mut volumes = self.volumes.clone();
        volumes.extend(action.volumes.clone());
        volumes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(id: &str, state: ActionState) -> Action {
        let mut a = Action::new(id, id, "busybox");
        a.state = state;
        a
    }

    #[test]
    fn successful_iff_last_action_succeeded() {
        let mut task = Task::new("t-1", "t-1", "machine-mac-1");
        assert!(!task.is_successful());
        task.actions.push(action("a1", ActionState::Success));
        assert!(task.is_successful());
        task.actions.push(action("a2", ActionState::Pending));
        assert!(!task.is_successful());
    }

    #[test]
    fn environment_merge_law() {
        let mut task = Task::new("t-1", "t-1", "machine-mac-1");
        task.environment.insert("A".into(), "task".into());
        task.environment.insert("B".into(), "task".into());
        let mut a = Action::new("a1", "a1", "busybox");
        a.environment.insert("B".into(), "action".into());
        a.environment.insert("C".into(), "action".into());
        task.actions.push(a.clone());

        let merged = task.merged_environment(&a);
        assert_eq!(merged, vec!["A=task", "B=action", "C=action"]);
    }
}
