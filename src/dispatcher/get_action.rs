//! §4.1 Dispatcher — GetAction: select the next action to run on an agent,
//! advancing the workflow cursor before returning.

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{
    Action, ActionState, AgentAttributes, AgentId, CurrentState, Workflow, WorkflowState,
};
use crate::store::ObjectStore;

use super::retry::{retry, RetryPolicy};
use super::{discovery, enrollment, ActionDescriptor, DispatcherConfig};

pub async fn get_action(
    store: &dyn ObjectStore,
    config: &DispatcherConfig,
    agent_id: &AgentId,
    attributes: Option<&AgentAttributes>,
) -> Result<ActionDescriptor> {
    // Step 1.
    if agent_id.is_empty() {
        return Err(Error::InvalidArgument("agentID is required".into()));
    }

    // Step 2: auto-discovery, best-effort against the configured namespace.
    if config.auto_discovery_enabled {
        discovery::discover_hardware(store, &config.discovery_namespace, agent_id, attributes).await?;
    }

    let policy = RetryPolicy::dispatcher_default();
    retry(&policy, || select_and_advance(store, config, agent_id, attributes)).await
}

async fn select_and_advance(
    store: &dyn ObjectStore,
    config: &DispatcherConfig,
    agent_id: &AgentId,
    attributes: Option<&AgentAttributes>,
) -> Result<ActionDescriptor> {
    // Step 3.
    let candidates = store.read_all(agent_id).await?;

    // Steps 4-5.
    if candidates.is_empty() {
        if config.auto_enrollment_enabled {
            return Box::pin(enrollment::enroll(store, config, agent_id, attributes)).await;
        }
        return Err(Error::NotFound(format!(
            "no workflow assigned to agent {agent_id}"
        )));
    }

    // Step 6: first workflow with a non-empty task list and PENDING/RUNNING state.
    let mut workflow = candidates
        .into_iter()
        .find(|w| {
            !w.status.tasks.is_empty()
                && matches!(w.status.state, WorkflowState::Pending | WorkflowState::Running)
        })
        .ok_or_else(|| Error::NotFound(format!("no runnable workflow for agent {agent_id}")))?;

    if workflow.spec.boot_mode.is_some() && workflow.status.state == WorkflowState::Preparing {
        return Err(Error::FailedPrecondition(
            "workflow is PREPARING; waiting for boot-option reconciliation".into(),
        ));
    }

    // Step 7.
    let (task_id, action_id) = select_next_action(&workflow, agent_id)?;

    let workflow_id = workflow.id();
    let task = workflow
        .task(&task_id)
        .expect("select_next_action only returns ids that exist");
    let action = task
        .action(&action_id)
        .expect("select_next_action only returns ids that exist");

    let descriptor = ActionDescriptor {
        workflow_id: workflow_id.clone(),
        task_id: task_id.clone(),
        agent_id: agent_id.clone(),
        action_id: action_id.clone(),
        name: action.name.clone(),
        image: action.image.clone(),
        timeout: action.timeout_seconds,
        retries: action.effective_retries(),
        command: action.command.clone(),
        volumes: task.merged_volumes(action),
        environment: task.merged_environment(action),
        pid: action.pid.clone(),
    };

    // Step 8: advance the cursor and write back.
    let task_name = task.name.clone();
    let action_name = action.name.clone();
    let action_state = action.state;
    workflow.status.current_state = Some(CurrentState {
        agent_id: agent_id.clone(),
        task_id,
        action_id,
        state: action_state,
        task_name,
        action_name,
    });

    store.update(workflow).await?;

    debug!(agent = %agent_id, action = %descriptor.name, "advanced cursor");
    Ok(descriptor)
}

/// Step 7: walk the workflow's tasks to find the `(TaskID, ActionID)` to
/// serve next.
fn select_next_action(
    workflow: &Workflow,
    agent_id: &AgentId,
) -> Result<(crate::models::TaskId, crate::models::ActionId)> {
    let task = workflow
        .status
        .tasks
        .iter()
        .find(|t| t.is_in_progress())
        .ok_or_else(|| Error::NotFound("no in-progress task".into()))?;

    if &task.agent_id != agent_id {
        return Err(Error::NotFound(format!(
            "task {} is not assigned to agent {agent_id}",
            task.id
        )));
    }

    let next_action: &Action = match &workflow.status.current_state {
        Some(cursor) if cursor.task_id == task.id => {
            if cursor.state != ActionState::Success {
                return Err(Error::FailedPrecondition(
                    "current action not in success state".into(),
                ));
            }
            let idx = task
                .action_index(&cursor.action_id)
                .ok_or_else(|| Error::NotFound("current action not in task".into()))?;
            task.actions
                .get(idx + 1)
                .ok_or_else(|| Error::NotFound("last action in task".into()))?
        }
        Some(_) | None => {
            let first = task
                .actions
                .first()
                .ok_or_else(|| Error::NotFound("task has no actions".into()))?;
            if first.state != ActionState::Pending {
                return Err(Error::FailedPrecondition(
                    "first action of task is not PENDING".into(),
                ));
            }
            first
        }
    };

    Ok((task.id.clone(), next_action.id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Task, WorkflowSpec};
    use crate::store::InMemoryObjectStore;

    fn spec() -> WorkflowSpec {
        WorkflowSpec {
            template_ref: "tmpl".into(),
            hardware_ref: None,
            hardware_map: Default::default(),
            boot_mode: None,
        }
    }

    async fn seeded_store(actions: Vec<Action>) -> InMemoryObjectStore {
        let store = InMemoryObjectStore::new();
        let mut task = Task::new("t-1", "t-1", "machine-mac-1");
        task.actions = actions;
        let mut wf = Workflow::new("default", "wf-1", spec());
        wf.status.state = WorkflowState::Pending;
        wf.status.tasks.push(task);
        store.create_workflow(wf).await.unwrap();
        store
    }

    #[tokio::test]
    async fn scenario_1_first_action_of_fresh_workflow() {
        let mut action = Action::new("stream", "stream", "quay.io/tinkerbell-actions/image2disk:v1.0.0");
        action.timeout_seconds = 300;
        let store = seeded_store(vec![action]).await;

        let config = DispatcherConfig {
            auto_discovery_enabled: false,
            auto_enrollment_enabled: false,
            discovery_namespace: "discovery".into(),
        };

        let descriptor = get_action(&store, &config, &"machine-mac-1".into(), None)
            .await
            .unwrap();

        assert_eq!(descriptor.name, "stream");
        assert_eq!(descriptor.timeout, 300);
        assert!(descriptor.environment.is_empty());
        assert!(descriptor.pid.is_none());

        let workflow = store.read(&"default".into(), &"wf-1".into()).await.unwrap();
        assert_eq!(
            workflow.status.current_state.unwrap().action_name,
            "stream"
        );
    }

    #[tokio::test]
    async fn scenario_2_second_action_after_success() {
        let mut stream = Action::new("stream", "stream", "image2disk");
        stream.state = ActionState::Success;
        let mut kexec = Action::new("kexec", "kexec", "kexec-action");
        kexec.timeout_seconds = 5;
        let store = seeded_store(vec![stream, kexec]).await;

        let mut workflow = store.read(&"default".into(), &"wf-1".into()).await.unwrap();
        workflow.status.current_state = Some(CurrentState {
            agent_id: "machine-mac-1".into(),
            task_id: "t-1".into(),
            action_id: "stream".into(),
            state: ActionState::Success,
            task_name: "t-1".into(),
            action_name: "stream".into(),
        });
        store.update(workflow).await.unwrap();

        let config = DispatcherConfig {
            auto_discovery_enabled: false,
            auto_enrollment_enabled: false,
            discovery_namespace: "discovery".into(),
        };

        let descriptor = get_action(&store, &config, &"machine-mac-1".into(), None)
            .await
            .unwrap();
        assert_eq!(descriptor.name, "kexec");
    }

    #[tokio::test]
    async fn scenario_3_refusal_when_current_not_successful() {
        let mut stream = Action::new("stream", "stream", "image2disk");
        stream.state = ActionState::Running;
        let store = seeded_store(vec![stream]).await;

        let mut workflow = store.read(&"default".into(), &"wf-1".into()).await.unwrap();
        workflow.status.current_state = Some(CurrentState {
            agent_id: "machine-mac-1".into(),
            task_id: "t-1".into(),
            action_id: "stream".into(),
            state: ActionState::Running,
            task_name: "t-1".into(),
            action_name: "stream".into(),
        });
        store.update(workflow).await.unwrap();

        let config = DispatcherConfig {
            auto_discovery_enabled: false,
            auto_enrollment_enabled: false,
            discovery_namespace: "discovery".into(),
        };

        let err = get_action(&store, &config, &"machine-mac-1".into(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn empty_agent_id_is_invalid_argument() {
        let store = InMemoryObjectStore::new();
        let config = DispatcherConfig::default();
        let err = get_action(&store, &config, &"".into(), None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
