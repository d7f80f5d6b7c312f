//! §4.2 Dispatcher — ReportActionStatus: write an action's outcome and
//! advance the workflow state accordingly.

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{ActionState, CurrentState, WorkflowState};
use crate::store::ObjectStore;

use super::ActionStatusReport;

pub async fn report_action_status(store: &dyn ObjectStore, report: ActionStatusReport) -> Result<()> {
    let (namespace, name) = split_workflow_id(&report.workflow_id)?;

    let mut workflow = store
        .read(&namespace, &name)
        .await
        .map_err(|_| Error::Internal(format!("backend read error for workflow {}", report.workflow_id)))?;

    let task = workflow
        .task_mut(&report.task_id)
        .ok_or_else(|| Error::NotFound(format!("task {} not found", report.task_id)))?;
    let task_name = task.name.clone();

    if task.agent_id != report.agent_id {
        return Err(Error::NotFound(format!(
            "task {} is not assigned to agent {}",
            report.task_id, report.agent_id
        )));
    }

    // Ordering guarantee (§5): action N+1 cannot be reported before N.
    enforce_in_order(task, &report)?;

    let action = task
        .action_mut(&report.action_id)
        .ok_or_else(|| Error::NotFound(format!("action {} not found", report.action_id)))?;

    action.record_report(
        report.state,
        report.execution_start,
        report.execution_stop,
        report.execution_duration.clone(),
        report.message.clone(),
    );

    let is_last_action_of_last_task = {
        let last_task = workflow.status.tasks.last();
        last_task.map(|t| t.actions.last().map(|a| a.id == report.action_id).unwrap_or(false))
            == Some(true)
    };

    if report.state != ActionState::Success {
        workflow.status.state = match report.state {
            ActionState::Running => WorkflowState::Running,
            ActionState::Failed => WorkflowState::Failed,
            ActionState::Timeout => WorkflowState::Timeout,
            _ => workflow.status.state,
        };
    } else if is_last_action_of_last_task {
        workflow.status.state = WorkflowState::Post;
    }

    workflow.status.current_state = Some(CurrentState {
        agent_id: report.agent_id.clone(),
        task_id: report.task_id.clone(),
        action_id: report.action_id.clone(),
        state: report.state,
        task_name,
        action_name: report.action_name.clone(),
    });

    store.update(workflow).await?;
    debug!(agent = %report.agent_id, action = %report.action_id, state = %report.state, "recorded action report");
    Ok(())
}

fn split_workflow_id(workflow_id: &str) -> Result<(crate::models::Namespace, crate::models::WorkflowName)> {
    let (namespace, name) = workflow_id
        .split_once('/')
        .ok_or_else(|| Error::InvalidArgument(format!("malformed workflowID {workflow_id}")))?;
    Ok((namespace.into(), name.into()))
}

fn enforce_in_order(task: &crate::models::Task, report: &ActionStatusReport) -> Result<()> {
    let idx = task
        .action_index(&report.action_id)
        .ok_or_else(|| Error::NotFound(format!("action {} not found", report.action_id)))?;

    for earlier in &task.actions[..idx] {
        if earlier.state != ActionState::Success {
            return Err(Error::NotFound(format!(
                "out-of-order report: action {} has not succeeded yet",
                earlier.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Action, Task, Workflow, WorkflowSpec};
    use crate::store::InMemoryObjectStore;

    fn spec() -> WorkflowSpec {
        WorkflowSpec {
            template_ref: "tmpl".into(),
            hardware_ref: None,
            hardware_map: Default::default(),
            boot_mode: None,
        }
    }

    async fn seed_single_action_workflow(state: ActionState) -> InMemoryObjectStore {
        let store = InMemoryObjectStore::new();
        let mut action = Action::new("a1", "a1", "busybox");
        action.state = state;
        let mut task = Task::new("t-1", "t-1", "machine-mac-1");
        task.actions.push(action);
        let mut wf = Workflow::new("default", "wf-1", spec());
        wf.status.state = WorkflowState::Running;
        wf.status.tasks.push(task);
        store.create_workflow(wf).await.unwrap();
        store
    }

    #[tokio::test]
    async fn scenario_6_terminal_report_sets_post() {
        let store = seed_single_action_workflow(ActionState::Running).await;

        report_action_status(
            &store,
            ActionStatusReport {
                workflow_id: "default/wf-1".into(),
                task_id: "t-1".into(),
                action_id: "a1".into(),
                agent_id: "machine-mac-1".into(),
                action_name: "a1".into(),
                state: ActionState::Success,
                execution_start: None,
                execution_stop: None,
                execution_duration: None,
                message: String::new(),
            },
        )
        .await
        .unwrap();

        let workflow = store.read(&"default".into(), &"wf-1".into()).await.unwrap();
        assert_eq!(workflow.status.state, WorkflowState::Post);
        assert_eq!(workflow.task(&"t-1".into()).unwrap().actions[0].state, ActionState::Success);
    }

    #[tokio::test]
    async fn failed_action_propagates_to_workflow_state() {
        let store = seed_single_action_workflow(ActionState::Running).await;

        report_action_status(
            &store,
            ActionStatusReport {
                workflow_id: "default/wf-1".into(),
                task_id: "t-1".into(),
                action_id: "a1".into(),
                agent_id: "machine-mac-1".into(),
                action_name: "a1".into(),
                state: ActionState::Failed,
                execution_start: None,
                execution_stop: None,
                execution_duration: None,
                message: "boom".into(),
            },
        )
        .await
        .unwrap();

        let workflow = store.read(&"default".into(), &"wf-1".into()).await.unwrap();
        assert_eq!(workflow.status.state, WorkflowState::Failed);
    }

    #[tokio::test]
    async fn out_of_order_report_is_refused() {
        let store = InMemoryObjectStore::new();
        let mut first = Action::new("a1", "a1", "busybox");
        first.state = ActionState::Pending;
        let second = Action::new("a2", "a2", "busybox");
        let mut task = Task::new("t-1", "t-1", "machine-mac-1");
        task.actions.push(first);
        task.actions.push(second);
        let mut wf = Workflow::new("default", "wf-1", spec());
        wf.status.tasks.push(task);
        store.create_workflow(wf).await.unwrap();

        let err = report_action_status(
            &store,
            ActionStatusReport {
                workflow_id: "default/wf-1".into(),
                task_id: "t-1".into(),
                action_id: "a2".into(),
                agent_id: "machine-mac-1".into(),
                action_name: "a2".into(),
                state: ActionState::Success,
                execution_start: None,
                execution_stop: None,
                execution_duration: None,
                message: String::new(),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
    }
}
