//! Per-agent runner loop (§4.5): poll a [`Reader`] for the next action,
//! run it under an [`Executor`] with retry/timeout, and report the outcome
//! through a [`Writer`]. A single `CancellationToken` stops the loop
//! cleanly at its next suspension point.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatcher::ActionStatusReport;
use crate::error::{Error, Result};
use crate::models::{Action, ActionState, AgentAttributes, AgentId};

use super::executor::{ExecutionOutcome, Executor};
use super::transport::{Reader, Writer};

#[derive(Debug, Clone)]
pub struct AgentRunnerConfig {
    pub agent_id: AgentId,
    pub attributes: Option<AgentAttributes>,
}

pub struct AgentRunner {
    config: AgentRunnerConfig,
    reader: Arc<dyn Reader>,
    writer: Arc<dyn Writer>,
    executor: Arc<dyn Executor>,
}

impl AgentRunner {
    pub fn new(
        config: AgentRunnerConfig,
        reader: Arc<dyn Reader>,
        writer: Arc<dyn Writer>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        AgentRunner {
            config,
            reader,
            writer,
            executor,
        }
    }

    /// Runs until `cancel` fires. Each iteration fetches one action,
    /// executes it (with its own retry/timeout budget), and reports the
    /// result before polling for the next one.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        loop {
            let descriptor = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Canceled),
                result = self.reader.get_action(&self.config.agent_id, self.config.attributes.as_ref()) => result,
            };

            // Reader.get_action is expected to block until an action is
            // available (or the transport's own poll/backoff loop runs
            // internally); any error it surfaces here ends this runner.
            let descriptor = descriptor?;

            let mut action = Action::new(descriptor.action_id.clone(), descriptor.name.clone(), descriptor.image.clone());
            action.command = descriptor.command.clone();
            action.volumes = descriptor.volumes.clone();
            action.environment = descriptor
                .environment
                .iter()
                .filter_map(|kv| kv.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            action.pid = descriptor.pid.clone();
            action.timeout_seconds = descriptor.timeout;
            action.retries = descriptor.retries;

            self.report(&descriptor, ActionState::Running, None, None, None, String::new())
                .await?;

            let execution_start = Utc::now();
            let timeout = Duration::from_secs(action.timeout_seconds.max(1));
            let retry_count = action.effective_retries();

            let mut final_state = ActionState::Failed;
            let mut message = String::new();

            for attempt in 1..=retry_count {
                if cancel.is_cancelled() {
                    return Err(Error::Canceled);
                }
                match self.executor.execute(&action, timeout).await {
                    Ok(ExecutionOutcome { success: true, .. }) => {
                        final_state = ActionState::Success;
                        break;
                    }
                    Ok(ExecutionOutcome { success: false, message: msg }) => {
                        message = msg;
                        if attempt < retry_count {
                            warn!(action = %action.id, attempt, "action failed, retrying");
                            continue;
                        }
                        final_state = ActionState::Failed;
                    }
                    Err(Error::DeadlineExceeded(msg)) => {
                        final_state = ActionState::Timeout;
                        message = msg;
                        break;
                    }
                    Err(err) if attempt < retry_count => {
                        warn!(action = %action.id, attempt, error = %err, "action errored, retrying");
                        message = err.to_string();
                        continue;
                    }
                    Err(err) => {
                        final_state = ActionState::Failed;
                        message = err.to_string();
                    }
                }
            }

            let execution_stop = Utc::now();
            let duration = execution_stop - execution_start;

            self.report(
                &descriptor,
                final_state,
                Some(execution_start),
                Some(execution_stop),
                Some(duration.to_string()),
                message,
            )
            .await?;

            info!(action = %action.id, state = %final_state, "action finished");
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn report(
        &self,
        descriptor: &crate::dispatcher::ActionDescriptor,
        state: ActionState,
        execution_start: Option<chrono::DateTime<Utc>>,
        execution_stop: Option<chrono::DateTime<Utc>>,
        execution_duration: Option<String>,
        message: String,
    ) -> Result<()> {
        self.writer
            .report_action_status(ActionStatusReport {
                workflow_id: descriptor.workflow_id.clone(),
                task_id: descriptor.task_id.clone(),
                action_id: descriptor.action_id.clone(),
                agent_id: descriptor.agent_id.clone(),
                action_name: descriptor.name.clone(),
                state,
                execution_start,
                execution_stop,
                execution_duration,
                message,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::ActionDescriptor;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct OneShotReader {
        descriptor: Mutex<Option<ActionDescriptor>>,
    }

    #[async_trait]
    impl Reader for OneShotReader {
        async fn get_action(
            &self,
            _agent_id: &AgentId,
            _attributes: Option<&AgentAttributes>,
        ) -> Result<ActionDescriptor> {
            self.descriptor
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| Error::NotFound("no more actions".into()))
        }
    }

    struct RecordingWriter {
        reports: Mutex<Vec<ActionStatusReport>>,
    }

    #[async_trait]
    impl Writer for RecordingWriter {
        async fn report_action_status(&self, report: ActionStatusReport) -> Result<()> {
            self.reports.lock().unwrap().push(report);
            Ok(())
        }
    }

    struct CountingExecutor {
        calls: AtomicUsize,
        fail_until: usize,
    }

    #[async_trait]
    impl Executor for CountingExecutor {
        async fn execute(&self, _action: &Action, _timeout: Duration) -> Result<ExecutionOutcome> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.fail_until {
                Ok(ExecutionOutcome { success: true, message: String::new() })
            } else {
                Ok(ExecutionOutcome { success: false, message: "not yet".into() })
            }
        }
    }

    fn descriptor() -> ActionDescriptor {
        ActionDescriptor {
            workflow_id: "default/wf-1".into(),
            task_id: "t-1".into(),
            agent_id: "agent-1".into(),
            action_id: "a1".into(),
            name: "a1".into(),
            image: "busybox".into(),
            timeout: 1,
            retries: 3,
            command: vec![],
            volumes: vec![],
            environment: vec![],
            pid: None,
        }
    }

    #[tokio::test]
    async fn retries_until_success_then_reports_running_and_success() {
        let reader = Arc::new(OneShotReader {
            descriptor: Mutex::new(Some(descriptor())),
        });
        let writer = Arc::new(RecordingWriter {
            reports: Mutex::new(Vec::new()),
        });
        let executor = Arc::new(CountingExecutor {
            calls: AtomicUsize::new(0),
            fail_until: 2,
        });

        let runner = AgentRunner::new(
            AgentRunnerConfig {
                agent_id: "agent-1".into(),
                attributes: None,
            },
            reader,
            writer.clone(),
            executor,
        );

        let cancel = CancellationToken::new();
        let child = cancel.child_token();
        let err = runner.run(child).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let reports = writer.reports.lock().unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].state, ActionState::Running);
        assert_eq!(reports[1].state, ActionState::Success);
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let reader = Arc::new(OneShotReader {
            descriptor: Mutex::new(None),
        });
        let writer = Arc::new(RecordingWriter {
            reports: Mutex::new(Vec::new()),
        });
        let executor = Arc::new(CountingExecutor {
            calls: AtomicUsize::new(0),
            fail_until: 1,
        });

        let runner = AgentRunner::new(
            AgentRunnerConfig {
                agent_id: "agent-1".into(),
                attributes: None,
            },
            reader,
            writer,
            executor,
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = runner.run(cancel).await.unwrap_err();
        assert!(matches!(err, Error::Canceled));
    }
}
