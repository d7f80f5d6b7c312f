//! Local file action source: reads a JSON-encoded action list from disk
//! once at startup and serves it in order. Stands in for the plain-file
//! "no dispatcher available" mode: there is no `serde_yaml` in this stack,
//! so the file is JSON-shaped rather than YAML (documented in SPEC_FULL.md).
//! Read-only: there is no corresponding file-backed `Writer`, status
//! reports from a file-sourced agent go out over whatever `Writer` it is
//! paired with.

use std::path::Path;
use tokio::sync::Mutex;

use async_trait::async_trait;

use crate::dispatcher::ActionDescriptor;
use crate::error::{Error, Result};
use crate::models::{AgentAttributes, AgentId};

use super::Reader;

pub struct FileReader {
    actions: Mutex<std::collections::VecDeque<ActionDescriptor>>,
}

impl FileReader {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::backend_read(anyhow::anyhow!(e)))?;
        let actions: Vec<ActionDescriptor> = serde_json::from_str(&contents)?;
        Ok(FileReader {
            actions: Mutex::new(actions.into()),
        })
    }
}

#[async_trait]
impl Reader for FileReader {
    async fn get_action(
        &self,
        _agent_id: &AgentId,
        _attributes: Option<&AgentAttributes>,
    ) -> Result<ActionDescriptor> {
        let mut actions = self.actions.lock().await;
        actions
            .pop_front()
            .ok_or_else(|| Error::NotFound("no more actions in local action file".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn serves_actions_in_order() {
        let mut file = tempfile_like();
        let actions = serde_json::json!([
            {
                "workflow_id": "default/wf-1",
                "task_id": "t-1",
                "agent_id": "agent-1",
                "action_id": "a1",
                "name": "a1",
                "image": "busybox",
                "timeout": 0,
                "command": [],
                "volumes": [],
                "environment": [],
                "pid": null
            }
        ]);
        write!(file.as_file_mut(), "{}", actions).unwrap();

        let reader = FileReader::load(file.path()).await.unwrap();
        let first = reader.get_action(&"agent-1".into(), None).await.unwrap();
        assert_eq!(first.action_id.as_str(), "a1");

        let err = reader.get_action(&"agent-1".into(), None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    fn tempfile_like() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }
}
