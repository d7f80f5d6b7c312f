//! Default, in-process `ObjectStore`. Adequate for the scenarios in §8 and
//! for agent-side local-file transport testing.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::models::{AgentId, Hardware, Namespace, Workflow, WorkflowName, WorkflowRuleSet};

use super::ObjectStore;

#[derive(Default)]
pub struct InMemoryObjectStore {
    workflows: DashMap<(String, String), Workflow>,
    rule_sets: RwLock<Vec<WorkflowRuleSet>>,
    hardware: DashMap<(String, String), Hardware>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule_sets(rule_sets: Vec<WorkflowRuleSet>) -> Self {
        let store = Self::new();
        *store.rule_sets.write().unwrap() = rule_sets;
        store
    }

    fn key(namespace: &str, name: &str) -> (String, String) {
        (namespace.to_string(), name.to_string())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn read_all(&self, agent_id: &AgentId) -> Result<Vec<Workflow>> {
        Ok(self
            .workflows
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|w| !w.is_terminal())
            .filter(|w| w.status.tasks.iter().any(|t| &t.agent_id == agent_id))
            .collect())
    }

    async fn read(&self, namespace: &Namespace, name: &WorkflowName) -> Result<Workflow> {
        self.workflows
            .get(&Self::key(namespace.as_str(), name.as_str()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NotFound(format!("workflow {namespace}/{name}")))
    }

    async fn update(&self, workflow: Workflow) -> Result<()> {
        let key = Self::key(workflow.namespace.as_str(), workflow.name.as_str());
        self.workflows.insert(key, workflow);
        Ok(())
    }

    async fn read_workflow_rule_sets(&self) -> Result<Vec<WorkflowRuleSet>> {
        let mut rule_sets = self
            .rule_sets
            .read()
            .map_err(|e| Error::backend_read(anyhow::anyhow!(e.to_string())))?
            .clone();
        rule_sets.sort_by(|a, b| {
            (a.namespace.as_str(), a.name.as_str()).cmp(&(b.namespace.as_str(), b.name.as_str()))
        });
        for rule_set in &mut rule_sets {
            rule_set.assign_pattern_ids();
        }
        Ok(rule_sets)
    }

    async fn create_workflow(&self, workflow: Workflow) -> Result<()> {
        let key = Self::key(workflow.namespace.as_str(), workflow.name.as_str());
        if self.workflows.contains_key(&key) {
            return Err(Error::FailedPrecondition(format!(
                "workflow {}/{} already exists",
                workflow.namespace, workflow.name
            )));
        }
        self.workflows.insert(key, workflow);
        Ok(())
    }

    async fn read_hardware(&self, namespace: &Namespace, name: &str) -> Result<Option<Hardware>> {
        Ok(self
            .hardware
            .get(&Self::key(namespace.as_str(), name))
            .map(|entry| entry.value().clone()))
    }

    async fn create_hardware(&self, hardware: Hardware) -> Result<()> {
        let key = Self::key(hardware.namespace.as_str(), &hardware.name);
        // create-if-absent: never overwrite (§4.4).
        self.hardware.entry(key).or_insert(hardware);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkflowSpec;

    fn spec() -> WorkflowSpec {
        WorkflowSpec {
            template_ref: "tmpl".into(),
            hardware_ref: None,
            hardware_map: Default::default(),
            boot_mode: None,
        }
    }

    #[tokio::test]
    async fn create_workflow_rejects_duplicate() {
        let store = InMemoryObjectStore::new();
        let wf = Workflow::new("default", "wf-1", spec());
        store.create_workflow(wf.clone()).await.unwrap();
        let err = store.create_workflow(wf).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn create_hardware_never_overwrites() {
        let store = InMemoryObjectStore::new();
        let hw = Hardware::new_discovered("discovery", "machine-mac-1", Default::default(), "{}".into());
        store.create_hardware(hw.clone()).await.unwrap();

        let mut changed = hw.clone();
        changed.labels.insert("extra".into(), "true".into());
        store.create_hardware(changed).await.unwrap();

        let stored = store
            .read_hardware(&"discovery".into(), "discovery-machine-mac-1")
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.labels.contains_key("extra"));
    }

    #[tokio::test]
    async fn read_all_filters_terminal_workflows() {
        let store = InMemoryObjectStore::new();
        let mut task = crate::models::Task::new("t-1", "t-1", "machine-mac-1");
        task.actions.push(crate::models::Action::new("a1", "a1", "busybox"));
        let mut wf = Workflow::new("default", "wf-1", spec());
        wf.status.tasks.push(task);
        wf.status.state = crate::models::WorkflowState::Success;
        store.create_workflow(wf).await.unwrap();

        let found = store.read_all(&"machine-mac-1".into()).await.unwrap();
        assert!(found.is_empty(), "terminal workflows must not be indexed");
    }
}
