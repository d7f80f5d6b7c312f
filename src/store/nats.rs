//! Durable `ObjectStore` backed by NATS JetStream key/value buckets.
//! Mirrors the stream/subject-naming conventions used elsewhere for durable
//! state: one bucket per record kind, keyed by `namespace/name`.

use async_trait::async_trait;
use async_nats::jetstream::{self, kv};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::{AgentId, Hardware, Namespace, Workflow, WorkflowName, WorkflowRuleSet};

use super::ObjectStore;

#[derive(Debug, Clone)]
pub struct NatsObjectStoreConfig {
    pub nats_urls: Vec<String>,
    pub workflows_bucket: String,
    pub rule_sets_bucket: String,
    pub hardware_bucket: String,
    pub connection_timeout: Duration,
}

impl Default for NatsObjectStoreConfig {
    fn default() -> Self {
        NatsObjectStoreConfig {
            nats_urls: vec!["nats://127.0.0.1:4222".to_string()],
            workflows_bucket: "forge-workflows".to_string(),
            rule_sets_bucket: "forge-rule-sets".to_string(),
            hardware_bucket: "forge-hardware".to_string(),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

/// JetStream KV-backed store. Each bucket holds JSON-encoded records keyed
/// by `namespace/name` (or `namespace/rule-set-name` for rule-sets).
pub struct NatsObjectStore {
    workflows: kv::Store,
    rule_sets: kv::Store,
    hardware: kv::Store,
}

impl NatsObjectStore {
    pub async fn connect(config: &NatsObjectStoreConfig) -> Result<Self> {
        let client = async_nats::connect(config.nats_urls.join(","))
            .await
            .map_err(|e| Error::backend_read(anyhow::anyhow!(e.to_string())))?;
        let js = jetstream::new(client);

        let workflows = Self::ensure_bucket(&js, &config.workflows_bucket).await?;
        let rule_sets = Self::ensure_bucket(&js, &config.rule_sets_bucket).await?;
        let hardware = Self::ensure_bucket(&js, &config.hardware_bucket).await?;

        Ok(NatsObjectStore {
            workflows,
            rule_sets,
            hardware,
        })
    }

    async fn ensure_bucket(js: &jetstream::Context, bucket: &str) -> Result<kv::Store> {
        match js.get_key_value(bucket).await {
            Ok(store) => Ok(store),
            Err(_) => js
                .create_key_value(kv::Config {
                    bucket: bucket.to_string(),
                    history: 1,
                    ..Default::default()
                })
                .await
                .map_err(|e| Error::backend_write(anyhow::anyhow!(e.to_string()))),
        }
    }

    fn workflow_key(namespace: &str, name: &str) -> String {
        format!("{namespace}.{name}")
    }
}

#[async_trait]
impl ObjectStore for NatsObjectStore {
    async fn read_all(&self, agent_id: &AgentId) -> Result<Vec<Workflow>> {
        let mut keys = self
            .workflows
            .keys()
            .await
            .map_err(|e| Error::backend_read(anyhow::anyhow!(e.to_string())))?;

        let mut matched = Vec::new();
        use futures::StreamExt;
        while let Some(key) = keys.next().await {
            let key = key.map_err(|e| Error::backend_read(anyhow::anyhow!(e.to_string())))?;
            if let Some(entry) = self
                .workflows
                .get(&key)
                .await
                .map_err(|e| Error::backend_read(anyhow::anyhow!(e.to_string())))?
            {
                let workflow: Workflow = serde_json::from_slice(&entry)?;
                if !workflow.is_terminal() && workflow.status.tasks.iter().any(|t| &t.agent_id == agent_id) {
                    matched.push(workflow);
                }
            }
        }
        Ok(matched)
    }

    async fn read(&self, namespace: &Namespace, name: &WorkflowName) -> Result<Workflow> {
        let key = Self::workflow_key(namespace.as_str(), name.as_str());
        let entry = self
            .workflows
            .get(&key)
            .await
            .map_err(|e| Error::backend_read(anyhow::anyhow!(e.to_string())))?
            .ok_or_else(|| Error::NotFound(format!("workflow {namespace}/{name}")))?;
        Ok(serde_json::from_slice(&entry)?)
    }

    async fn update(&self, workflow: Workflow) -> Result<()> {
        let key = Self::workflow_key(workflow.namespace.as_str(), workflow.name.as_str());
        let payload = serde_json::to_vec(&workflow)?;
        self.workflows
            .put(&key, payload.into())
            .await
            .map_err(|e| Error::backend_write(anyhow::anyhow!(e.to_string())))?;
        Ok(())
    }

    async fn read_workflow_rule_sets(&self) -> Result<Vec<WorkflowRuleSet>> {
        let mut keys = self
            .rule_sets
            .keys()
            .await
            .map_err(|e| Error::backend_read(anyhow::anyhow!(e.to_string())))?;

        let mut rule_sets = Vec::new();
        use futures::StreamExt;
        while let Some(key) = keys.next().await {
            let key = key.map_err(|e| Error::backend_read(anyhow::anyhow!(e.to_string())))?;
            if let Some(entry) = self
                .rule_sets
                .get(&key)
                .await
                .map_err(|e| Error::backend_read(anyhow::anyhow!(e.to_string())))?
            {
                rule_sets.push(serde_json::from_slice::<WorkflowRuleSet>(&entry)?);
            }
        }
        rule_sets.sort_by(|a, b| {
            (a.namespace.as_str(), a.name.as_str()).cmp(&(b.namespace.as_str(), b.name.as_str()))
        });
        for rule_set in &mut rule_sets {
            rule_set.assign_pattern_ids();
        }
        Ok(rule_sets)
    }

    async fn create_workflow(&self, workflow: Workflow) -> Result<()> {
        let key = Self::workflow_key(workflow.namespace.as_str(), workflow.name.as_str());
        if self
            .workflows
            .get(&key)
            .await
            .map_err(|e| Error::backend_read(anyhow::anyhow!(e.to_string())))?
            .is_some()
        {
            return Err(Error::FailedPrecondition(format!(
                "workflow {}/{} already exists",
                workflow.namespace, workflow.name
            )));
        }
        let payload = serde_json::to_vec(&workflow)?;
        self.workflows
            .create(&key, payload.into())
            .await
            .map_err(|_| {
                Error::FailedPrecondition(format!(
                    "workflow {}/{} already exists",
                    workflow.namespace, workflow.name
                ))
            })?;
        Ok(())
    }

    async fn read_hardware(&self, namespace: &Namespace, name: &str) -> Result<Option<Hardware>> {
        let key = Self::workflow_key(namespace.as_str(), name);
        match self
            .hardware
            .get(&key)
            .await
            .map_err(|e| Error::backend_read(anyhow::anyhow!(e.to_string())))?
        {
            Some(entry) => Ok(Some(serde_json::from_slice(&entry)?)),
            None => Ok(None),
        }
    }

    async fn create_hardware(&self, hardware: Hardware) -> Result<()> {
        let key = Self::workflow_key(hardware.namespace.as_str(), &hardware.name);
        let payload = serde_json::to_vec(&hardware)?;
        // create-if-absent: ignore the "already exists" error from JetStream.
        let _ = self.hardware.create(&key, payload.into()).await;
        Ok(())
    }
}
