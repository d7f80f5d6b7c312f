//! Typed adapter over the external, watchable key/value object store (§6).
//! The core never talks to the backing store directly; every read/write
//! goes through this trait so the dispatcher can be tested against an
//! in-memory fake.

pub mod memory;
pub mod nats;

pub use memory::InMemoryObjectStore;
pub use nats::{NatsObjectStore, NatsObjectStoreConfig};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{AgentId, Hardware, Namespace, Workflow, WorkflowName, WorkflowRuleSet};

/// What the dispatcher core consumes from the external object store (§6).
///
/// Implementors own durability; the core holds only short-lived references
/// during a single RPC (§3).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Non-terminal workflows assigned to `agent_id`, via the store's
    /// agent-index (which emits nothing for SUCCESS/FAILED/TIMEOUT
    /// workflows).
    async fn read_all(&self, agent_id: &AgentId) -> Result<Vec<Workflow>>;

    async fn read(&self, namespace: &Namespace, name: &WorkflowName) -> Result<Workflow>;

    /// Last-writer-wins write; conflicts are the retry harness's job.
    async fn update(&self, workflow: Workflow) -> Result<()>;

    /// All rule-sets, sorted `(namespace, name)` for deterministic
    /// tie-breaking (DESIGN.md open question #1).
    async fn read_workflow_rule_sets(&self) -> Result<Vec<WorkflowRuleSet>>;

    /// Fails with [`crate::error::Error::FailedPrecondition`] if a workflow
    /// of the same `(namespace, name)` already exists.
    async fn create_workflow(&self, workflow: Workflow) -> Result<()>;

    async fn read_hardware(&self, namespace: &Namespace, name: &str) -> Result<Option<Hardware>>;

    /// Create-if-absent; never overwrites (§4.4).
    async fn create_hardware(&self, hardware: Hardware) -> Result<()>;
}
