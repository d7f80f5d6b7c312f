//! Core domain records: `Workflow`/`Task`/`Action`, the enrollment rule-set,
//! and the input-only hardware/attribute shapes. Language-agnostic on
//! purpose - nothing here knows about the object store, RPC wire format, or
//! container runtime.

pub mod action;
pub mod attributes;
pub mod hardware;
pub mod ids;
pub mod naming;
pub mod ruleset;
pub mod task;
pub mod workflow;

pub use action::{Action, ActionState};
pub use attributes::{AgentAttributes, BlockDevice, Cpu, Memory, NetworkInterface};
pub use hardware::{Hardware, HardwareSpec};
pub use ids::{ActionId, AgentId, Namespace, TaskId, WorkflowName};
pub use naming::{enrollment_workflow_name, make_valid_name};
pub use ruleset::{MatchPattern, WorkflowRuleSet};
pub use task::Task;
pub use workflow::{Condition, CurrentState, OwnerReference, Workflow, WorkflowSpec, WorkflowState, WorkflowStatus};
