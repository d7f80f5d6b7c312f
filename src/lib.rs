//! Forgeflow — a bare-metal provisioning workflow execution core.
//!
//! ## Core components
//!
//! - [`models`]: domain types — `Workflow`, `Task`, `Action`, `Hardware`,
//!   `WorkflowRuleSet`.
//! - [`store`]: the `ObjectStore` trait and its in-memory / NATS JetStream
//!   KV-backed implementations.
//! - [`dispatcher`]: `GetAction`, `ReportActionStatus`, auto-enrollment, and
//!   auto-discovery, wired behind a single [`Dispatcher`] handle.
//! - [`rpc`]: the JSON RPC surface the dispatcher exposes over HTTP.
//! - [`agent`]: the per-machine runner loop, its transport adapters, and
//!   the container executor.

pub mod agent;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod rpc;
pub mod store;

pub use dispatcher::{ActionDescriptor, ActionStatusReport, Dispatcher, DispatcherConfig};
pub use error::{Error, Result};
pub use models::{
    Action, ActionId, ActionState, AgentAttributes, AgentId, Condition, CurrentState, Hardware,
    HardwareSpec, MatchPattern, Namespace, OwnerReference, Task, TaskId, Workflow, WorkflowName,
    WorkflowRuleSet, WorkflowSpec, WorkflowState, WorkflowStatus,
};
pub use rpc::{RpcServer, RpcServerBuilder, RpcServerConfig};
pub use store::{InMemoryObjectStore, NatsObjectStore, ObjectStore};
