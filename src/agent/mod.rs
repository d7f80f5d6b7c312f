//! Per-machine agent (§4.5): poll the dispatcher for an action, execute it
//! in a container, and report the outcome. Transport and executor are
//! behind traits so the runner loop is identical whether actions arrive
//! over HTTP, a message bus, or a local file, and whether they execute in
//! a real container runtime or a test double.

pub mod executor;
pub mod runner;
pub mod transport;

pub use runner::{AgentRunner, AgentRunnerConfig};
