//! Runs a single action to completion (§4.6).

pub mod container;
pub mod dns;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::models::Action;

pub use container::ContainerExecutor;

/// Outcome of one action run.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub message: String,
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs `action` to completion, honouring `timeout` as a hard deadline.
    /// A non-zero exit is a failed [`ExecutionOutcome`], not an `Err`; `Err`
    /// is reserved for infrastructure failures (image pull, daemon
    /// unreachable) distinct from the workload's own exit status.
    async fn execute(&self, action: &Action, timeout: Duration) -> Result<ExecutionOutcome>;
}
