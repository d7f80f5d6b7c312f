//! Action sources and sinks the agent runner can be wired to (§4.5, §6).
//! `Reader` fetches the next action; `Writer` reports its outcome. Splitting
//! them lets a read-only source (e.g. a pre-baked local file) pair with a
//! network writer, or either side be swapped independently in tests.

pub mod bus;
pub mod file;
pub mod rpc_client;

use async_trait::async_trait;

use crate::dispatcher::{ActionDescriptor, ActionStatusReport};
use crate::error::Result;
use crate::models::{AgentAttributes, AgentId};

pub use bus::BusTransport;
pub use file::FileReader;
pub use rpc_client::RpcClientTransport;

#[async_trait]
pub trait Reader: Send + Sync {
    async fn get_action(
        &self,
        agent_id: &AgentId,
        attributes: Option<&AgentAttributes>,
    ) -> Result<ActionDescriptor>;
}

#[async_trait]
pub trait Writer: Send + Sync {
    async fn report_action_status(&self, report: ActionStatusReport) -> Result<()>;
}
