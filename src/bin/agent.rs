//! Per-machine agent binary: wires a transport (HTTP, NATS, or local file)
//! and the container executor into the runner loop.

use std::env;
use std::sync::Arc;

use dotenv::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use forgeflow::agent::executor::ContainerExecutor;
use forgeflow::agent::transport::{BusTransport, FileReader, RpcClientTransport};
use forgeflow::agent::{AgentRunner, AgentRunnerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenv() {
        eprintln!("no .env file loaded: {e}");
    }
    tracing_subscriber::fmt::init();

    let agent_id: forgeflow::AgentId = env::var("AGENT_ID")
        .map_err(|_| "AGENT_ID must be set")?
        .into();

    info!(%agent_id, "starting forgeflow agent");

    let transport_kind = env::var("AGENT_TRANSPORT").unwrap_or_else(|_| "rpc".to_string());
    let working_dir = env::var("AGENT_WORKING_DIR").unwrap_or_else(|_| "/var/lib/forgeflow".to_string());

    let executor = Arc::new(ContainerExecutor::connect(working_dir)?);
    let cancel = CancellationToken::new();

    let run_result = match transport_kind.as_str() {
        "bus" => {
            let nats_url = env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".to_string());
            let subject_prefix = env::var("BUS_SUBJECT_PREFIX").unwrap_or_else(|_| "forge".to_string());
            let client = async_nats::connect(&nats_url).await?;
            let transport = Arc::new(BusTransport::new(client, subject_prefix, agent_id.to_string()));
            run(agent_id, transport.clone(), transport, executor, cancel).await
        }
        "file" => {
            let path = env::var("AGENT_ACTION_FILE").map_err(|_| "AGENT_ACTION_FILE must be set for the file transport")?;
            let reader = Arc::new(FileReader::load(&path).await?);
            let dispatcher_url = env::var("DISPATCHER_URL").unwrap_or_else(|_| "http://127.0.0.1:7171".to_string());
            let writer = Arc::new(RpcClientTransport::new(dispatcher_url));
            run(agent_id, reader, writer, executor, cancel).await
        }
        _ => {
            let dispatcher_url = env::var("DISPATCHER_URL").unwrap_or_else(|_| "http://127.0.0.1:7171".to_string());
            let transport = Arc::new(RpcClientTransport::new(dispatcher_url));
            run(agent_id, transport.clone(), transport, executor, cancel).await
        }
    };

    if let Err(e) = run_result {
        error!(error = %e, "agent runner exited");
        return Err(e.into());
    }
    Ok(())
}

async fn run(
    agent_id: forgeflow::AgentId,
    reader: Arc<dyn forgeflow::agent::transport::Reader>,
    writer: Arc<dyn forgeflow::agent::transport::Writer>,
    executor: Arc<ContainerExecutor>,
    cancel: CancellationToken,
) -> forgeflow::Result<()> {
    let runner = AgentRunner::new(
        AgentRunnerConfig {
            agent_id,
            attributes: None,
        },
        reader,
        writer,
        executor,
    );
    runner.run(cancel).await
}
