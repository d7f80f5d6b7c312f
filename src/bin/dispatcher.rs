//! Dispatcher server binary: assembles the object store, the dispatcher
//! core, and the RPC surface, then serves until killed.

use std::env;
use std::sync::Arc;

use dotenv::dotenv;
use tracing::{error, info};

use forgeflow::rpc::serve_nats;
use forgeflow::store::{InMemoryObjectStore, NatsObjectStore, NatsObjectStoreConfig};
use forgeflow::{Dispatcher, DispatcherConfig, ObjectStore, RpcServerBuilder, RpcServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenv() {
        eprintln!("no .env file loaded: {e}");
    }
    tracing_subscriber::fmt::init();

    info!("starting forgeflow dispatcher");

    let storage_backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| "memory".to_string());
    let host = env::var("DISPATCHER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("DISPATCHER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(7171);

    let store: Arc<dyn ObjectStore> = match storage_backend.as_str() {
        "nats" => {
            let nats_url = env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".to_string());
            info!(%nats_url, "connecting to NATS JetStream object store");
            let config = NatsObjectStoreConfig {
                nats_urls: vec![nats_url],
                ..Default::default()
            };
            match NatsObjectStore::connect(&config).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    error!(error = %e, "failed to connect to NATS object store");
                    return Err(e.into());
                }
            }
        }
        other => {
            if other != "memory" {
                info!(backend = other, "unknown STORAGE_BACKEND, defaulting to memory");
            }
            Arc::new(InMemoryObjectStore::new())
        }
    };

    let dispatcher_config = DispatcherConfig {
        auto_discovery_enabled: env::var("AUTO_DISCOVERY_ENABLED")
            .map(|v| v != "false")
            .unwrap_or(true),
        auto_enrollment_enabled: env::var("AUTO_ENROLLMENT_ENABLED")
            .map(|v| v != "false")
            .unwrap_or(true),
        discovery_namespace: env::var("DISCOVERY_NAMESPACE")
            .unwrap_or_else(|_| "discovery".to_string())
            .into(),
    };

    let dispatcher = Dispatcher::new(store, dispatcher_config);

    let bus_enabled = env::var("DISPATCHER_BUS_ENABLED").map(|v| v == "true").unwrap_or(false);
    if bus_enabled {
        let nats_url = env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".to_string());
        let subject_prefix = env::var("BUS_SUBJECT_PREFIX").unwrap_or_else(|_| "forge".to_string());
        let client = async_nats::connect(&nats_url).await?;
        let bus_dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_nats(bus_dispatcher, client, &subject_prefix).await {
                error!(error = %e, "NATS bus listener exited");
            }
        });
    }

    RpcServerBuilder::new()
        .with_config(RpcServerConfig {
            host,
            port,
            cors_enabled: true,
        })
        .with_dispatcher(dispatcher)
        .build_and_run()
        .await?;

    Ok(())
}
