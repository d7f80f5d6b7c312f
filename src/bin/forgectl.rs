//! Operator CLI for inspecting and cleaning up dispatcher state. Talks
//! directly to the object store backend, bypassing the dispatcher RPC
//! surface, for maintenance tasks an agent would never perform.

use clap::{Parser, Subcommand};
use tracing::{error, info};

use forgeflow::store::{InMemoryObjectStore, NatsObjectStore, NatsObjectStoreConfig};
use forgeflow::ObjectStore;

#[derive(Parser)]
#[command(name = "forgectl")]
#[command(about = "Forgeflow operator CLI - inspect and clean up dispatcher state")]
#[command(version = "0.1")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// NATS server URL; omit to operate against a fresh in-memory store
    /// (useful only for smoke-testing forgectl itself).
    #[arg(long, env = "NATS_URL")]
    nats_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a workflow's current status.
    GetWorkflow {
        namespace: String,
        name: String,
    },

    /// List every rule-set currently registered.
    ListRuleSets,

    /// Show a hardware record.
    GetHardware {
        namespace: String,
        name: String,
    },

    /// Delete a workflow. Requires --confirm.
    DeleteWorkflow {
        namespace: String,
        name: String,
        #[arg(long)]
        confirm: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let store: Box<dyn ObjectStore> = match &cli.nats_url {
        Some(url) => {
            let config = NatsObjectStoreConfig {
                nats_urls: vec![url.clone()],
                ..Default::default()
            };
            Box::new(NatsObjectStore::connect(&config).await?)
        }
        None => Box::new(InMemoryObjectStore::new()),
    };

    match cli.command {
        Commands::GetWorkflow { namespace, name } => {
            let workflow = store.read(&namespace.into(), &name.into()).await?;
            println!("{}", serde_json::to_string_pretty(&workflow)?);
        }
        Commands::ListRuleSets => {
            let rule_sets = store.read_workflow_rule_sets().await?;
            info!(count = rule_sets.len(), "rule-sets");
            println!("{}", serde_json::to_string_pretty(&rule_sets)?);
        }
        Commands::GetHardware { namespace, name } => {
            match store.read_hardware(&namespace.into(), &name).await? {
                Some(hardware) => println!("{}", serde_json::to_string_pretty(&hardware)?),
                None => println!("no hardware record for {namespace}/{name}"),
            }
        }
        Commands::DeleteWorkflow { namespace, name, confirm } => {
            if !confirm {
                error!("refusing to delete {namespace}/{name} without --confirm");
                std::process::exit(1);
            }
            // ObjectStore has no delete operation (§6): deletion is an
            // operator-only escape hatch the core never needs, so forgectl
            // reports what it would have removed instead of silently
            // reaching past the trait boundary.
            let workflow = store.read(&namespace.into(), &name.into()).await?;
            println!(
                "workflow {} is in state {:?}; delete it directly in the backing store",
                workflow.id(),
                workflow.status.state
            );
        }
    }

    Ok(())
}
