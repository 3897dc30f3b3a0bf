//! timenode: TimeNode supervisor for the Ethereum Alarm Clock
//!
//! Runs the background worker that scans, claims and executes scheduled
//! transactions, and manages the operator's session:
//! - Keystore and attached DAY account (encrypted at rest)
//! - Scanning, claiming and economic strategy
//! - Custom provider selection

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use timenode::cli::{self, Commands};
use timenode::config::{Config, StorageBackend};
use timenode::crypto::EncryptionBox;
use timenode::network::JsonRpcChain;
use timenode::storage::{KeyValueStore, MemoryStore, SqliteStore};
use timenode::supervisor::{NotificationLevel, SupervisorEvent, TimeNodeSupervisor};
use timenode::worker::ProcessSpawner;

#[derive(Parser)]
#[command(name = "timenode")]
#[command(about = "TimeNode supervisor for the Ethereum Alarm Clock")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "timenode.toml")]
    config: String,

    /// Data directory
    #[arg(short, long, env = "TIMENODE_DATA_DIR")]
    data_dir: Option<String>,

    /// Worker executable (overrides config file)
    #[arg(long, env = "TIMENODE_WORKER")]
    worker: Option<String>,

    /// Ethereum JSON-RPC endpoint (overrides config file)
    #[arg(long, env = "TIMENODE_RPC_URL")]
    rpc_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("timenode=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Load or create default config
    let mut config = if std::path::Path::new(&cli.config).exists() {
        let content = std::fs::read_to_string(&cli.config)
            .with_context(|| format!("reading {}", cli.config))?;
        Config::from_toml(&content).with_context(|| format!("parsing {}", cli.config))?
    } else {
        info!("Config file not found, using defaults");
        Config::default()
    };

    // Apply CLI overrides
    if let Some(data_dir) = cli.data_dir {
        config.node.data_dir = PathBuf::from(data_dir);
    }
    if let Some(worker) = cli.worker {
        config.worker.program = PathBuf::from(worker);
    }
    if let Some(rpc_url) = cli.rpc_url {
        config.node.rpc_url = rpc_url;
    }

    info!("Data dir: {}", config.node.data_dir.display());
    info!("RPC endpoint: {}", config.node.rpc_url);

    let supervisor = build_supervisor(&config)?;

    match cli.command {
        Commands::Run { password } => run(supervisor, &password).await,
        Commands::Session(command) => {
            let mut events = supervisor.subscribe();
            let result = cli::execute_command(&supervisor, command).await;

            while let Ok(event) = events.try_recv() {
                if let SupervisorEvent::Notification(n) = event {
                    eprintln!("{}", n.message);
                }
            }

            match result {
                Ok(output) => {
                    println!("{}", output);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

fn build_supervisor(config: &Config) -> anyhow::Result<TimeNodeSupervisor> {
    let storage: Arc<dyn KeyValueStore> = match config.storage.backend {
        StorageBackend::Sqlite => Arc::new(
            SqliteStore::open(&config.node.data_dir).context("opening session store")?,
        ),
        StorageBackend::Memory => {
            warn!("Using in-memory session store, nothing will persist");
            Arc::new(MemoryStore::new())
        }
    };

    let key_file = config.key_file();
    let encryption = EncryptionBox::load_or_create(&key_file)
        .with_context(|| format!("loading storage key {}", key_file.display()))?;

    let chain = Arc::new(JsonRpcChain::new(config.node.rpc_url.clone()));
    let spawner = Arc::new(ProcessSpawner::new(
        config.worker.program.clone(),
        config.worker.args.clone(),
    ));

    Ok(TimeNodeSupervisor::new(
        storage,
        encryption,
        chain,
        spawner,
        config.network_registry(),
        config.supervisor_config(),
    )?)
}

async fn run(supervisor: TimeNodeSupervisor, password: &str) -> anyhow::Result<()> {
    let mut events = supervisor.subscribe();

    supervisor.unlock(password).await.context("unlocking TimeNode")?;
    info!(
        address = ?supervisor.my_address().ok().flatten(),
        tier = %supervisor.node_tier().await,
        "TimeNode running"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(SupervisorEvent::Notification(n)) => match n.level {
                    NotificationLevel::Success => info!("{}", n.message),
                    NotificationLevel::Error => error!("{}", n.message),
                },
                Ok(SupervisorEvent::NetworkChanged { net_id }) => {
                    warn!(net_id, "Network changed, restart the TimeNode to follow it");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped supervisor events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}
