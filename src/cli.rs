//! Operator commands
//!
//! One-shot operations against the persisted session. `run` lives in the
//! binary since it owns the process until interrupted.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde_json::json;
use tracing::info;

use crate::supervisor::{StrategyUpdate, SupervisorError, TimeNodeSupervisor};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Unlock the TimeNode and run until interrupted
    Run {
        /// Keystore password
        #[arg(long, env = "TIMENODE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    #[command(flatten)]
    Session(SessionCommands),
}

#[derive(Debug, Subcommand)]
pub enum SessionCommands {
    /// Store a keystore file (encrypted at rest)
    Keystore {
        /// Path to a v3 keystore JSON file
        file: PathBuf,
    },

    /// Check a password against the stored keystore
    CheckPassword {
        #[arg(long, env = "TIMENODE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Attach a DAY account from a signed ownership proof
    Attach {
        /// Path to the signature JSON produced by the wallet tool
        file: PathBuf,
    },

    /// Forget the wallet and attached account
    Detach,

    /// Use a custom Ethereum provider from the next start
    Provider {
        /// Chain id served by the provider
        id: u64,
        endpoint: String,
        /// Do not probe the endpoint first
        #[arg(long)]
        skip_test: bool,
    },

    /// Save the claiming flag and economic strategy
    Strategy(StrategyArgs),

    /// Print the session, tier and settings as JSON
    Status,
}

/// Omitted values are cleared and fall back to defaults
#[derive(Debug, Args)]
pub struct StrategyArgs {
    /// Enable claiming
    #[arg(long)]
    pub claiming: bool,
    /// Ether
    #[arg(long)]
    pub max_deposit: Option<String>,
    /// Ether
    #[arg(long)]
    pub min_balance: Option<String>,
    /// Ether
    #[arg(long)]
    pub min_profitability: Option<String>,
    /// Percent
    #[arg(long)]
    pub max_gas_subsidy: Option<String>,
    /// Seconds
    #[arg(long)]
    pub min_claim_window: Option<String>,
    #[arg(long)]
    pub min_claim_window_block: Option<String>,
    /// Seconds
    #[arg(long)]
    pub min_execution_window: Option<String>,
    #[arg(long)]
    pub min_execution_window_block: Option<String>,
}

impl From<StrategyArgs> for StrategyUpdate {
    fn from(args: StrategyArgs) -> Self {
        StrategyUpdate {
            max_deposit: args.max_deposit,
            min_balance: args.min_balance,
            min_profitability: args.min_profitability,
            max_gas_subsidy: args.max_gas_subsidy,
            min_claim_window: args.min_claim_window,
            min_claim_window_block: args.min_claim_window_block,
            min_execution_window: args.min_execution_window,
            min_execution_window_block: args.min_execution_window_block,
        }
    }
}

/// Execute a one-shot command and return its output.
pub async fn execute_command(
    supervisor: &TimeNodeSupervisor,
    command: SessionCommands,
) -> Result<String, SupervisorError> {
    match command {
        SessionCommands::Keystore { file } => {
            let json = std::fs::read_to_string(&file)?;
            supervisor.set_keystore(&json).await?;
            let address = supervisor.my_address()?.unwrap_or_default();
            Ok(format!("Keystore stored for {address}"))
        }

        SessionCommands::CheckPassword { password } => {
            if supervisor.password_matches_keystore(&password) {
                Ok("Password matches".to_string())
            } else {
                Ok("Password does not match".to_string())
            }
        }

        SessionCommands::Attach { file } => {
            let payload = std::fs::read_to_string(&file)?;
            let tier = supervisor.attach_day_account(&payload).await?;
            Ok(format!("Attached. Tier: {tier}"))
        }

        SessionCommands::Detach => {
            supervisor.detach_wallet().await?;
            Ok("Wallet detached".to_string())
        }

        SessionCommands::Provider {
            id,
            endpoint,
            skip_test,
        } => {
            if !skip_test && !supervisor.test_custom_provider(&endpoint).await {
                return Err(SupervisorError::UnsupportedProvider);
            }
            supervisor.set_custom_provider(id, &endpoint).await?;
            info!(id, endpoint = %endpoint, "Provider saved, restart to apply");
            Ok(format!("Provider {id} set to {endpoint}. Restart the TimeNode to apply."))
        }

        SessionCommands::Strategy(args) => {
            let claiming = args.claiming;
            supervisor
                .save_claiming_strategy(claiming, &args.into())
                .await?;
            let strategy = supervisor.economic_strategy()?;
            Ok(serde_json::to_string_pretty(&json!({
                "claiming": claiming,
                "economicStrategy": strategy,
            }))
            .unwrap_or_default())
        }

        SessionCommands::Status => {
            let session = supervisor.session().await;
            let status = json!({
                "state": supervisor.state().await,
                "tier": session.node_tier().name(),
                "address": supervisor.my_address()?,
                "attachedDayAccount": supervisor.attached_day_address()?,
                "customProvider": supervisor.custom_provider()?,
                "session": session,
            });
            Ok(serde_json::to_string_pretty(&status).unwrap_or_default())
        }
    }
}
