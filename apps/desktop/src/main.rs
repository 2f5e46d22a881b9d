use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, price::convert, ConnectError, NamedChooser, SessionSnapshot, Settings,
    StaticHostEnvironment, TransferOutcome, WalletController,
};
use shared::domain::{format_address, Network};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Solana wallet session controller")]
struct Cli {
    /// Cluster to talk to; overrides the settings file.
    #[arg(long)]
    network: Option<Network>,
    /// Custom ledger RPC endpoint.
    #[arg(long)]
    rpc_url: Option<String>,
    /// Solana CLI keypair file offered as a native wallet.
    #[arg(long)]
    keypair: Option<PathBuf>,
    /// MetaMask-compatible bridge endpoint.
    #[arg(long)]
    bridge_url: Option<String>,
    /// Wallet to use when several are available.
    #[arg(long)]
    wallet: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the wallets this host offers.
    Providers,
    /// Connect and print the account address.
    Address,
    Balance,
    Price,
    History {
        #[arg(long)]
        limit: Option<usize>,
    },
    Send {
        recipient: String,
        /// Amount in SOL, e.g. `0.25` or `1e-3`.
        amount: String,
    },
}

impl Cli {
    fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(network) = self.network {
            settings.network = network;
        }
        if let Some(rpc_url) = &self.rpc_url {
            settings.rpc_url = Some(rpc_url.clone());
        }
        if let Some(keypair) = &self.keypair {
            settings.keypair_path = Some(keypair.clone());
        }
        if let Some(bridge_url) = &self.bridge_url {
            settings.bridge_url = Some(bridge_url.clone());
        }
    }
}

async fn connect(controller: &WalletController, wallet: Option<&str>) -> Result<SessionSnapshot> {
    let chooser = NamedChooser(wallet.unwrap_or_default().to_string());
    match controller.connect(&chooser).await {
        Ok(session) => Ok(session),
        Err(ConnectError::SelectionCancelled) => {
            let names: Vec<String> = controller
                .discover()
                .into_iter()
                .map(|option| option.display_name)
                .collect();
            bail!("several wallets available, pick one with --wallet: {}", names.join(", "))
        }
        Err(err) => bail!("wallet connection failed: {}", err.user_message()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings()?;
    cli.apply_overrides(&mut settings);
    settings.validate()?;

    let host = StaticHostEnvironment::from_settings(&settings)?;
    let controller = WalletController::new(&settings, Arc::new(host));
    let wallet = cli.wallet.as_deref();

    match cli.command {
        Command::Providers => {
            let options = controller.discover();
            if options.is_empty() {
                println!("{}", client_core::NO_COMPATIBLE_WALLET_MESSAGE);
            }
            for option in options {
                println!("{} ({:?})", option.display_name, option.kind());
            }
        }
        Command::Address => {
            let session = connect(&controller, wallet).await?;
            let account = controller.account().await.context("no connected account")?;
            println!("{} via {}", account, session.wallet_name.unwrap_or_default());
        }
        Command::Balance => {
            connect(&controller, wallet).await?;
            let balance = controller
                .refresh_balance()
                .await
                .context("failed to read balance")?
                .unwrap_or_default();
            if let Err(err) = controller.refresh_price().await {
                tracing::warn!("price unavailable: {err:#}");
            }
            let quote = controller.price().await;
            println!(
                "{}: {} ({})",
                format_address(controller.account().await.as_ref()),
                convert::format_sol_balance(balance),
                convert::format_fiat_balance(balance, quote.as_ref())
            );
        }
        Command::Price => {
            let quote = controller
                .refresh_price()
                .await
                .context("failed to fetch SOL price")?;
            println!(
                "1 SOL = ${:.2} USD (at {})",
                quote.usd_per_sol,
                quote.fetched_at.to_rfc3339()
            );
        }
        Command::History { limit } => {
            connect(&controller, wallet).await?;
            let history = controller
                .recent_transactions(limit.unwrap_or(settings.history_limit))
                .await
                .context("failed to read transaction history")?;
            if history.is_empty() {
                println!("no transactions");
            }
            for entry in history {
                let when = entry
                    .block_time
                    .map(|time| time.to_rfc3339())
                    .unwrap_or_else(|| "pending".to_string());
                let status = if entry.succeeded { "ok" } else { "failed" };
                println!("{when} slot={} {status} {}", entry.slot, entry.signature);
            }
        }
        Command::Send { recipient, amount } => {
            connect(&controller, wallet).await?;
            match controller.submit_transfer(&recipient, &amount).await {
                TransferOutcome::Success(signature) => {
                    println!("confirmed {signature}");
                    println!("{}", controller.network().explorer_tx_url(&signature));
                    if let Some(balance) = controller.balance().await {
                        println!("balance now {}", convert::format_sol_balance(balance));
                    }
                }
                TransferOutcome::Failure(err) => bail!("transfer failed ({}): {err}", err.kind()),
            }
        }
    }

    Ok(())
}
