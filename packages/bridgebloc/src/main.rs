//! BridgeBloc CLI
//!
//! Runs cross-chain transfers with a local key:
//!
//! ```text
//! bridgebloc routes [--chain ethereum]
//! bridgebloc tokens --chain ethereum
//! bridgebloc transfer --from ethereum --to arbitrum --token USDC --amount 10.5
//! bridgebloc notify --from ethereum --to arbitrum --tx-hash 0x...
//! bridgebloc logout
//! ```
//!
//! Ctrl+C during a transfer aborts the attempt; an already broadcast deposit
//! keeps going on-chain and can be registered later with `notify`.

use alloy::primitives::TxHash;
use bridgebloc::auth::CredentialStore;
use bridgebloc::catalog::Token;
use bridgebloc::connectivity::spawn_connectivity_probe;
use bridgebloc::evm::{LocalEvmWallet, LocalEvmWalletConfig};
use bridgebloc::{
    AuthorizationManager, BackendNotifier, Catalog, Config, FileCredentialStore, HttpBackend,
    NetworkMonitor, StaticCatalog, TokenRef, TransferIntent, TransferOrchestrator, Wallet,
};
use clap::{Parser, Subcommand};
use eyre::{eyre, Result, WrapErr};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "bridgebloc")]
#[command(about = "Cross-chain transfers through the BridgeBloc bridge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List source chains, or destinations reachable from one chain
    Routes {
        #[arg(long)]
        chain: Option<String>,
    },

    /// List known tokens on a chain
    Tokens {
        #[arg(long)]
        chain: String,
    },

    /// Bridge tokens from one chain to another
    Transfer {
        /// Source chain name
        #[arg(long)]
        from: String,
        /// Destination chain name
        #[arg(long)]
        to: String,
        /// Source token symbol or address
        #[arg(long)]
        token: String,
        /// Destination token symbol or address (defaults to --token)
        #[arg(long)]
        destination_token: Option<String>,
        /// Decimal amount, e.g. 10.5
        #[arg(long)]
        amount: String,
        /// Destination recipient (defaults to the wallet address)
        #[arg(long)]
        recipient: Option<String>,
    },

    /// Register an already confirmed deposit with the backend
    Notify {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        tx_hash: TxHash,
    },

    /// Forget the cached backend authorization
    Logout,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;
    info!(backend = %config.backend_url, "Configuration loaded");

    match cli.command {
        Commands::Routes { chain } => cmd_routes(&config, chain).await,
        Commands::Tokens { chain } => cmd_tokens(&config, &chain),
        Commands::Transfer {
            from,
            to,
            token,
            destination_token,
            amount,
            recipient,
        } => {
            let catalog = load_catalog(&config).await?;
            let intent = build_intent(
                &catalog,
                &from,
                &to,
                &token,
                destination_token.as_deref().unwrap_or(&token),
                amount,
                recipient,
            )?;
            cmd_transfer(&config, catalog, intent).await
        }
        Commands::Notify { from, to, tx_hash } => cmd_notify(&config, &from, &to, tx_hash).await,
        Commands::Logout => {
            FileCredentialStore::new(&config.credential_path).clear()?;
            println!("Cached authorization cleared");
            Ok(())
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bridgebloc=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Catalog file with the route table refreshed from the backend when reachable
async fn load_catalog(config: &Config) -> Result<StaticCatalog> {
    let catalog = StaticCatalog::load(&config.catalog_path)?;
    let backend = HttpBackend::new(config.backend_config());
    match backend.fetch_routes().await {
        Ok(routes) => Ok(catalog.with_routes(routes)),
        Err(e) => {
            warn!(error = %e, "Using catalog routes; backend route table unavailable");
            Ok(catalog)
        }
    }
}

fn build_wallet(config: &Config, catalog: &StaticCatalog, chain: &str) -> Result<LocalEvmWallet> {
    let private_key = config
        .wallet_private_key
        .clone()
        .ok_or_else(|| eyre!("WALLET_PRIVATE_KEY required"))?;
    let initial_chain_id = catalog
        .chain_id_for(chain)
        .ok_or_else(|| eyre!("Unknown chain {}", chain))?;

    LocalEvmWallet::new(LocalEvmWalletConfig {
        private_key,
        rpc_urls: config.rpc_urls.clone(),
        initial_chain_id,
        receipt_poll_interval: config.receipt_poll_interval(),
    })
}

fn find_token(catalog: &StaticCatalog, chain: &str, symbol_or_address: &str) -> TokenRef {
    match catalog.find_token(chain, symbol_or_address) {
        Some(Token {
            address, decimals, ..
        }) => TokenRef::new(address, decimals),
        // Unlisted token: pass the raw address through, decimals unknown
        None => TokenRef::new(symbol_or_address, None),
    }
}

fn build_intent(
    catalog: &StaticCatalog,
    from: &str,
    to: &str,
    token: &str,
    destination_token: &str,
    amount: String,
    recipient: Option<String>,
) -> Result<TransferIntent> {
    if catalog.chain_id_for(to).is_none() {
        return Err(eyre!("Unknown destination chain {}", to));
    }
    let routes = catalog.list_chain_routes(from);
    if !routes.is_empty() && !routes.iter().any(|r| r.chain == to) {
        warn!(from, to, "No published route between these chains");
    }

    Ok(TransferIntent {
        source_chain: from.to_string(),
        source_token: find_token(catalog, from, token),
        destination_chain: to.to_string(),
        destination_token: find_token(catalog, to, destination_token),
        amount,
        recipient_address: recipient,
    })
}

async fn cmd_routes(config: &Config, chain: Option<String>) -> Result<()> {
    let catalog = load_catalog(config).await?;
    match chain {
        None => {
            for route in catalog.list_routes() {
                println!("{}", route.chain);
            }
        }
        Some(chain) => {
            for route in catalog.list_chain_routes(&chain) {
                println!("{} -> {} ({})", chain, route.chain, route.route);
            }
        }
    }
    Ok(())
}

fn cmd_tokens(config: &Config, chain: &str) -> Result<()> {
    let catalog = StaticCatalog::load(&config.catalog_path)?;
    for token in catalog.tokens_for_chain(chain) {
        let decimals = token
            .decimals
            .map(|d| d.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("{:<8} {} (decimals: {})", token.symbol, token.address, decimals);
    }
    Ok(())
}

async fn cmd_transfer(
    config: &Config,
    catalog: StaticCatalog,
    intent: TransferIntent,
) -> Result<()> {
    let wallet = Arc::new(build_wallet(config, &catalog, &intent.source_chain)?);

    let network = NetworkMonitor::default();
    let probe = spawn_connectivity_probe(
        network.clone(),
        config.backend_url.clone(),
        config.connectivity_probe_interval(),
    );

    let orchestrator = TransferOrchestrator::new(
        wallet,
        Arc::new(catalog),
        Arc::new(HttpBackend::new(config.backend_config())),
        Arc::new(FileCredentialStore::new(&config.credential_path)),
        network,
        config.orchestrator_settings(),
    );

    let abort = orchestrator.abort_handle();
    let interrupt = tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        abort.abort();
    });

    let result = orchestrator.run(intent).await;
    interrupt.abort();
    probe.abort();

    match result {
        Ok(attempt) => {
            println!(
                "Transfer completed: tx {} tracking id {}",
                attempt.tx_hash.map(|h| h.to_string()).unwrap_or_default(),
                attempt.tracking_id.unwrap_or_default()
            );
            Ok(())
        }
        Err(failure) => {
            if let Some(hint) = failure.recovery_hint() {
                eprintln!("{}", hint);
            }
            Err(failure.into())
        }
    }
}

async fn cmd_notify(config: &Config, from: &str, to: &str, tx_hash: TxHash) -> Result<()> {
    let catalog = StaticCatalog::load(&config.catalog_path)?;
    let wallet = Arc::new(build_wallet(config, &catalog, from)?);
    let address = wallet
        .address()
        .ok_or_else(|| eyre!("Wallet has no address"))?;

    let authorization = AuthorizationManager::new(
        wallet,
        Arc::new(FileCredentialStore::new(&config.credential_path)),
    )
    .get_or_create_authorization(address)
    .await?;

    let backend = HttpBackend::new(config.backend_config());
    let tracking_id = backend
        .notify(&authorization, tx_hash, from, to)
        .await
        .wrap_err_with(|| format!("Failed to register {}", tx_hash))?;

    println!("Conversion registered: tracking id {}", tracking_id);
    Ok(())
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, aborting transfer");
        }
        _ = terminate => {
            info!("Received SIGTERM, aborting transfer");
        }
    }
}
