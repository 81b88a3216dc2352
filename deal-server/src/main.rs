//! dealsync binary entry point.
//!
//! Usage:
//! ```bash
//! dealsync --config dealsync.toml serve
//! dealsync init-credential https://example.bitrix24.com/rest/1/abc123/
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dealsync_server::config::Config;
use dealsync_server::credentials::CredentialStore;
use dealsync_server::http::{self, health, AppState};
use dealsync_server::storage::SqliteStorage;
use dealsync_server::sync::{DealSync, HttpTransportFactory};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CRM deal synchronization service.
#[derive(Parser, Debug)]
#[command(name = "dealsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults apply if missing)
    #[arg(long, global = true, default_value = "dealsync.toml")]
    config: PathBuf,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Encrypt and store the CRM webhook URL
    InitCredential {
        /// Plaintext webhook URL
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("dealsync_server=info,dealsync_client=info", cli.log_json);

    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let sync = build_sync(&config).await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, sync).await,
        Commands::InitCredential { url } => {
            sync.initialize_credential(&url)
                .await
                .context("initializing credential")?;
            println!("Credential written to {}", config.credential.path.display());
            Ok(())
        }
    }
}

async fn build_sync(config: &Config) -> Result<DealSync> {
    let fields = config.field_map().context("invalid CRM field mapping")?;
    let storage = SqliteStorage::new(&config.storage.database)
        .await
        .with_context(|| format!("opening {}", config.storage.database.display()))?;

    Ok(DealSync::new(
        storage,
        CredentialStore::new(&config.credential.path),
        fields,
        config.eligibility(),
        HttpTransportFactory::new(config.request_timeout()),
    ))
}

async fn serve(config: Config, sync: DealSync) -> Result<()> {
    health::init_start_time();

    let state = Arc::new(AppState::new(sync, config.call_timeout()));
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("binding {}", config.server.bind_address))?;
    tracing::info!(
        address = %config.server.bind_address,
        database = %config.storage.database.display(),
        "dealsync listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("dealsync stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
