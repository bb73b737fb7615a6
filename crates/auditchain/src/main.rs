use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use auditchain::auth::RequestAuthenticator;
use auditchain::config::LedgerBackend;
use auditchain::ledger::{HttpLedgerClient, LedgerClient, MemoryLedger};
use auditchain::store::SqliteStore;
use auditchain::{build_router, spawn_sweep, telemetry, AppState, AuditService, ServiceConfig, ServiceOptions};

/// Tamper-evident audit log service.
#[derive(Debug, Parser)]
#[command(name = "auditchain", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "AUDITCHAIN_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Print the effective configuration (seed redacted) and exit.
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    if cli.print_config {
        print!("{}", config.to_redacted_toml()?);
        return Ok(());
    }

    telemetry::init(&config.log)?;

    let store = if config.store.is_memory() {
        SqliteStore::open_memory()
    } else {
        SqliteStore::open(&config.store.path)
    }
    .with_context(|| format!("opening store {}", config.store.path.display()))?;
    let store = Arc::new(store);

    match config.ledger.backend {
        LedgerBackend::Http => {
            let ledger = HttpLedgerClient::new(
                config.registry(),
                config.ledger.network_id,
                config.keypair()?,
                config.retry_policy(),
            )?;
            tracing::info!(node = %ledger.node_url(), network = %config.ledger.network_id, "using ledger node");
            run(config, store, Arc::new(ledger)).await
        }
        LedgerBackend::Memory => {
            tracing::warn!("using the in-memory ledger, anchors are not durable");
            let ledger = MemoryLedger::with_registry(config.registry());
            run(config, store, Arc::new(ledger)).await
        }
    }
}

async fn run<L>(config: ServiceConfig, store: Arc<SqliteStore>, ledger: Arc<L>) -> anyhow::Result<()>
where
    L: LedgerClient + 'static,
{
    let signer = config.keypair()?;
    tracing::info!(key = %signer.public_key().to_hex(), "service signing key loaded");

    let service = Arc::new(AuditService::new(
        store.clone(),
        ledger,
        signer,
        ServiceOptions {
            anchor_after_append: config.anchoring.after_append,
        },
    ));
    let auth = RequestAuthenticator::new(store, config.registry()).with_max_skew(config.max_skew());

    let sweep = (config.anchoring.sweep_interval_secs > 0).then(|| {
        let every = Duration::from_secs(config.anchoring.sweep_interval_secs);
        tracing::info!(interval = ?every, "anchoring sweep enabled");
        spawn_sweep(service.clone(), every)
    });

    let app = build_router(AppState { service, auth }, config.server.route_prefix.as_deref());

    let listener = TcpListener::bind(config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    tracing::info!(addr = %config.server.bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sweep) = sweep {
        sweep.abort();
    }
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown requested");
}
