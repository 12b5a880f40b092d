use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kstor_store::Store;

use kstord::config::Config;
use kstord::dispatcher::Dispatcher;
use kstord::server::Server;
use kstord::session::SessionStore;

#[derive(Parser, Debug)]
#[command(author, version, about = "KStor secret-sharing daemon", long_about = None)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "kstor.yaml")]
    config: PathBuf,

    /// Override the configured socket path.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Override the configured database path.
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    if let Some(socket) = cli.socket {
        config.socket = socket;
    }
    if let Some(database) = cli.database {
        config.database = database;
    }

    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = Store::open(&config.database)
        .await
        .with_context(|| format!("opening database {}", config.database.display()))?;
    let sessions = Arc::new(SessionStore::new(
        Duration::from_secs(config.session_idle_timeout),
        Duration::from_secs(config.session_life_timeout),
    ));
    let dispatcher = Arc::new(Dispatcher::new(store, sessions));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    Server::new(config, dispatcher).run(shutdown_rx).await
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("installing SIGTERM handler");
        tokio::select! {
            _ = signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
}
