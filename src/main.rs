//! Household Tasks Server
//!
//! HTTP backend for shared household chores: tasks, rooms, and the
//! dependency graph between tasks.

use anyhow::{Context, Result};
use clap::Parser;
use household_tasks::api::{self, AppState};
use household_tasks::cli::{Cli, Command};
use household_tasks::config::Config;
use household_tasks::db::Database;
use household_tasks::logging::{self, LogTarget};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut config = Config::resolve(cli.config.as_deref().map(Path::new))?;
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.into();
    }

    config.ensure_db_dir()?;
    let db = Database::open(&config.server.db_path)
        .with_context(|| format!("opening database {}", config.server.db_path.display()))?;
    info!("Database opened at {}", config.server.db_path.display());

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(Arc::new(db), &config).await
        }
        Command::Verify => verify(&db),
    }
}

async fn serve(db: Arc<Database>, config: &Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind))?;

    let state = AppState::new(db, config);
    info!(
        cache_enabled = state.cache.is_enabled(),
        page_limits = ?state.page_limits,
        "Starting API server"
    );
    let handle = api::start_server(state, addr).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    handle.shutdown().await;
    Ok(())
}

fn verify(db: &Database) -> Result<()> {
    match db.verify_graph()? {
        None => {
            println!("Dependency graph OK: no cycles found");
            Ok(())
        }
        Some(cycle) => {
            warn!(cycle = ?cycle, "Dependency cycle found in stored graph");
            eprintln!("Dependency cycle: {}", cycle.join(" -> "));
            std::process::exit(1);
        }
    }
}
