//! # accountlink entry point
//!
//! `serve` (the default) runs the HTTP service, `migrate` applies the
//! schema migrations, `purge-sessions` removes expired session rows.

use accountlink::{
    config::ConfigLoader,
    db,
    repositories::SessionRepository,
    server::run_server,
    telemetry::init_tracing,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "accountlink", version, about = "Social login account linking service")]
struct Cli {
    /// Directory holding the `.env*` files (defaults to the working directory)
    #[arg(long, global = true)]
    env_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Apply pending migrations before serving
        #[arg(long)]
        migrate: bool,
    },
    /// Apply pending database migrations and exit
    Migrate,
    /// Delete expired sessions and exit
    PurgeSessions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = match cli.env_dir {
        Some(dir) => ConfigLoader::with_base_dir(dir),
        None => ConfigLoader::new(),
    };
    let config = loader.load().context("loading configuration")?;

    init_tracing(&config).context("initializing telemetry")?;
    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let command = cli.command.unwrap_or(Command::Serve { migrate: false });

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;

    match command {
        Command::Migrate => db::run_migrations(&db).await,
        Command::PurgeSessions => {
            let purged = SessionRepository::new(Arc::new(db))
                .purge_expired()
                .await
                .context("purging expired sessions")?;
            tracing::info!(purged, "Expired sessions removed");
            Ok(())
        }
        Command::Serve { migrate } => {
            if migrate {
                db::run_migrations(&db).await?;
            }
            run_server(config, db).await
        }
    }
}
