//! Crashpoint Server Binary
//!
//! Runs the crash round engine behind a WebSocket API with an in-memory ledger.

use clap::Parser;
use crashpoint::{
    api::{AppState, GameServer, WsNotifier},
    config::ConfigLoader,
    games::{RoundEngine, SeededSource},
    storage::InMemoryLedger,
};
use std::{path::PathBuf, sync::Arc};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "crashpoint")]
#[command(about = "Crash game round server", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// Seed the crash point generator for reproducible sessions
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crashpoint=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut loader = ConfigLoader::new().with_server_overrides(args.host, args.port);
    if let Some(path) = &args.config {
        loader = loader.with_path(path);
    }
    let config = loader.load()?;

    info!(
        "Curve acceleration {}, max win {}x, edge factor {}",
        config.game.acceleration, config.game.max_win, config.game.edge_factor
    );
    info!("{} tasks configured", config.tasks.len());

    let ledger = Arc::new(InMemoryLedger::from_config(&config));
    let notifier = Arc::new(WsNotifier::new());

    let mut builder = RoundEngine::builder(config.game.clone())
        .with_ranking(config.ranking_table()?)
        .with_persistence(ledger.clone())
        .with_notifier(notifier.clone());
    if let Some(seed) = args.seed {
        info!("Using seeded crash points (seed {})", seed);
        builder = builder.with_uniform_source(Arc::new(SeededSource::new(seed)));
    }
    let engine = builder.build()?;

    let state = Arc::new(AppState {
        engine,
        notifier,
        ledger,
    });

    GameServer::new(config.server.clone(), state).run().await?;

    Ok(())
}
