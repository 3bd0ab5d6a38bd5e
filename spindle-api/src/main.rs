//! spindle-api - Record catalog and ordering service
//!
//! HTTP service over a SQLite catalog: record CRUD with MusicBrainz
//! enrichment, paged search, and transactional order placement.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use spindle_api::{build_router, AppState};
use spindle_common::config::Config;
use spindle_common::db::init_database;
use spindle_api::services::MusicBrainzClient;

#[derive(Debug, Parser)]
#[command(name = "spindle-api", about = "Record catalog and ordering service")]
struct Args {
    /// Root folder holding spindle.db (overrides SPINDLE_ROOT)
    #[arg(long)]
    root_folder: Option<String>,

    /// HTTP listen port (overrides SPINDLE_PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting Spindle (spindle-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = Config::resolve(args.root_folder.as_deref(), args.port)?;
    config.ensure_root_folder()?;

    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Connected to database");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let mb = Arc::new(
        MusicBrainzClient::new(config.mbrainz_url.clone())
            .map_err(|e| anyhow::anyhow!("Failed to create MusicBrainz client: {}", e))?,
    );
    info!("MusicBrainz base URL: {}", config.mbrainz_url);

    // Create application state and router
    let state = AppState::new(pool, mb);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", config.port)).await?;
    info!("spindle-api listening on http://127.0.0.1:{}", config.port);
    info!("Health check: http://127.0.0.1:{}/health", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
