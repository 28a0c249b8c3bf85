//! StudySync HTTP server
//!
//! Run with: studysync-server

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studysync::api::{router, AppState};
use studysync::storage::StoragePool;
use studysync::types::{StorageConfig, StorageMode};

#[derive(Parser, Debug)]
#[command(name = "studysync-server")]
#[command(about = "StudySync sync server")]
struct Args {
    /// Database path
    #[arg(long, env = "STUDYSYNC_DB_PATH", default_value = "data/studysync.db")]
    db_path: String,

    /// Storage mode (local or cloud-safe)
    #[arg(long, env = "STUDYSYNC_STORAGE_MODE", default_value = "local")]
    storage_mode: String,

    /// HTTP port
    #[arg(long, env = "STUDYSYNC_HTTP_PORT", default_value = "8080")]
    port: u16,

    /// Connection pool size
    #[arg(long, env = "STUDYSYNC_POOL_SIZE", default_value = "4")]
    pool_size: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studysync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let storage_mode: StorageMode = args
        .storage_mode
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let config = StorageConfig {
        db_path: args.db_path.clone(),
        storage_mode,
    };

    let pool = StoragePool::new(config, args.pool_size)
        .with_context(|| format!("opening database at {}", args.db_path))?;
    tracing::info!(db_path = %args.db_path, pool_size = args.pool_size, "storage ready");

    let state = AppState::new(Arc::new(pool));
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("sync server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
