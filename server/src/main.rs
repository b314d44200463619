use anyhow::{Context, Result};
use askboard_core::cache::{CacheStore, MemoryCache};
use askboard_core::config::Settings;
use askboard_core::store::SledStore;
use askboard_server::{build_app, build_scheduler};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Primary store directory (defaults to ASKBOARD_DB_PATH)
    #[arg(long)]
    db: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();
    let settings = Settings::from_env()?;

    let db_path = args.db.unwrap_or_else(|| settings.db_path.clone());
    let store = SledStore::open(&db_path).with_context(|| format!("opening store at {}", db_path.display()))?;
    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let scheduler = build_scheduler(&settings, Arc::new(store), cache.clone());

    for (job, result) in scheduler.run_once().await {
        if let Err(e) = result {
            tracing::warn!(job, error = %e, "initial ranking failed; waiting for the next tick");
        }
    }
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let jobs = scheduler.spawn(shutdown_rx);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, db = %db_path.display(), "server listening");
    axum::serve(listener, build_app(cache))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    shutdown_tx.send(true).ok();
    for job in jobs {
        job.await.ok();
    }
    tracing::info!("scheduler stopped");
    Ok(())
}
