use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;
mod share;
mod store;
mod upload;

use config::Config;
use dbus_interface::{AppState, EyecapService};
use share::OutboxSharer;
use store::CaptureStore;
use upload::LocalUploader;

const BUS_NAME: &str = "org.eyecap.Eyecap1";
const OBJECT_PATH: &str = "/org/eyecap/Eyecap1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("eyecapd starting");

    let config = Config::load().context("failed to load configuration")?;
    tracing::info!(
        save_dir = %config.save_dir.display(),
        db_path = %config.db_path.display(),
        outbox_dir = %config.outbox_dir.display(),
        session_bus = config.session_bus,
        "configuration loaded"
    );

    let store = CaptureStore::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open database {}", config.db_path.display()))?;
    let engine = engine::spawn_engine(config.session.clone())?;

    let uploader = LocalUploader::new(config.save_dir.clone(), store.clone());
    let sharer = OutboxSharer::new(
        config.save_dir.clone(),
        config.outbox_dir.clone(),
        store.clone(),
    );

    let session_bus = config.session_bus;
    let service = EyecapService {
        state: Arc::new(AppState {
            config,
            engine,
            store,
            uploader,
            sharer,
        }),
    };

    let builder = if session_bus {
        zbus::connection::Builder::session()?
    } else {
        zbus::connection::Builder::system()?
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .with_context(|| format!("failed to acquire {BUS_NAME}"))?;

    tracing::info!(bus = if session_bus { "session" } else { "system" }, "eyecapd ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("eyecapd shutting down");

    Ok(())
}
