use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use hydro_common::{ControlSettings, ControllerConfig, LiveStatus};

use crate::control::ControlLoop;
use crate::hardware::SimulatedHardware;
use crate::http::{self, AppState};
use crate::store::{SettingsStore, TelemetryStore};

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ControllerConfig::default();

    let data_dir = std::env::var("HYDRO_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.hydro"));
    let settings = SettingsStore::new(&data_dir);
    let telemetry = TelemetryStore::new(&data_dir);

    settings
        .seed_defaults(&ControlSettings::default_map(&config.channels))
        .await
        .context("seed settings store defaults")?;
    info!("settings store ready at {}", data_dir.display());

    // GPIO-backed hardware plugs in here on the Pi; everywhere else the
    // simulation keeps the loop and dashboard exercisable.
    let hardware = SimulatedHardware::new();

    let (status_tx, status_rx) = watch::channel(LiveStatus::default());
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let control = ControlLoop::new(
        config.clone(),
        settings.clone(),
        telemetry.clone(),
        hardware,
        status_tx,
    );
    let loop_handle = tokio::spawn(control.run(cancel_rx));

    let app = http::router(AppState {
        config,
        settings,
        telemetry,
        status: status_rx,
    });

    let port = std::env::var("HYDRO_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind dashboard server at {addr}"))?;

    info!("dashboard listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Relays are driven OFF by the loop's own teardown before it exits.
    let _ = cancel_tx.send(true);
    let _ = loop_handle.await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
