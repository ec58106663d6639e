//! ANPR simulator entry point.
//!
//! Wires the device engine, settings, realtime hub and web API
//! together, then serves both protocol transports from one listener.

use std::sync::Arc;

use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anpr_simulator::config_store::ConfigStore;
use anpr_simulator::data_store::DataStore;
use anpr_simulator::device::DeviceLogic;
use anpr_simulator::realtime_hub::RealtimeHub;
use anpr_simulator::state::{AppConfig, AppState};
use anpr_simulator::web_api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "anpr_simulator=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::default();
    let settings = Arc::new(ConfigStore::load(&config.config_path)?);

    let (store, mut events_rx) = DataStore::new();
    let store = Arc::new(store);
    let realtime = Arc::new(RealtimeHub::new());
    let device = Arc::new(DeviceLogic::new(settings.clone(), store.clone()));

    let state = AppState {
        config: config.clone(),
        settings: settings.clone(),
        store,
        device,
        realtime: realtime.clone(),
    };

    // Every logged device event fans out to subscribed WebSocket clients
    tokio::spawn(async move {
        while let Some(entry) = events_rx.recv().await {
            realtime.broadcast_entry(&entry).await;
        }
    });

    let mut app = web_api::create_router()
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    if let Some(static_dir) = &config.static_dir {
        tracing::info!(dir = %static_dir.display(), "Serving static UI");
        app = app.fallback_service(ServeDir::new(static_dir));
    }

    let port = match std::env::var("PORT") {
        Ok(raw) => raw.parse()?,
        Err(_) => settings.snapshot().await.http_port,
    };
    let addr = format!("{}:{}", config.host, port);

    tracing::info!(%addr, "ANPR simulator listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
