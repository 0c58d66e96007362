// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Studio-Sessions API Server
//!
//! Materializes coaches' recurring sessions and serves the facility schedule.

use std::sync::Arc;
use std::time::Duration;
use studio_sessions::{
    config::{Config, StorageBackend},
    db::{FirestoreDb, MemoryStore, ScheduleStore},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        backend = ?config.storage_backend,
        "Starting Studio-Sessions API"
    );

    let store: Arc<dyn ScheduleStore> = match config.storage_backend {
        StorageBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let state = Arc::new(AppState::new(config.clone(), store));

    if config.sweep_interval_secs > 0 {
        spawn_sweeper(state.clone(), Duration::from_secs(config.sweep_interval_secs));
    }

    let app = studio_sessions::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Run the completion sweep periodically inside this process.
///
/// Failures are logged and retried on the next tick.
fn spawn_sweeper(state: Arc<AppState>, period: Duration) {
    tracing::info!(period_secs = period.as_secs(), "Starting in-process completion sweep");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = state.schedule.sweep_completed(chrono::Utc::now()).await {
                tracing::error!(error = %e, "Completion sweep failed");
            }
        }
    });
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("studio_sessions=debug".parse().expect("valid directive"))
                .add_directive("info".parse().expect("valid directive")),
        )
        .with(format)
        .init();
}
