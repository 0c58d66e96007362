// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task handler routes for scheduler callbacks.
//!
//! These endpoints are called by the external scheduler, not directly by
//! users. `require_tasks_auth` guards them in routes/mod.rs.

use crate::error::Result;
use crate::services::{BackfillReport, SweepReport};
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use std::sync::Arc;

/// Task handler routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/sweep-completed", post(sweep_completed))
        .route("/tasks/backfill-rules", post(backfill_rules))
}

/// Mark every pending occurrence that has ended as completed.
async fn sweep_completed(State(state): State<Arc<AppState>>) -> Result<Json<SweepReport>> {
    tracing::info!("Completion sweep triggered");
    Ok(Json(state.schedule.sweep_completed(Utc::now()).await?))
}

/// Re-materialize every rule up to its horizon.
async fn backfill_rules(State(state): State<Arc<AppState>>) -> Result<Json<BackfillReport>> {
    tracing::info!("Rule backfill triggered");
    Ok(Json(state.schedule.backfill_rules(Utc::now()).await?))
}
