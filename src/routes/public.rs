// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Unauthenticated schedule listing.

use super::{parse_window, WindowParams};
use crate::error::Result;
use crate::models::OwnerSchedule;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/public/occurrences", get(list_public))
        .route("/public/preview", get(preview_public))
}

/// Materialized public occurrences grouped by coach.
async fn list_public(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Vec<OwnerSchedule>>> {
    let (start, end) = parse_window(&params)?;
    Ok(Json(state.schedule.list_public_occurrences(start, end).await?))
}

/// Public schedule computed from rules without materializing.
async fn preview_public(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Vec<OwnerSchedule>>> {
    let (start, end) = parse_window(&params)?;
    Ok(Json(
        state
            .schedule
            .preview_public_occurrences(start, end, Utc::now())
            .await?,
    ))
}
