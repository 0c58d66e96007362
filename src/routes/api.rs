// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated coaches.

use super::{parse_window, WindowParams};
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{OccurrenceView, RuleSpec};
use crate::services::{CancelOutcome, RuleChange};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/rules", post(create_rule))
        .route("/api/rules/{id}", put(update_rule).delete(delete_rule))
        .route("/api/rules/{id}/occurrences", get(list_rule_occurrences))
        .route("/api/rules/{id}/cancel-date", post(cancel_rule_date))
        .route("/api/occurrences", get(list_my_occurrences))
        .route("/api/occurrences/{id}/cancel", post(cancel_occurrence))
}

// ─── Rules ───────────────────────────────────────────────────

async fn create_rule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(spec): Json<RuleSpec>,
) -> Result<(StatusCode, Json<RuleChange>)> {
    let change = state
        .schedule
        .create_rule(&user.owner_id, spec, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(change)))
}

async fn update_rule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(rule_id): Path<String>,
    Json(spec): Json<RuleSpec>,
) -> Result<Json<RuleChange>> {
    let change = state
        .schedule
        .update_rule(&user.owner_id, &rule_id, spec, Utc::now())
        .await?;
    Ok(Json(change))
}

/// Response for rule deletion.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteRuleResponse {
    pub rule_id: String,
    pub occurrences_removed: usize,
}

async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(rule_id): Path<String>,
) -> Result<Json<DeleteRuleResponse>> {
    let occurrences_removed = state
        .schedule
        .delete_rule(&user.owner_id, &rule_id, Utc::now())
        .await?;
    Ok(Json(DeleteRuleResponse {
        rule_id,
        occurrences_removed,
    }))
}

async fn list_rule_occurrences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(rule_id): Path<String>,
) -> Result<Json<Vec<OccurrenceView>>> {
    let views = state
        .schedule
        .list_rule_occurrences(&user.owner_id, &rule_id)
        .await?;
    Ok(Json(views))
}

#[derive(Debug, Deserialize)]
pub struct CancelDateRequest {
    /// Calendar date (UTC) to exclude, `YYYY-MM-DD`
    pub date: NaiveDate,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CancelDateResponse {
    pub rule_id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub date: NaiveDate,
    pub occurrences_cancelled: usize,
}

async fn cancel_rule_date(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(rule_id): Path<String>,
    Json(request): Json<CancelDateRequest>,
) -> Result<Json<CancelDateResponse>> {
    let occurrences_cancelled = state
        .schedule
        .cancel_rule_instance(&user.owner_id, &rule_id, request.date, Utc::now())
        .await?;
    Ok(Json(CancelDateResponse {
        rule_id,
        date: request.date,
        occurrences_cancelled,
    }))
}

// ─── Occurrences ─────────────────────────────────────────────

/// The caller's own occurrences, private ones and intake details included.
async fn list_my_occurrences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Vec<OccurrenceView>>> {
    let (start, end) = parse_window(&params)?;
    let views = state
        .schedule
        .list_occurrences_for_owner(&user.owner_id, start, end)
        .await?;
    Ok(Json(views))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CancelResponse {
    pub id: String,
    /// `cancelled` or `already_cancelled`
    pub outcome: String,
}

async fn cancel_occurrence(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(occurrence_id): Path<String>,
) -> Result<Json<CancelResponse>> {
    let outcome = state
        .schedule
        .cancel_occurrence(&user.owner_id, &occurrence_id, Utc::now())
        .await?;
    let outcome = match outcome {
        CancelOutcome::Cancelled => "cancelled",
        CancelOutcome::AlreadyCancelled => "already_cancelled",
    };
    Ok(Json(CancelResponse {
        id: occurrence_id,
        outcome: outcome.to_string(),
    }))
}
