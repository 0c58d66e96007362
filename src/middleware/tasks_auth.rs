// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared-secret authentication for scheduler-triggered `/tasks/*` routes.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Require `Authorization: Bearer <TASKS_SHARED_SECRET>`.
///
/// A missing header is 401; a wrong secret is 403.
pub async fn require_tasks_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(presented) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    else {
        tracing::warn!(path = %request.uri().path(), "Blocked tasks request without bearer token");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let expected = state.config.tasks_shared_secret.as_bytes();
    let matches: bool = presented.trim().as_bytes().ct_eq(expected).into();
    if expected.is_empty() || !matches {
        tracing::warn!(path = %request.uri().path(), "Blocked tasks request with invalid secret");
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}
