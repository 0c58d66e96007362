// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, TimeZone, Utc};
use studio_sessions::config::Config;
use studio_sessions::db::{FirestoreDb, MemoryStore};
use studio_sessions::middleware::auth::create_jwt;
use studio_sessions::models::{ClassTemplate, CoachProfile};
use studio_sessions::routes::create_router;
use studio_sessions::services::{Materializer, ScheduleService};
use studio_sessions::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// UTC instant on the hour.
#[allow(dead_code)]
pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// In-memory store seeded with two coaches and one class template.
#[allow(dead_code)]
pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.upsert_coach(CoachProfile {
        id: "coach-a".to_string(),
        display_name: "Alex Rivera".to_string(),
    });
    store.upsert_coach(CoachProfile {
        id: "coach-b".to_string(),
        display_name: "Blake Chen".to_string(),
    });
    store.upsert_class_template(ClassTemplate {
        id: "tmpl-hiit".to_string(),
        title: "HIIT".to_string(),
        duration_minutes: 45,
    });
    store
}

/// Schedule service over a seeded in-memory store.
#[allow(dead_code)]
pub fn test_service() -> (ScheduleService, MemoryStore) {
    let store = seeded_store();
    let config = Config::test_default();
    let service = ScheduleService::new(
        Arc::new(store.clone()),
        Materializer::new(config.default_session_minutes, config.default_horizon_months),
    );
    (service, store)
}

/// Create a test app over a seeded in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(
        Config::test_default(),
        Arc::new(seeded_store()),
    ));
    (create_router(state.clone()), state)
}

/// Session JWT for `owner_id` signed with the test key.
#[allow(dead_code)]
pub fn create_test_jwt(owner_id: &str) -> String {
    create_jwt(owner_id, &Config::test_default().jwt_signing_key).unwrap()
}
