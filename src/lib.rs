// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Studio-Sessions: recurring session scheduling for a training facility
//!
//! This crate provides the backend API that turns coaches' recurrence rules
//! into concrete session occurrences, tracks their status, and answers
//! schedule queries for coaches and the public listing.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::ScheduleStore;
use services::{Materializer, ScheduleService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ScheduleStore>,
    pub schedule: ScheduleService,
}

impl AppState {
    /// Wire the schedule service to `store` using the configured defaults.
    pub fn new(config: Config, store: Arc<dyn ScheduleStore>) -> Self {
        let materializer =
            Materializer::new(config.default_session_minutes, config.default_horizon_months);
        let schedule = ScheduleService::new(store.clone(), materializer);
        Self {
            config,
            store,
            schedule,
        }
    }
}
