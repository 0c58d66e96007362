// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-only records owned by the coach and class catalog services.

use serde::{Deserialize, Serialize};

/// Coach identity (`coaches` collection, keyed by `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachProfile {
    pub id: String,
    pub display_name: String,
}

/// Class template (`class_templates` collection, keyed by `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassTemplate {
    pub id: String,
    pub title: String,
    /// Session length in minutes
    pub duration_minutes: u32,
}
