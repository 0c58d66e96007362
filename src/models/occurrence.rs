// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session occurrence model for storage and API.

use crate::models::RecurrenceRule;
use crate::time_utils::rfc3339_secs;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Occurrence lifecycle. `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum OccurrenceStatus {
    Pending,
    Completed,
    Cancelled,
}

impl OccurrenceStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OccurrenceStatus::Pending)
    }

    /// Only `Pending` may move, and only to a terminal state.
    pub fn can_transition_to(self, next: OccurrenceStatus) -> bool {
        self == OccurrenceStatus::Pending && next.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OccurrenceStatus::Pending => "pending",
            OccurrenceStatus::Completed => "completed",
            OccurrenceStatus::Cancelled => "cancelled",
        }
    }
}

/// Stored occurrence (`session_occurrences` collection, keyed by `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOccurrence {
    /// Document ID; `{rule_id}_{start_epoch_secs}` for rule-generated rows
    pub id: String,
    /// Originating rule, absent for one-off bookings
    #[serde(default)]
    pub rule_id: Option<String>,
    pub owner_id: String,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(with = "rfc3339_secs")]
    pub start: DateTime<Utc>,
    #[serde(with = "rfc3339_secs")]
    pub end: DateTime<Utc>,
    pub status: OccurrenceStatus,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub intake_details: Option<serde_json::Value>,
    /// Participant IDs in booking order (group sessions)
    #[serde(default)]
    pub booked_by: Vec<String>,
    #[serde(with = "rfc3339_secs")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "rfc3339_secs")]
    pub updated_at: DateTime<Utc>,
}

impl SessionOccurrence {
    /// Deterministic ID making `(rule_id, start)` unique in storage.
    pub fn id_for(rule_id: &str, start: DateTime<Utc>) -> String {
        format!("{}_{}", rule_id, start.timestamp())
    }

    /// Snapshot the rule's fields into a new pending occurrence.
    pub fn from_rule(
        rule: &RecurrenceRule,
        start: DateTime<Utc>,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::id_for(&rule.id, start),
            rule_id: Some(rule.id.clone()),
            owner_id: rule.owner_id.clone(),
            template_id: rule.template_id.clone(),
            name: rule.name.clone(),
            start,
            end: start + duration,
            status: OccurrenceStatus::Pending,
            is_private: rule.is_private,
            capacity: rule.capacity,
            intake_details: rule.intake_details.clone(),
            booked_by: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.template_id.as_deref())
            .unwrap_or_default()
    }
}

/// Occurrence as returned to callers, enriched with the owner's display name.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct OccurrenceView {
    pub id: String,
    pub rule_id: Option<String>,
    pub owner_id: String,
    pub owner_name: String,
    pub label: String,
    pub template_id: Option<String>,
    #[serde(with = "rfc3339_secs")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start: DateTime<Utc>,
    #[serde(with = "rfc3339_secs")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub end: DateTime<Utc>,
    pub status: OccurrenceStatus,
    pub is_private: bool,
    pub capacity: Option<u32>,
    pub booked_count: u32,
    /// Only present on owner-facing views
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "binding-generation", ts(type = "unknown"))]
    pub intake_details: Option<serde_json::Value>,
}

impl OccurrenceView {
    pub fn from_occurrence(occurrence: &SessionOccurrence, owner_name: &str) -> Self {
        Self {
            id: occurrence.id.clone(),
            rule_id: occurrence.rule_id.clone(),
            owner_id: occurrence.owner_id.clone(),
            owner_name: owner_name.to_string(),
            label: occurrence.label().to_string(),
            template_id: occurrence.template_id.clone(),
            start: occurrence.start,
            end: occurrence.end,
            status: occurrence.status,
            is_private: occurrence.is_private,
            capacity: occurrence.capacity,
            booked_count: occurrence.booked_by.len() as u32,
            intake_details: occurrence.intake_details.clone(),
        }
    }

    /// Strip fields that must not leave the owner-facing API.
    pub fn into_public(mut self) -> Self {
        self.intake_details = None;
        self
    }
}

/// Public schedule for one coach.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct OwnerSchedule {
    pub owner_id: String,
    pub owner_name: String,
    pub occurrences: Vec<OccurrenceView>,
}
