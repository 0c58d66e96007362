// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer: the `ScheduleStore` seam and its backends.

pub mod firestore;
pub mod memory;

pub use self::firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{ClassTemplate, OccurrenceStatus, RecurrenceRule, SessionOccurrence};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Collection names as constants.
pub mod collections {
    pub const RECURRENCE_RULES: &str = "recurrence_rules";
    pub const SESSION_OCCURRENCES: &str = "session_occurrences";
    /// Owned by the coach profile service; read here for display names
    pub const COACHES: &str = "coaches";
    /// Owned by the class catalog; read here for durations
    pub const CLASS_TEMPLATES: &str = "class_templates";
}

/// Filter for listing rules.
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    pub owner_id: Option<String>,
    pub include_private: bool,
}

/// Range query over occurrences. Matches rows with `start` in `[start, end]`.
#[derive(Debug, Clone)]
pub struct OccurrenceQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub owner_id: Option<String>,
    pub include_private: bool,
    pub include_cancelled: bool,
}

/// Persistence for rules and occurrences plus the read-only directory lookups.
///
/// Occurrence status changes go through [`ScheduleStore::transition_occurrence`],
/// which must be an atomic compare-and-set from `Pending`: concurrent sweeps
/// and cancellations on the same row must never both apply.
#[async_trait]
pub trait ScheduleStore: Send + Sync + 'static {
    // ─── Rules ───────────────────────────────────────────────────

    async fn get_rule(&self, rule_id: &str) -> Result<Option<RecurrenceRule>, AppError>;

    /// Create or replace a rule.
    async fn put_rule(&self, rule: &RecurrenceRule) -> Result<(), AppError>;

    /// Returns `true` if a rule was removed.
    async fn delete_rule(&self, rule_id: &str) -> Result<bool, AppError>;

    async fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<RecurrenceRule>, AppError>;

    // ─── Occurrences ─────────────────────────────────────────────

    /// Insert occurrences whose ID is not already stored; existing rows are
    /// left untouched. Returns the number inserted.
    async fn insert_occurrences(&self, occurrences: &[SessionOccurrence])
        -> Result<usize, AppError>;

    async fn get_occurrence(&self, id: &str) -> Result<Option<SessionOccurrence>, AppError>;

    /// Atomically move a `Pending` row to `target`.
    ///
    /// Returns the status observed before the write (`Pending` means the
    /// transition applied), or `None` if the row does not exist.
    async fn transition_occurrence(
        &self,
        id: &str,
        target: OccurrenceStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<OccurrenceStatus>, AppError>;

    /// Complete every pending row with `end < now`. Returns rows changed.
    async fn complete_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;

    /// All occurrences of a rule, ascending by start.
    async fn list_rule_occurrences(
        &self,
        rule_id: &str,
    ) -> Result<Vec<SessionOccurrence>, AppError>;

    /// Delete a rule's occurrences with `start >= from`, optionally only pending ones.
    async fn delete_rule_occurrences(
        &self,
        rule_id: &str,
        from: DateTime<Utc>,
        pending_only: bool,
    ) -> Result<usize, AppError>;

    /// Range query, ascending by start.
    async fn query_occurrences(
        &self,
        query: &OccurrenceQuery,
    ) -> Result<Vec<SessionOccurrence>, AppError>;

    // ─── Directory (read-only) ───────────────────────────────────

    /// Display names for the given coach IDs; unknown IDs are omitted.
    async fn coach_names(&self, owner_ids: &[String])
        -> Result<HashMap<String, String>, AppError>;

    async fn get_class_template(
        &self,
        template_id: &str,
    ) -> Result<Option<ClassTemplate>, AppError>;
}

/// Shared predicate used by backends that filter in memory.
pub(crate) fn matches_query(occurrence: &SessionOccurrence, query: &OccurrenceQuery) -> bool {
    occurrence.start >= query.start
        && occurrence.start <= query.end
        && (query.include_cancelled || occurrence.status != OccurrenceStatus::Cancelled)
        && (query.include_private || !occurrence.is_private)
        && query
            .owner_id
            .as_deref()
            .map_or(true, |owner| occurrence.owner_id == owner)
}
