// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process `ScheduleStore` backed by concurrent maps.
//!
//! Used for local development (`STORAGE_BACKEND=memory`) and tests. Each
//! row's status change happens under its map entry lock, which gives the
//! same compare-and-set guarantee as the Firestore transaction path.

use super::{matches_query, OccurrenceQuery, RuleFilter, ScheduleStore};
use crate::error::AppError;
use crate::models::{
    ClassTemplate, CoachProfile, OccurrenceStatus, RecurrenceRule, SessionOccurrence,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Collections {
    rules: DashMap<String, RecurrenceRule>,
    occurrences: DashMap<String, SessionOccurrence>,
    coaches: DashMap<String, CoachProfile>,
    templates: DashMap<String, ClassTemplate>,
}

/// Shared in-memory store. Clones share the same collections.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a coach profile (normally owned by the coach service).
    pub fn upsert_coach(&self, coach: CoachProfile) {
        self.inner.coaches.insert(coach.id.clone(), coach);
    }

    /// Seed a class template (normally owned by the class catalog).
    pub fn upsert_class_template(&self, template: ClassTemplate) {
        self.inner.templates.insert(template.id.clone(), template);
    }

    /// Overwrite an occurrence row as-is (fixtures and backfills from exports).
    pub fn put_occurrence(&self, occurrence: SessionOccurrence) {
        self.inner
            .occurrences
            .insert(occurrence.id.clone(), occurrence);
    }

    pub fn occurrence_count(&self) -> usize {
        self.inner.occurrences.len()
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn get_rule(&self, rule_id: &str) -> Result<Option<RecurrenceRule>, AppError> {
        Ok(self.inner.rules.get(rule_id).map(|r| r.value().clone()))
    }

    async fn put_rule(&self, rule: &RecurrenceRule) -> Result<(), AppError> {
        self.inner.rules.insert(rule.id.clone(), rule.clone());
        Ok(())
    }

    async fn delete_rule(&self, rule_id: &str) -> Result<bool, AppError> {
        Ok(self.inner.rules.remove(rule_id).is_some())
    }

    async fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<RecurrenceRule>, AppError> {
        let mut rules: Vec<RecurrenceRule> = self
            .inner
            .rules
            .iter()
            .filter(|r| filter.include_private || !r.is_private)
            .filter(|r| {
                filter
                    .owner_id
                    .as_deref()
                    .map_or(true, |owner| r.owner_id == owner)
            })
            .map(|r| r.value().clone())
            .collect();
        rules.sort_by(|a, b| a.anchor.cmp(&b.anchor).then_with(|| a.id.cmp(&b.id)));
        Ok(rules)
    }

    async fn insert_occurrences(
        &self,
        occurrences: &[SessionOccurrence],
    ) -> Result<usize, AppError> {
        let mut inserted = 0;
        for occurrence in occurrences {
            if let Entry::Vacant(slot) = self.inner.occurrences.entry(occurrence.id.clone()) {
                slot.insert(occurrence.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn get_occurrence(&self, id: &str) -> Result<Option<SessionOccurrence>, AppError> {
        Ok(self.inner.occurrences.get(id).map(|o| o.value().clone()))
    }

    async fn transition_occurrence(
        &self,
        id: &str,
        target: OccurrenceStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<OccurrenceStatus>, AppError> {
        if !target.is_terminal() {
            return Err(AppError::InvalidTransition(format!(
                "cannot move occurrence {id} to {}",
                target.as_str()
            )));
        }

        let Some(mut row) = self.inner.occurrences.get_mut(id) else {
            return Ok(None);
        };

        let previous = row.status;
        if previous.can_transition_to(target) {
            row.status = target;
            row.updated_at = at;
        }
        Ok(Some(previous))
    }

    async fn complete_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut modified = 0;
        for mut row in self.inner.occurrences.iter_mut() {
            if row.status == OccurrenceStatus::Pending && row.end < now {
                row.status = OccurrenceStatus::Completed;
                row.updated_at = now;
                modified += 1;
            }
        }
        Ok(modified)
    }

    async fn list_rule_occurrences(
        &self,
        rule_id: &str,
    ) -> Result<Vec<SessionOccurrence>, AppError> {
        let mut rows: Vec<SessionOccurrence> = self
            .inner
            .occurrences
            .iter()
            .filter(|o| o.rule_id.as_deref() == Some(rule_id))
            .map(|o| o.value().clone())
            .collect();
        rows.sort_by_key(|o| o.start);
        Ok(rows)
    }

    async fn delete_rule_occurrences(
        &self,
        rule_id: &str,
        from: DateTime<Utc>,
        pending_only: bool,
    ) -> Result<usize, AppError> {
        let mut deleted = 0;
        self.inner.occurrences.retain(|_, o| {
            let doomed = o.rule_id.as_deref() == Some(rule_id)
                && o.start >= from
                && (!pending_only || o.status == OccurrenceStatus::Pending);
            if doomed {
                deleted += 1;
            }
            !doomed
        });
        Ok(deleted)
    }

    async fn query_occurrences(
        &self,
        query: &OccurrenceQuery,
    ) -> Result<Vec<SessionOccurrence>, AppError> {
        let mut rows: Vec<SessionOccurrence> = self
            .inner
            .occurrences
            .iter()
            .filter(|o| matches_query(o.value(), query))
            .map(|o| o.value().clone())
            .collect();
        rows.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn coach_names(
        &self,
        owner_ids: &[String],
    ) -> Result<HashMap<String, String>, AppError> {
        Ok(owner_ids
            .iter()
            .filter_map(|id| {
                self.inner
                    .coaches
                    .get(id)
                    .map(|c| (id.clone(), c.display_name.clone()))
            })
            .collect())
    }

    async fn get_class_template(
        &self,
        template_id: &str,
    ) -> Result<Option<ClassTemplate>, AppError> {
        Ok(self
            .inner
            .templates
            .get(template_id)
            .map(|t| t.value().clone()))
    }
}
