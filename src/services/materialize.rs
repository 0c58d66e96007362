// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Materialization engine: persist the occurrences a rule implies.

use crate::db::ScheduleStore;
use crate::error::Result;
use crate::models::{RecurrenceKind, RecurrenceRule, SessionOccurrence};
use crate::services::recurrence::expand;
use chrono::{DateTime, Duration, Months, Utc};

/// Result of materializing one rule.
#[derive(Debug, Clone, Default)]
pub struct MaterializeOutcome {
    /// Every occurrence the rule implies over the horizon, ascending.
    pub occurrences: Vec<SessionOccurrence>,
    /// How many of those were new rows (the rest already existed).
    pub inserted: usize,
}

/// Turns rules into stored occurrences over a horizon.
#[derive(Debug, Clone)]
pub struct Materializer {
    default_duration: Duration,
    default_horizon: Months,
}

impl Materializer {
    pub fn new(default_session_minutes: u32, default_horizon_months: u32) -> Self {
        Self {
            default_duration: Duration::minutes(i64::from(default_session_minutes)),
            default_horizon: Months::new(default_horizon_months),
        }
    }

    /// `recurrence_end`, or the default lookahead from `now`.
    pub fn horizon(&self, rule: &RecurrenceRule, now: DateTime<Utc>) -> DateTime<Utc> {
        rule.recurrence_end.unwrap_or_else(|| {
            now.checked_add_months(self.default_horizon)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        })
    }

    /// Occurrences implied by `rule` from `from` up to the horizon. No I/O.
    ///
    /// Single (`None`) rules yield exactly their anchor regardless of the
    /// horizon, unless the anchor date is excluded or precedes `from`.
    pub fn plan(
        &self,
        rule: &RecurrenceRule,
        duration: Duration,
        from: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Vec<SessionOccurrence> {
        let window_end = match rule.recurrence_kind {
            RecurrenceKind::None => rule.anchor,
            _ => self.horizon(rule, now),
        };

        expand(rule, from.max(rule.anchor), window_end)
            .into_iter()
            .map(|start| SessionOccurrence::from_rule(rule, start, duration, now))
            .collect()
    }

    /// Materialize the rule's whole lifetime up to the horizon.
    pub async fn materialize(
        &self,
        store: &dyn ScheduleStore,
        rule: &RecurrenceRule,
        now: DateTime<Utc>,
    ) -> Result<MaterializeOutcome> {
        self.materialize_from(store, rule, rule.anchor, now).await
    }

    /// Materialize occurrences starting at or after `from`.
    ///
    /// Inserts skip `(rule_id, start)` pairs that already exist, so running
    /// this again for the same rule never duplicates rows.
    pub async fn materialize_from(
        &self,
        store: &dyn ScheduleStore,
        rule: &RecurrenceRule,
        from: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<MaterializeOutcome> {
        let duration = self.duration_for(store, rule).await?;
        let occurrences = self.plan(rule, duration, from, now);
        let inserted = store.insert_occurrences(&occurrences).await?;

        tracing::info!(
            rule_id = %rule.id,
            owner_id = %rule.owner_id,
            planned = occurrences.len(),
            inserted,
            "Materialized rule"
        );

        Ok(MaterializeOutcome {
            occurrences,
            inserted,
        })
    }

    /// Session length: the class template's duration when known, else the default.
    pub async fn duration_for(
        &self,
        store: &dyn ScheduleStore,
        rule: &RecurrenceRule,
    ) -> Result<Duration> {
        let Some(template_id) = rule.template_id.as_deref() else {
            return Ok(self.default_duration);
        };

        let duration = match store.get_class_template(template_id).await? {
            Some(template) if template.duration_minutes > 0 => {
                Duration::minutes(i64::from(template.duration_minutes))
            }
            Some(_) => self.default_duration,
            None => {
                tracing::debug!(template_id, "Class template not found, using default duration");
                self.default_duration
            }
        };
        Ok(duration)
    }
}
