// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Recurrence rule model: a coach's recurring (or single) availability.

use crate::time_utils::{rfc3339_secs, truncate_to_seconds};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::{Validate, ValidationError};

/// How a rule repeats after its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceKind {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

/// Stored recurrence rule (`recurrence_rules` collection, keyed by `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    /// Rule ID (also used as document ID)
    pub id: String,
    /// Owning coach
    pub owner_id: String,
    /// Class template reference (one of template/name is always present)
    #[serde(default)]
    pub template_id: Option<String>,
    /// Free-form session name
    #[serde(default)]
    pub name: Option<String>,
    /// First occurrence; supplies the time-of-day for all later ones
    #[serde(with = "rfc3339_secs")]
    pub anchor: DateTime<Utc>,
    pub recurrence_kind: RecurrenceKind,
    /// Weekday numbers, 0 = Sunday .. 6 = Saturday (weekly rules only)
    #[serde(default)]
    pub selected_weekdays: BTreeSet<u8>,
    /// Inclusive upper bound on generated instants
    #[serde(default, with = "rfc3339_secs::option")]
    pub recurrence_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub capacity: Option<u32>,
    /// Opaque intake payload copied onto every occurrence
    #[serde(default)]
    pub intake_details: Option<serde_json::Value>,
    /// Dates excluded from generation
    #[serde(default)]
    pub cancelled_exceptions: BTreeSet<NaiveDate>,
    #[serde(with = "rfc3339_secs")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "rfc3339_secs")]
    pub updated_at: DateTime<Utc>,
}

impl RecurrenceRule {
    /// Build a new rule from a validated spec.
    pub fn from_spec(id: String, owner_id: &str, spec: RuleSpec, now: DateTime<Utc>) -> Self {
        let now = truncate_to_seconds(now);
        let mut rule = Self {
            id,
            owner_id: owner_id.to_string(),
            template_id: None,
            name: None,
            anchor: now,
            recurrence_kind: RecurrenceKind::None,
            selected_weekdays: BTreeSet::new(),
            recurrence_end: None,
            is_private: false,
            capacity: None,
            intake_details: None,
            cancelled_exceptions: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        };
        rule.apply_spec(spec, now);
        rule
    }

    /// Replace every owner-editable field with the values from `spec`.
    pub fn apply_spec(&mut self, spec: RuleSpec, now: DateTime<Utc>) {
        self.template_id = non_blank(spec.template_id);
        self.name = non_blank(spec.name);
        self.anchor = truncate_to_seconds(spec.anchor);
        self.recurrence_kind = spec.recurrence_kind;
        self.selected_weekdays = spec.selected_weekdays;
        self.recurrence_end = spec.recurrence_end.map(truncate_to_seconds);
        self.is_private = spec.is_private;
        self.capacity = spec.capacity;
        self.intake_details = spec.intake_details;
        self.cancelled_exceptions = spec.cancelled_exceptions;
        self.updated_at = truncate_to_seconds(now);
    }

    /// Display label: the free-form name, else the template reference.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.template_id.as_deref())
            .unwrap_or_default()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Owner-authored rule declaration, as accepted by create and update.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_rule_spec"))]
pub struct RuleSpec {
    #[serde(default)]
    #[validate(length(max = 64))]
    pub template_id: Option<String>,
    #[serde(default)]
    #[validate(length(max = 120))]
    pub name: Option<String>,
    pub anchor: DateTime<Utc>,
    #[serde(default)]
    pub recurrence_kind: RecurrenceKind,
    #[serde(default)]
    #[validate(custom(function = "validate_weekdays"))]
    pub selected_weekdays: BTreeSet<u8>,
    #[serde(default)]
    pub recurrence_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_private: bool,
    #[validate(range(min = 1, max = 500))]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub intake_details: Option<serde_json::Value>,
    #[serde(default)]
    pub cancelled_exceptions: BTreeSet<NaiveDate>,
}

impl RuleSpec {
    /// Minimal declaration with a name and anchor; everything else defaulted.
    pub fn named(name: &str, anchor: DateTime<Utc>, kind: RecurrenceKind) -> Self {
        Self {
            template_id: None,
            name: Some(name.to_string()),
            anchor,
            recurrence_kind: kind,
            selected_weekdays: BTreeSet::new(),
            recurrence_end: None,
            is_private: false,
            capacity: None,
            intake_details: None,
            cancelled_exceptions: BTreeSet::new(),
        }
    }
}

fn validate_weekdays(days: &BTreeSet<u8>) -> Result<(), ValidationError> {
    if days.iter().any(|&d| d > 6) {
        return Err(ValidationError::new("weekday_out_of_range")
            .with_message("selected_weekdays must be in 0..=6".into()));
    }
    Ok(())
}

fn validate_rule_spec(spec: &RuleSpec) -> Result<(), ValidationError> {
    let has_text = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    if !has_text(&spec.template_id) && !has_text(&spec.name) {
        return Err(ValidationError::new("missing_label")
            .with_message("either template_id or name must be provided".into()));
    }
    if let Some(end) = spec.recurrence_end {
        if end < spec.anchor {
            return Err(ValidationError::new("end_before_start")
                .with_message("recurrence_end must not precede anchor".into()));
        }
    }
    Ok(())
}
