// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Window expansion: the instants a recurrence rule implies inside a window.
//!
//! Pure and side-effect free. Both materialization (persisted rows) and the
//! public preview (no writes) call [`expand`], so the two always agree on the
//! occurrence set for a given rule and window.
//!
//! Cost is one step per calendar day in `window ∩ [anchor, recurrence_end]`,
//! independent of how long the rule has been running.

use crate::models::{RecurrenceKind, RecurrenceRule};
use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Instants implied by `rule` within `[window_start, window_end]`, ascending.
///
/// Every instant carries the anchor's time-of-day, is `>= anchor`, is
/// `<= recurrence_end` when one is set, and never falls on a date listed in
/// `cancelled_exceptions`.
pub fn expand(
    rule: &RecurrenceRule,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    let lower = window_start.max(rule.anchor);
    let upper = rule
        .recurrence_end
        .map_or(window_end, |end| end.min(window_end));

    if lower > upper {
        return Vec::new();
    }

    if rule.recurrence_kind == RecurrenceKind::None {
        let inside = rule.anchor >= window_start && rule.anchor <= upper;
        return if inside && !is_excluded(rule, rule.anchor.date_naive()) {
            vec![rule.anchor]
        } else {
            Vec::new()
        };
    }

    let time_of_day = rule.anchor.time();
    let last_day = upper.date_naive();

    lower
        .date_naive()
        .iter_days()
        .take_while(|day| *day <= last_day)
        .filter(|day| matches_day(rule, *day) && !is_excluded(rule, *day))
        .map(|day| day.and_time(time_of_day).and_utc())
        .filter(|instant| *instant >= lower && *instant <= upper)
        .collect()
}

/// Whether `day` is a recurrence day for the rule, ignoring bounds.
fn matches_day(rule: &RecurrenceRule, day: NaiveDate) -> bool {
    let anchor_day = rule.anchor.date_naive();
    match rule.recurrence_kind {
        RecurrenceKind::None => day == anchor_day,
        RecurrenceKind::Daily => true,
        RecurrenceKind::Weekly if rule.selected_weekdays.is_empty() => {
            (day - anchor_day).num_days().rem_euclid(7) == 0
        }
        RecurrenceKind::Weekly => {
            let weekday = day.weekday().num_days_from_sunday() as u8;
            rule.selected_weekdays.contains(&weekday)
        }
        // Months without the anchor's day-of-month are skipped, not clamped.
        RecurrenceKind::Monthly => day.day() == anchor_day.day(),
    }
}

fn is_excluded(rule: &RecurrenceRule, day: NaiveDate) -> bool {
    rule.cancelled_exceptions.contains(&day)
}
