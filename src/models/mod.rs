// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod directory;
pub mod occurrence;
pub mod rule;

pub use directory::{ClassTemplate, CoachProfile};
pub use occurrence::{OccurrenceStatus, OccurrenceView, OwnerSchedule, SessionOccurrence};
pub use rule::{RecurrenceKind, RecurrenceRule, RuleSpec};
