// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - scheduling logic layer.

pub mod materialize;
pub mod recurrence;
pub mod schedule;

pub use materialize::{MaterializeOutcome, Materializer};
pub use recurrence::expand;
pub use schedule::{BackfillReport, CancelOutcome, RuleChange, ScheduleService, SweepReport};
