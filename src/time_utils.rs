// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Drop sub-second precision so stored instants compare the same way as
/// their second-precision string form.
pub fn truncate_to_seconds(date: DateTime<Utc>) -> DateTime<Utc> {
    date.with_nanosecond(0).unwrap_or(date)
}

/// Parse an RFC3339 query parameter into a UTC instant.
pub fn parse_utc_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Serde adapter storing instants as fixed-width RFC3339 strings.
///
/// Fixed width keeps lexicographic order equal to chronological order, which
/// Firestore range filters rely on.
pub mod rfc3339_secs {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_utc_rfc3339(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_utc_rfc3339(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid RFC3339 instant: {raw}")))
    }

    /// Optional variant.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            date: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => s.serialize_some(&super::super::format_utc_rfc3339(*date)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|raw| {
                    super::super::parse_utc_rfc3339(&raw).ok_or_else(|| {
                        serde::de::Error::custom(format!("invalid RFC3339 instant: {raw}"))
                    })
                })
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_uses_z_suffix() {
        let date = Utc.with_ymd_and_hms(2024, 8, 5, 10, 0, 0).unwrap();
        assert_eq!(format_utc_rfc3339(date), "2024-08-05T10:00:00Z");
    }

    #[test]
    fn test_parse_normalizes_offset() {
        let parsed = parse_utc_rfc3339("2024-08-05T12:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 8, 5, 10, 0, 0).unwrap());
        assert!(parse_utc_rfc3339("yesterday").is_none());
    }

    #[test]
    fn test_truncate_drops_nanos() {
        let date = Utc.timestamp_opt(1_722_852_000, 987_000_000).unwrap();
        assert_eq!(truncate_to_seconds(date).timestamp_subsec_nanos(), 0);
    }
}
