//! Timestamp wire format.
//!
//! Every timestamp that crosses the store or queue boundary is written as
//! RFC 3339 UTC with exactly three fractional digits and a `Z` suffix, e.g.
//! `2026-03-01T09:30:00.000Z`. Fixed width means string comparison inside the
//! document store orders the same way as the instants do.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::error::{CoreError, Result};

/// Render `ts` in the fixed-width wire format.
pub fn format(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse any RFC 3339 timestamp and normalise it to UTC.
pub fn parse(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Drop sub-millisecond precision so an in-memory value equals its decoded copy.
pub fn truncate(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(3)
}

/// `#[serde(with = "timefmt::millis")]` adapter.
pub mod millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let frac = whole + chrono::Duration::milliseconds(500);
        assert_eq!(format(&whole), "2026-03-01T09:30:00.000Z");
        assert_eq!(format(&frac), "2026-03-01T09:30:00.500Z");
        assert!(format(&whole) < format(&frac));
    }

    #[test]
    fn parse_normalises_offsets() {
        let parsed = parse("2026-03-01T10:30:00+01:00").unwrap();
        assert_eq!(format(&parsed), "2026-03-01T09:30:00.000Z");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse("yesterday").is_err());
    }

    #[test]
    fn truncate_survives_round_trip() {
        let now = truncate(Utc::now());
        assert_eq!(parse(&format(&now)).unwrap(), now);
    }
}
