//! # Epoch Normalization
//!
//! Browsers store visit times in one of three native epoch conventions. This module
//! converts raw column values into canonical UTC instants and back.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, Value, ValueRef};
use thiserror::Error;

/// Seconds between 1601-01-01T00:00:00Z and 1970-01-01T00:00:00Z.
const WEBKIT_UNIX_OFFSET_SECS: i64 = 11_644_473_600;
/// Seconds between 1970-01-01T00:00:00Z and 2001-01-01T00:00:00Z.
const COCOA_UNIX_OFFSET_SECS: i64 = 978_307_200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpochFamily {
    /// Microseconds since 1601-01-01 (WebKit / Windows FILETIME scaled).
    Chromium,
    /// Microseconds since the Unix epoch (PRTime).
    Mozilla,
    /// Seconds, possibly fractional, since 2001-01-01 (Cocoa reference date).
    Safari,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConversionError {
    #[error("timestamp is missing")]
    Missing,
    #[error("timestamp {0} is not positive")]
    NonPositive(String),
    #[error("timestamp {0} is not a finite number")]
    NotFinite(f64),
    #[error("timestamp {0} is out of range")]
    OutOfRange(String),
}

/// A timestamp column value exactly as SQLite returned it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawTimestamp {
    Integer(i64),
    Real(f64),
}

impl FromSql for RawTimestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(v) => Ok(RawTimestamp::Integer(v)),
            ValueRef::Real(v) => Ok(RawTimestamp::Real(v)),
            ValueRef::Text(text) => {
                let text = std::str::from_utf8(text).map_err(|e| FromSqlError::Other(Box::new(e)))?;
                let text = text.trim();
                if let Ok(v) = text.parse::<i64>() {
                    Ok(RawTimestamp::Integer(v))
                } else {
                    text.parse::<f64>()
                        .map(RawTimestamp::Real)
                        .map_err(|_| FromSqlError::InvalidType)
                }
            }
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

impl std::fmt::Display for RawTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawTimestamp::Integer(v) => write!(f, "{v}"),
            RawTimestamp::Real(v) => write!(f, "{v}"),
        }
    }
}

/// A cutoff instant expressed in a family's native units, ready to bind into a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeTime {
    Micros(i64),
    Seconds(f64),
}

impl NativeTime {
    pub fn to_sql_value(self) -> Value {
        match self {
            NativeTime::Micros(v) => Value::Integer(v),
            NativeTime::Seconds(v) => Value::Real(v),
        }
    }
}

impl EpochFamily {
    fn origin(self) -> DateTime<Utc> {
        match self {
            EpochFamily::Chromium => Utc.with_ymd_and_hms(1601, 1, 1, 0, 0, 0).single(),
            EpochFamily::Mozilla => Some(DateTime::UNIX_EPOCH),
            EpochFamily::Safari => Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).single(),
        }
        .unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Convert a raw native value into a UTC instant.
    pub fn normalize(self, raw: RawTimestamp) -> Result<DateTime<Utc>, ConversionError> {
        match self {
            EpochFamily::Chromium | EpochFamily::Mozilla => {
                let micros = integral_micros(raw)?;
                let delta = TimeDelta::microseconds(micros);
                self.origin()
                    .checked_add_signed(delta)
                    .ok_or_else(|| ConversionError::OutOfRange(raw.to_string()))
            }
            EpochFamily::Safari => {
                let seconds = match raw {
                    RawTimestamp::Integer(v) => v as f64,
                    RawTimestamp::Real(v) => v,
                };
                if !seconds.is_finite() {
                    return Err(ConversionError::NotFinite(seconds));
                }
                if seconds <= 0.0 {
                    return Err(ConversionError::NonPositive(raw.to_string()));
                }
                let whole = seconds.trunc();
                if whole > i64::MAX as f64 {
                    return Err(ConversionError::OutOfRange(raw.to_string()));
                }
                let nanos = ((seconds - whole) * 1_000_000_000.0).round() as i64;
                let delta = TimeDelta::try_seconds(whole as i64)
                    .and_then(|d| d.checked_add(&TimeDelta::nanoseconds(nanos)))
                    .ok_or_else(|| ConversionError::OutOfRange(raw.to_string()))?;
                self.origin()
                    .checked_add_signed(delta)
                    .ok_or_else(|| ConversionError::OutOfRange(raw.to_string()))
            }
        }
    }

    /// Convert an instant into this family's native units.
    pub fn to_native(self, instant: DateTime<Utc>) -> NativeTime {
        match self {
            EpochFamily::Chromium => {
                let secs = instant.timestamp().saturating_add(WEBKIT_UNIX_OFFSET_SECS);
                let micros = secs
                    .saturating_mul(1_000_000)
                    .saturating_add(i64::from(instant.timestamp_subsec_micros()));
                NativeTime::Micros(micros)
            }
            EpochFamily::Mozilla => NativeTime::Micros(instant.timestamp_micros()),
            EpochFamily::Safari => {
                let secs = instant.timestamp() - COCOA_UNIX_OFFSET_SECS;
                let frac = f64::from(instant.timestamp_subsec_micros()) / 1_000_000.0;
                NativeTime::Seconds(secs as f64 + frac)
            }
        }
    }
}

fn integral_micros(raw: RawTimestamp) -> Result<i64, ConversionError> {
    let micros = match raw {
        RawTimestamp::Integer(v) => v,
        RawTimestamp::Real(v) => {
            if !v.is_finite() {
                return Err(ConversionError::NotFinite(v));
            }
            if v >= i64::MAX as f64 {
                return Err(ConversionError::OutOfRange(raw.to_string()));
            }
            v.round() as i64
        }
    };
    if micros <= 0 {
        return Err(ConversionError::NonPositive(raw.to_string()));
    }
    Ok(micros)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).single().expect("valid date")
    }

    #[test]
    fn chromium_epoch_round_number() {
        let target = utc(2024, 1, 2, 10, 0, 0);
        let micros = (target - utc(1601, 1, 1, 0, 0, 0)).num_microseconds().expect("micros");
        assert_eq!(micros, 13_348_663_200_000_000);
        let got = EpochFamily::Chromium
            .normalize(RawTimestamp::Integer(micros))
            .expect("normalize");
        assert_eq!(got, target);
    }

    #[test]
    fn chromium_is_monotonic() {
        let samples = [1i64, 1_000_000, 13_000_000_000_000_000, 13_348_663_200_000_001];
        let mut prev = None;
        for raw in samples {
            let got = EpochFamily::Chromium.normalize(RawTimestamp::Integer(raw)).expect("ok");
            let again = EpochFamily::Chromium.normalize(RawTimestamp::Integer(raw)).expect("ok");
            assert_eq!(got, again);
            if let Some(p) = prev {
                assert!(got > p);
            }
            prev = Some(got);
        }
    }

    #[test]
    fn mozilla_is_unix_micros() {
        let got = EpochFamily::Mozilla
            .normalize(RawTimestamp::Integer(1_700_000_000_123_456))
            .expect("normalize");
        assert_eq!(got.timestamp(), 1_700_000_000);
        assert_eq!(got.timestamp_subsec_micros(), 123_456);
    }

    #[test]
    fn safari_reference_date() {
        let got = EpochFamily::Safari
            .normalize(RawTimestamp::Integer(726_000_000))
            .expect("normalize");
        assert_eq!(got, utc(2001, 1, 1, 0, 0, 0) + TimeDelta::seconds(726_000_000));
        assert_eq!(got, utc(2024, 1, 3, 18, 40, 0));
    }

    #[test]
    fn safari_fractional_seconds() {
        let got = EpochFamily::Safari
            .normalize(RawTimestamp::Real(726_000_000.5))
            .expect("normalize");
        assert_eq!(got.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn rejects_zero_negative_and_overflow() {
        for family in [EpochFamily::Chromium, EpochFamily::Mozilla, EpochFamily::Safari] {
            assert!(family.normalize(RawTimestamp::Integer(0)).is_err());
            assert!(family.normalize(RawTimestamp::Integer(-5)).is_err());
            assert!(family.normalize(RawTimestamp::Real(f64::NAN)).is_err());
        }
        assert!(EpochFamily::Safari.normalize(RawTimestamp::Real(1e300)).is_err());
        assert!(EpochFamily::Mozilla.normalize(RawTimestamp::Integer(i64::MAX)).is_err());
    }

    #[test]
    fn cutoff_round_trips_through_native_units() {
        let cutoff = utc(2025, 6, 1, 12, 30, 0);
        for family in [EpochFamily::Chromium, EpochFamily::Mozilla, EpochFamily::Safari] {
            let raw = match family.to_native(cutoff) {
                NativeTime::Micros(v) => RawTimestamp::Integer(v),
                NativeTime::Seconds(v) => RawTimestamp::Real(v),
            };
            assert_eq!(family.normalize(raw).expect("normalize"), cutoff);
        }
    }
}
