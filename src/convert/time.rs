//! TIME pseudo type and durations.
//!
//! Wire shape (must match byte-for-byte on encode):
//!
//! ```json
//! {"$reql_type$": "TIME", "epoch_time": 1700000000.123, "timezone": "+01:00"}
//! ```
//!
//! Decoding accepts `Z`, `±HH:MM`, `±HHMM` and `±HH` timezones; encoding
//! always writes `±HH:MM`. Durations travel as a plain Number of seconds.

use super::{datum_mismatch, value_mismatch, DatumConverter, DatumConverterFactory};
use crate::error::{Error, Result};
use crate::native::{Type, Value};
use crate::reql::{Datum, PSEUDO_TIME, REQL_TYPE_KEY};
use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use std::sync::Arc;

/// Format a UTC offset as `±HH:MM`.
pub fn format_timezone(offset: &FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.abs() / 60;
    format!("{}{:02}:{:02}", sign, minutes / 60, minutes % 60)
}

/// Parse `Z`, `±HH:MM`, `±HHMM` or `±HH`.
pub fn parse_timezone(tz: &str) -> Result<FixedOffset> {
    let invalid = || Error::InvalidArgument(format!("Invalid timezone {:?}", tz));
    if tz == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match tz.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => return Err(invalid()),
    };
    let digits: String = match rest.len() {
        5 if rest.as_bytes()[2] == b':' => rest.replace(':', ""),
        4 => rest.to_string(),
        2 => format!("{}00", rest),
        _ => return Err(invalid()),
    };
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if minutes >= 60 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Encode an instant as a TIME object.
pub fn time_to_datum(instant: &DateTime<FixedOffset>, millis: bool) -> Datum {
    let epoch_time = if millis {
        instant.timestamp_millis() as f64 / 1000.0
    } else {
        instant.timestamp() as f64 + instant.timestamp_subsec_nanos() as f64 / 1e9
    };
    Datum::object([
        (REQL_TYPE_KEY, Datum::from(PSEUDO_TIME)),
        ("epoch_time", Datum::Number(epoch_time)),
        ("timezone", Datum::String(format_timezone(instant.offset()))),
    ])
}

/// Decode a TIME object, keeping its timezone.
pub fn datum_to_time(datum: &Datum, ty: &Type, millis: bool) -> Result<DateTime<FixedOffset>> {
    if datum.reql_type() != Some(PSEUDO_TIME) {
        return Err(datum_mismatch(ty, "PTYPE<TIME>", datum));
    }
    let epoch_time = datum
        .get("epoch_time")
        .and_then(Datum::as_number)
        .ok_or_else(|| Error::mismatch("TIME with numeric epoch_time", datum.to_string()))?;
    let offset = match datum.get("timezone") {
        Some(Datum::String(tz)) => parse_timezone(tz)?,
        None => parse_timezone("Z")?,
        Some(other) => return Err(Error::mismatch("STRING timezone", other.type_name())),
    };

    let out_of_range = || Error::InvalidArgument(format!("epoch_time {} out of range", epoch_time));
    if !epoch_time.is_finite() {
        return Err(out_of_range());
    }
    let utc = if millis {
        DateTime::<Utc>::from_timestamp_millis((epoch_time * 1000.0).round() as i64)
    } else {
        let secs = epoch_time.floor();
        let nanos = ((epoch_time - secs) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::<Utc>::from_timestamp(secs as i64, nanos)
    }
    .ok_or_else(out_of_range)?;
    Ok(utc.with_timezone(&offset))
}

#[derive(Debug)]
pub struct DateTimeDatumConverter {
    ty: Type,
    millis: bool,
}

impl DatumConverter for DateTimeDatumConverter {
    fn native_type(&self) -> &Type {
        &self.ty
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        let instant = match (&self.ty, value) {
            (Type::DateTime, Value::DateTime(dt)) => dt.fixed_offset(),
            (Type::DateTimeOffset, Value::DateTimeOffset(dt)) => *dt,
            (_, other) => return Err(value_mismatch(&self.ty, other)),
        };
        Ok(time_to_datum(&instant, self.millis))
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        let instant = datum_to_time(datum, &self.ty, self.millis)?;
        match self.ty {
            Type::DateTime => Ok(Value::DateTime(instant.with_timezone(&Utc))),
            _ => Ok(Value::DateTimeOffset(instant)),
        }
    }
}

/// `TimeDelta` as a Number of seconds.
#[derive(Debug)]
pub struct DurationDatumConverter;

impl DatumConverter for DurationDatumConverter {
    fn native_type(&self) -> &Type {
        static TYPE: Type = Type::Duration;
        &TYPE
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        match value {
            Value::Duration(delta) => Ok(Datum::Number(duration_seconds(delta))),
            other => Err(value_mismatch(&Type::Duration, other)),
        }
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        match datum {
            Datum::Number(seconds) => seconds_to_duration(*seconds).map(Value::Duration),
            other => Err(datum_mismatch(&Type::Duration, "NUMBER", other)),
        }
    }
}

pub fn duration_seconds(delta: &TimeDelta) -> f64 {
    delta.num_seconds() as f64 + delta.subsec_nanos() as f64 / 1e9
}

pub fn seconds_to_duration(seconds: f64) -> Result<TimeDelta> {
    let micros = (seconds * 1e6).round();
    if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
        return Err(Error::RangeOrPrecision {
            value: seconds,
            target: Type::Duration.to_string(),
            violation: crate::error::RangeViolation::OutOfRange,
        });
    }
    Ok(TimeDelta::microseconds(micros as i64))
}

/// Handles `DateTime<Utc>`, `DateTime<FixedOffset>` and `TimeDelta`.
#[derive(Debug)]
pub struct TimeDatumConverterFactory {
    millis: bool,
}

impl TimeDatumConverterFactory {
    pub fn new(millis: bool) -> Self {
        Self { millis }
    }
}

impl Default for TimeDatumConverterFactory {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DatumConverterFactory for TimeDatumConverterFactory {
    fn try_get(
        &self,
        ty: &Type,
        _root: &Arc<dyn DatumConverterFactory>,
    ) -> Result<Option<Arc<dyn DatumConverter>>> {
        match ty {
            Type::DateTime | Type::DateTimeOffset => Ok(Some(Arc::new(DateTimeDatumConverter {
                ty: ty.clone(),
                millis: self.millis,
            }))),
            Type::Duration => Ok(Some(Arc::new(DurationDatumConverter))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn offset_converter() -> DateTimeDatumConverter {
        DateTimeDatumConverter {
            ty: Type::DateTimeOffset,
            millis: true,
        }
    }

    fn time(epoch: f64, tz: &str) -> Datum {
        Datum::object([
            (REQL_TYPE_KEY, Datum::from(PSEUDO_TIME)),
            ("epoch_time", Datum::Number(epoch)),
            ("timezone", Datum::from(tz)),
        ])
    }

    #[test]
    fn test_timezone_variants() {
        for (tz, seconds) in [
            ("Z", 0),
            ("+00:00", 0),
            ("+05:30", 19_800),
            ("-0800", -28_800),
            ("+02", 7_200),
            ("-03:45", -13_500),
        ] {
            assert_eq!(parse_timezone(tz).unwrap().local_minus_utc(), seconds, "{}", tz);
        }
        for bad in ["", "05:00", "+5", "+05:75", "+ab:cd", "UTC"] {
            assert!(parse_timezone(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_z_timezone_reencodes_canonically() {
        let converter = offset_converter();
        let value = converter.from_datum(&time(1_500_000_000.5, "Z")).unwrap();
        assert_eq!(
            converter.to_datum(&value).unwrap(),
            time(1_500_000_000.5, "+00:00")
        );
    }

    #[test]
    fn test_encode_exact_shape() {
        let instant = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
            .unwrap();
        let datum = offset_converter()
            .to_datum(&Value::DateTimeOffset(instant))
            .unwrap();
        assert_eq!(
            serde_json::to_string(&datum).unwrap(),
            r#"{"$reql_type$":"TIME","epoch_time":1704161045,"timezone":"+01:00"}"#
        );
    }

    #[test]
    fn test_utc_converter_normalises_offset() {
        let converter = DateTimeDatumConverter {
            ty: Type::DateTime,
            millis: true,
        };
        let value = converter.from_datum(&time(0.0, "-05:00")).unwrap();
        assert_eq!(value, Value::DateTime(Utc.timestamp_opt(0, 0).unwrap()));
        assert_eq!(converter.to_datum(&value).unwrap(), time(0.0, "+00:00"));
    }

    #[test]
    fn test_time_rejects_plain_objects() {
        let plain = Datum::object([("epoch_time", Datum::Number(0.0))]);
        assert!(matches!(
            offset_converter().from_datum(&plain),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            offset_converter().from_datum(&Datum::Null),
            Err(Error::NullNotAllowed(_))
        ));
    }

    #[test]
    fn test_duration_seconds() {
        let delta = TimeDelta::milliseconds(90_500);
        let datum = DurationDatumConverter.to_datum(&Value::Duration(delta)).unwrap();
        assert_eq!(datum, Datum::Number(90.5));
        assert_eq!(
            DurationDatumConverter.from_datum(&datum).unwrap(),
            Value::Duration(delta)
        );
    }
}
