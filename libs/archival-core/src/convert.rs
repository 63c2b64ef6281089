//! Scalar conversion facility: turns a loaded [`crate::scope::Scalar`] into a
//! target Rust type under the active [`SerializationOptions`] policies, and
//! the reverse for save (spec §4.4, §4.5).

use crate::context::SerializationContext;
use crate::error::ArchiveError;
use crate::options::{MismatchedTypesPolicy, OverflowNumberPolicy, UtfEncodingErrorPolicy};
use crate::scope::Scalar;

/// Outcome of a policy-governed conversion: either the converted value, or a
/// signal that the caller should leave the target field untouched (only
/// possible under a `Skip` policy).
pub enum Converted<T> {
    Value(T),
    Skipped,
}

fn mismatched<T>(
    ctx: &mut SerializationContext,
    message: impl Into<String>,
) -> Result<Converted<T>, ArchiveError> {
    match ctx.options().mismatched_types_policy {
        MismatchedTypesPolicy::ThrowError => {
            Err(ArchiveError::mismatched_types(ctx.current_path(), message))
        }
        MismatchedTypesPolicy::Skip => Ok(Converted::Skipped),
    }
}

fn overflow<T>(
    ctx: &mut SerializationContext,
    message: impl Into<String>,
) -> Result<Converted<T>, ArchiveError> {
    match ctx.options().overflow_number_policy {
        OverflowNumberPolicy::ThrowError => Err(ArchiveError::overflow(ctx.current_path(), message)),
        OverflowNumberPolicy::Skip => Ok(Converted::Skipped),
    }
}

/// Parses a boolean the way the original accepts: case-insensitive
/// `true`/`false`, or the digits `1`/`0`; anything else is a mismatch.
pub fn to_bool(ctx: &mut SerializationContext, scalar: &Scalar) -> Result<Converted<bool>, ArchiveError> {
    match scalar {
        Scalar::Bool(b) => Ok(Converted::Value(*b)),
        Scalar::String(s) if s.eq_ignore_ascii_case("true") || s == "1" => Ok(Converted::Value(true)),
        Scalar::String(s) if s.eq_ignore_ascii_case("false") || s == "0" => Ok(Converted::Value(false)),
        Scalar::I64(1) | Scalar::U64(1) => Ok(Converted::Value(true)),
        Scalar::I64(0) | Scalar::U64(0) => Ok(Converted::Value(false)),
        other => mismatched(ctx, format!("expected bool, found {}", other.kind_name())),
    }
}

/// Digit-by-digit, overflow-checked parse of an integer scalar into `i64`.
///
/// Rejects input that merely *looks* like a float (contains `.`, `e`, or
/// `E`) rather than truncating it — a float-shaped string is a type
/// mismatch, never a silently truncated integer.
fn parse_integer(text: &str) -> Option<i64> {
    if text.is_empty() {
        return None;
    }
    if text.contains(['.', 'e', 'E']) {
        return None;
    }
    text.parse::<i64>().ok()
}

/// Converts any integer-kinded scalar to `i64`, then range-checks it down to
/// `T` via `TryFrom`, reporting overflow under the active policy.
pub fn to_signed<T>(ctx: &mut SerializationContext, scalar: &Scalar) -> Result<Converted<T>, ArchiveError>
where
    T: TryFrom<i64>,
{
    let wide = match scalar {
        // Loading a bool into an integer field is an accepted implicit
        // widening (spec open question), not a mismatched type.
        Scalar::Bool(b) => *b as i64,
        Scalar::I64(v) => *v,
        Scalar::U64(v) => match i64::try_from(*v) {
            Ok(v) => v,
            Err(_) => return overflow(ctx, format!("{v} does not fit in a signed 64-bit integer")),
        },
        Scalar::String(s) => match parse_integer(s) {
            Some(v) => v,
            None => return mismatched(ctx, format!("`{s}` is not an integer")),
        },
        other => return mismatched(ctx, format!("expected integer, found {}", other.kind_name())),
    };
    match T::try_from(wide) {
        Ok(v) => Ok(Converted::Value(v)),
        Err(_) => overflow(ctx, format!("{wide} does not fit in the target integer type")),
    }
}

/// Same as [`to_signed`] but for unsigned targets, rejecting negative input
/// as overflow rather than wrapping.
pub fn to_unsigned<T>(ctx: &mut SerializationContext, scalar: &Scalar) -> Result<Converted<T>, ArchiveError>
where
    T: TryFrom<u64>,
{
    let wide = match scalar {
        Scalar::Bool(b) => *b as u64,
        Scalar::U64(v) => *v,
        Scalar::I64(v) => match u64::try_from(*v) {
            Ok(v) => v,
            Err(_) => return overflow(ctx, format!("{v} is negative, cannot convert to an unsigned type")),
        },
        Scalar::String(s) => {
            if s.is_empty() || s.contains(['.', 'e', 'E', '-']) {
                return mismatched(ctx, format!("`{s}` is not an unsigned integer"));
            }
            match s.parse::<u64>() {
                Ok(v) => v,
                Err(_) => return mismatched(ctx, format!("`{s}` is not an unsigned integer")),
            }
        }
        other => return mismatched(ctx, format!("expected unsigned integer, found {}", other.kind_name())),
    };
    match T::try_from(wide) {
        Ok(v) => Ok(Converted::Value(v)),
        Err(_) => overflow(ctx, format!("{wide} does not fit in the target integer type")),
    }
}

pub fn to_f64(ctx: &mut SerializationContext, scalar: &Scalar) -> Result<Converted<f64>, ArchiveError> {
    match scalar {
        Scalar::F64(v) => Ok(Converted::Value(*v)),
        Scalar::I64(v) => Ok(Converted::Value(*v as f64)),
        Scalar::U64(v) => Ok(Converted::Value(*v as f64)),
        Scalar::String(s) => match s.parse::<f64>() {
            Ok(v) => Ok(Converted::Value(v)),
            Err(_) => mismatched(ctx, format!("`{s}` is not a number")),
        },
        other => mismatched(ctx, format!("expected a number, found {}", other.kind_name())),
    }
}

pub fn to_f32(ctx: &mut SerializationContext, scalar: &Scalar) -> Result<Converted<f32>, ArchiveError> {
    match to_f64(ctx, scalar)? {
        Converted::Value(v) => {
            if v.is_finite() && (v as f32) as f64 != v && v.abs() > f32::MAX as f64 {
                return overflow(ctx, format!("{v} does not fit in a 32-bit float"));
            }
            Ok(Converted::Value(v as f32))
        }
        Converted::Skipped => Ok(Converted::Skipped),
    }
}

/// String pass-through. Non-string scalars are stringified rather than
/// rejected — the original treats string targets as the universal sink.
pub fn to_string(scalar: &Scalar) -> String {
    match scalar {
        Scalar::String(s) => s.clone(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::I64(v) => v.to_string(),
        Scalar::U64(v) => v.to_string(),
        Scalar::F64(v) => v.to_string(),
        Scalar::Null => String::new(),
    }
}

/// Validates a byte slice as UTF-8 and repairs it per
/// [`UtfEncodingErrorPolicy`], returning the mark-substituted value.
pub fn repair_utf8(ctx: &mut SerializationContext, bytes: &[u8]) -> Result<Converted<String>, ArchiveError> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(Converted::Value(s.to_owned())),
        Err(err) => match ctx.options().utf_encoding_error_policy {
            UtfEncodingErrorPolicy::ThrowError => {
                Err(ArchiveError::utf_encoding(ctx.current_path(), err.to_string()))
            }
            UtfEncodingErrorPolicy::Skip => Ok(Converted::Skipped),
            UtfEncodingErrorPolicy::WriteErrorMark => {
                let mark = ctx.options().utf_error_mark;
                let valid_up_to = err.valid_up_to();
                let mut repaired = String::from_utf8_lossy(&bytes[..valid_up_to]).into_owned();
                repaired.push(mark);
                if valid_up_to < bytes.len() {
                    if let Ok(rest) = std::str::from_utf8(&bytes[valid_up_to + 1..]) {
                        repaired.push_str(rest);
                    }
                }
                Ok(Converted::Value(repaired))
            }
        },
    }
}

/// Renders an elapsed-time `Duration` as an ISO-8601 duration: `PT<secs>S`,
/// or `PT<secs>.<fraction>S` when there's a sub-second remainder, so a
/// `Duration::from_millis(500)` round-trips instead of truncating to zero.
pub fn duration_to_iso8601(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    let nanos = duration.subsec_nanos();
    if nanos == 0 {
        format!("PT{secs}S")
    } else {
        let frac = format!("{nanos:09}");
        let frac = frac.trim_end_matches('0');
        format!("PT{secs}.{frac}S")
    }
}

/// Inverse of [`duration_to_iso8601`]. Only the plain-seconds duration form
/// this crate emits is accepted; calendar-aware duration fields (`P1Y2M`)
/// aren't meaningful for a `Duration` and are a mismatch.
pub fn iso8601_to_duration(ctx: &mut SerializationContext, scalar: &Scalar) -> Result<Converted<std::time::Duration>, ArchiveError> {
    let Scalar::String(s) = scalar else {
        return mismatched(ctx, format!("expected an ISO-8601 duration string, found {}", scalar.kind_name()));
    };
    let parse_body = || -> Option<std::time::Duration> {
        let body = s.strip_prefix("PT")?.strip_suffix('S')?;
        match body.split_once('.') {
            Some((secs_str, frac_str)) => {
                let secs: u64 = secs_str.parse().ok()?;
                let mut frac = frac_str.to_owned();
                while frac.len() < 9 {
                    frac.push('0');
                }
                let nanos: u32 = frac.get(..9)?.parse().ok()?;
                Some(std::time::Duration::new(secs, nanos))
            }
            None => body.parse::<u64>().ok().map(std::time::Duration::from_secs),
        }
    };
    match parse_body() {
        Some(d) => Ok(Converted::Value(d)),
        None => mismatched(ctx, format!("`{s}` is not an ISO-8601 duration")),
    }
}

/// Renders a `SystemTime` as a calendar ISO-8601 timestamp with nanosecond
/// precision (`2024-01-15T10:30:00.500000000Z`), losslessly round-tripping
/// sub-second resolution rather than collapsing to whole seconds.
pub fn system_time_to_iso8601(time: std::time::SystemTime) -> String {
    chrono::DateTime::<chrono::Utc>::from(time).to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

/// Inverse of [`system_time_to_iso8601`]. Accepts any RFC 3339 timestamp
/// (a strict subset of ISO-8601), not just the exact form this crate emits,
/// since a document may have been produced by another ISO-8601 writer.
pub fn iso8601_to_system_time(ctx: &mut SerializationContext, scalar: &Scalar) -> Result<Converted<std::time::SystemTime>, ArchiveError> {
    let Scalar::String(s) = scalar else {
        return mismatched(ctx, format!("expected an ISO-8601 timestamp string, found {}", scalar.kind_name()));
    };
    match chrono::DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Ok(Converted::Value(dt.with_timezone(&chrono::Utc).into())),
        Err(err) => mismatched(ctx, format!("`{s}` is not an ISO-8601 timestamp: {err}")),
    }
}

/// Decodes a UTF-16 code unit sequence, substituting unpaired surrogates
/// per policy. Endianness is resolved by the caller via
/// [`crate::options::StreamEncoding`]; this operates on native-order `u16`s.
pub fn decode_utf16(ctx: &mut SerializationContext, units: &[u16]) -> Result<Converted<String>, ArchiveError> {
    match char::decode_utf16(units.iter().copied()).collect::<Result<String, _>>() {
        Ok(s) => Ok(Converted::Value(s)),
        Err(_) => match ctx.options().utf_encoding_error_policy {
            UtfEncodingErrorPolicy::ThrowError => {
                Err(ArchiveError::utf_encoding(ctx.current_path(), "unpaired UTF-16 surrogate"))
            }
            UtfEncodingErrorPolicy::Skip => Ok(Converted::Skipped),
            UtfEncodingErrorPolicy::WriteErrorMark => {
                let mark = ctx.options().utf_error_mark;
                let repaired: String = char::decode_utf16(units.iter().copied())
                    .map(|r| r.unwrap_or(mark))
                    .collect();
                Ok(Converted::Value(repaired))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::SerializationOptions;

    #[test]
    fn parses_integer_strings() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer("-7"), Some(-7));
        assert_eq!(parse_integer("4.2"), None);
        assert_eq!(parse_integer("4e2"), None);
        assert_eq!(parse_integer(""), None);
    }

    #[test]
    fn float_shaped_string_rejected_as_integer() {
        let options = SerializationOptions::default();
        let mut ctx = SerializationContext::new(&options);
        let result = to_signed::<i32>(&mut ctx, &Scalar::String("4.2".into()));
        assert!(matches!(result, Err(ArchiveError::MismatchedTypes { .. })));
    }

    #[test]
    fn overflow_on_narrow_target_throws_by_default() {
        let options = SerializationOptions::default();
        let mut ctx = SerializationContext::new(&options);
        let result = to_signed::<i8>(&mut ctx, &Scalar::I64(1000));
        assert!(matches!(result, Err(ArchiveError::Overflow { .. })));
    }

    #[test]
    fn overflow_skipped_under_skip_policy() {
        let options = SerializationOptions::builder()
            .overflow_number_policy(OverflowNumberPolicy::Skip)
            .build();
        let mut ctx = SerializationContext::new(&options);
        let result = to_signed::<i8>(&mut ctx, &Scalar::I64(1000)).unwrap();
        assert!(matches!(result, Converted::Skipped));
    }

    #[test]
    fn negative_to_unsigned_is_overflow_not_mismatch() {
        let options = SerializationOptions::default();
        let mut ctx = SerializationContext::new(&options);
        let result = to_unsigned::<u32>(&mut ctx, &Scalar::I64(-5));
        assert!(matches!(result, Err(ArchiveError::Overflow { .. })));
    }

    #[test]
    fn bool_widens_into_integer_field_without_error() {
        let options = SerializationOptions::default();
        let mut ctx = SerializationContext::new(&options);
        let result = to_signed::<i32>(&mut ctx, &Scalar::Bool(true)).unwrap();
        assert!(matches!(result, Converted::Value(1)));
        let result = to_unsigned::<u32>(&mut ctx, &Scalar::Bool(false)).unwrap();
        assert!(matches!(result, Converted::Value(0)));
    }

    #[test]
    fn bool_parses_case_insensitively_and_from_digits() {
        let options = SerializationOptions::default();
        let mut ctx = SerializationContext::new(&options);
        for text in ["TRUE", "True", "1"] {
            let result = to_bool(&mut ctx, &Scalar::String(text.to_owned())).unwrap();
            assert!(matches!(result, Converted::Value(true)), "{text} should parse as true");
        }
        for text in ["FALSE", "False", "0"] {
            let result = to_bool(&mut ctx, &Scalar::String(text.to_owned())).unwrap();
            assert!(matches!(result, Converted::Value(false)), "{text} should parse as false");
        }
        let result = to_bool(&mut ctx, &Scalar::String("yes".to_owned()));
        assert!(matches!(result, Err(ArchiveError::MismatchedTypes { .. })));
    }

    #[test]
    fn duration_iso8601_round_trips_sub_second_precision() {
        let options = SerializationOptions::default();
        let mut ctx = SerializationContext::new(&options);
        let d = std::time::Duration::from_millis(500);
        let text = duration_to_iso8601(d);
        assert_eq!(text, "PT0.5S");
        let result = iso8601_to_duration(&mut ctx, &Scalar::String(text)).unwrap();
        assert!(matches!(result, Converted::Value(v) if v == d));
    }

    #[test]
    fn duration_iso8601_whole_seconds_has_no_fraction() {
        assert_eq!(duration_to_iso8601(std::time::Duration::from_secs(90)), "PT90S");
    }

    #[test]
    fn system_time_iso8601_round_trips_nanosecond_precision() {
        let options = SerializationOptions::default();
        let mut ctx = SerializationContext::new(&options);
        let t = std::time::UNIX_EPOCH + std::time::Duration::new(1_700_000_000, 123_456_789);
        let text = system_time_to_iso8601(t);
        let result = iso8601_to_system_time(&mut ctx, &Scalar::String(text)).unwrap();
        assert!(matches!(result, Converted::Value(v) if v == t));
    }

    #[test]
    fn malformed_iso8601_duration_is_mismatched_types() {
        let options = SerializationOptions::default();
        let mut ctx = SerializationContext::new(&options);
        let result = iso8601_to_duration(&mut ctx, &Scalar::String("not a duration".to_owned()));
        assert!(matches!(result, Err(ArchiveError::MismatchedTypes { .. })));
    }

    #[test]
    fn invalid_utf8_write_error_mark() {
        let options = SerializationOptions::builder()
            .utf_encoding_error_policy(UtfEncodingErrorPolicy::WriteErrorMark)
            .build();
        let mut ctx = SerializationContext::new(&options);
        let bytes = [b'a', b'b', 0xff, b'c'];
        let result = repair_utf8(&mut ctx, &bytes).unwrap();
        match result {
            Converted::Value(s) => assert_eq!(s, format!("ab{}c", crate::options::DEFAULT_UTF_ERROR_MARK)),
            Converted::Skipped => panic!("expected a repaired value"),
        }
    }
}
