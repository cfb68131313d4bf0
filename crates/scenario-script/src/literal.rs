//! Literal grammar of scenario scripts
//!
//! - integers: decimal, `0x` hex, or `-` signed decimal
//! - variable references: `$NAME`
//! - hex streams: pairs of hex digits, optional `0x`, whitespace ignored
//! - times: `now` or `seconds[.fraction]`, fraction up to microseconds
//! - time references: `this` or a negative message offset (`-1`, `-2`, ...)

use crate::error::{Error, Result};
use scenario_core::Value;
use std::time::Duration;

/// An integer/blob literal or a reference to another variable
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSpec {
    Literal(Value),
    Reference(String),
}

/// Where a message deadline is anchored, before resolution to a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRef {
    Itself,
    /// `n`-th previous message step
    Back(usize),
}

/// Parse an integer literal
pub fn parse_int(text: &str) -> Result<i64> {
    let text = text.trim();
    let invalid = || Error::InvalidLiteral(format!("not an integer: {:?}", text));
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16)
            .map(|v| v as i64)
            .map_err(|_| invalid());
    }
    if text.starts_with('-') {
        return text.parse::<i64>().map_err(|_| invalid());
    }
    text.parse::<u64>().map(|v| v as i64).map_err(|_| invalid())
}

/// Parse a hex stream into bytes
pub fn parse_hex_stream(text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    let digits: String = text
        .strip_prefix("0x")
        .unwrap_or(text)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    hex::decode(&digits).map_err(|e| Error::InvalidLiteral(format!("hex stream {:?}: {}", text, e)))
}

/// Parse `$NAME`, returning the name
pub fn parse_reference(text: &str) -> Option<&str> {
    text.trim()
        .strip_prefix('$')
        .filter(|name| !name.is_empty())
}

/// Parse the value of a `Var`/`SetVar` step
///
/// Exactly one of `value`, `ascii`, `hex` must be given.
pub fn parse_value_spec(
    value: Option<&str>,
    ascii: Option<&str>,
    hex: Option<&str>,
) -> Result<ValueSpec> {
    match (value, ascii, hex) {
        (Some(value), None, None) => match parse_reference(value) {
            Some(name) => Ok(ValueSpec::Reference(name.to_string())),
            None => Ok(ValueSpec::Literal(Value::Int(parse_int(value)?))),
        },
        (None, Some(ascii), None) => Ok(ValueSpec::Literal(Value::Ascii(ascii.to_string()))),
        (None, None, Some(hex)) => Ok(ValueSpec::Literal(Value::Bytes(parse_hex_stream(hex)?))),
        (None, None, None) => Err(Error::MissingField("value, ascii or hex".into())),
        _ => Err(Error::InvalidSchema(
            "only one of value, ascii or hex may be given".into(),
        )),
    }
}

/// Parse a delay: `now` or `seconds[.fraction]`
pub fn parse_time(text: &str) -> Result<Duration> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("now") {
        return Ok(Duration::ZERO);
    }
    let invalid = || Error::InvalidLiteral(format!("not a time: {:?}", text));
    let (secs, frac) = match text.split_once('.') {
        Some((secs, frac)) => (secs, frac),
        None => (text, ""),
    };
    if frac.len() > 6 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let secs: u64 = secs.parse().map_err(|_| invalid())?;
    let micros: u64 = if frac.is_empty() {
        0
    } else {
        // "5" means 500000 microseconds
        format!("{:0<6}", frac).parse().map_err(|_| invalid())?
    };
    Duration::from_secs(secs)
        .checked_add(Duration::from_micros(micros))
        .ok_or_else(invalid)
}

/// Parse a time reference: `this` or `-N`
pub fn parse_time_ref(text: &str) -> Result<TimeRef> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("this") {
        return Ok(TimeRef::Itself);
    }
    match text.strip_prefix('-').map(str::parse::<usize>) {
        Some(Ok(n)) if n > 0 => Ok(TimeRef::Back(n)),
        _ => Err(Error::InvalidLiteral(format!(
            "time_ref must be \"this\" or a negative offset, got {:?}",
            text
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_forms() {
        assert_eq!(parse_int("42").unwrap(), 42);
        assert_eq!(parse_int(" 0x1F ").unwrap(), 31);
        assert_eq!(parse_int("-7").unwrap(), -7);
        assert_eq!(parse_int("0xFFFFFFFFFFFFFFFF").unwrap(), -1);
        assert!(parse_int("12abc").is_err());
        assert!(parse_int("").is_err());
    }

    #[test]
    fn test_parse_hex_stream() {
        assert_eq!(parse_hex_stream("0a0b ff").unwrap(), vec![0x0a, 0x0b, 0xff]);
        assert_eq!(parse_hex_stream("0x0102").unwrap(), vec![1, 2]);
        assert!(parse_hex_stream("abc").is_err());
        assert!(parse_hex_stream("zz").is_err());
    }

    #[test]
    fn test_parse_value_spec() {
        assert_eq!(
            parse_value_spec(Some("$Y"), None, None).unwrap(),
            ValueSpec::Reference("Y".into())
        );
        assert_eq!(
            parse_value_spec(None, Some("001010000000001"), None).unwrap(),
            ValueSpec::Literal(Value::Ascii("001010000000001".into()))
        );
        assert!(matches!(
            parse_value_spec(None, None, None),
            Err(Error::MissingField(_))
        ));
        assert!(matches!(
            parse_value_spec(Some("1"), Some("a"), None),
            Err(Error::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_parse_time_pads_fraction() {
        assert_eq!(parse_time("now").unwrap(), Duration::ZERO);
        assert_eq!(parse_time("2.5").unwrap(), Duration::from_millis(2500));
        assert_eq!(parse_time("0.000001").unwrap(), Duration::from_micros(1));
        assert_eq!(parse_time("10").unwrap(), Duration::from_secs(10));
        assert!(parse_time("1.0000001").is_err());
        assert!(parse_time("soon").is_err());
        assert!(parse_time("1.-5").is_err());
        assert!(parse_time("18446744073709551616").is_err());
        assert_eq!(
            parse_time("18446744073709551615.999999").unwrap(),
            Duration::from_secs(u64::MAX) + Duration::from_micros(999_999)
        );
    }

    #[test]
    fn test_parse_time_ref() {
        assert_eq!(parse_time_ref("this").unwrap(), TimeRef::Itself);
        assert_eq!(parse_time_ref("-1").unwrap(), TimeRef::Back(1));
        assert_eq!(parse_time_ref("-3").unwrap(), TimeRef::Back(3));
        assert!(parse_time_ref("-0").is_err());
        assert!(parse_time_ref("2").is_err());
    }
}
