//!
//! Parser for record lifetimes and cache hints.
//!
//! Accepts durations such as `300s`, `1.5h` or `2h45m`.
//! Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`.
//!

use std::time::Duration;

/// Largest duration we accept, in nanoseconds. Anything above can't be
/// added to a wall clock timestamp without overflowing.
const MAX_NANOS: u128 = i64::MAX as u128;

/// Fraction digits beyond this are ignored.
const MAX_FRACTION_DIGITS: usize = 18;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("invalid duration {0:?}")]
    Invalid(String),
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },
    #[error("negative duration {0:?} is not supported")]
    Negative(String),
    #[error("duration {0:?} is out of range")]
    OutOfRange(String),
}

fn unit_nanos(unit: &str) -> Option<u128> {
    let nanos = match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 60 * 60 * 1_000_000_000,
        _ => return None,
    };
    Some(nanos)
}

fn split_digits(s: &str) -> (&str, &str) {
    let len = s.bytes().take_while(u8::is_ascii_digit).count();
    s.split_at(len)
}

/// Parse a duration string like `"24h"` or `"1h30m15.5s"`.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let invalid = || DurationError::Invalid(input.to_string());
    let out_of_range = || DurationError::OutOfRange(input.to_string());

    let (negative, mut s) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };

    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !s.is_empty() {
        let (whole, rest) = split_digits(s);
        s = rest;

        let mut fraction = "";
        if let Some(rest) = s.strip_prefix('.') {
            let (digits, rest) = split_digits(rest);
            fraction = digits;
            s = rest;
        } else if whole.is_empty() {
            return Err(invalid());
        }
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        let unit_len = s
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(s.len());
        if unit_len == 0 {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let (unit, rest) = s.split_at(unit_len);
        s = rest;
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| out_of_range())?
        };
        let mut value = whole.checked_mul(scale).ok_or_else(out_of_range)?;

        let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
        if !fraction.is_empty() {
            let numerator: u128 = fraction.parse().map_err(|_| invalid())?;
            let denominator = 10u128.pow(fraction.len() as u32);
            value += numerator * scale / denominator;
        }

        total = total.checked_add(value).ok_or_else(out_of_range)?;
        if total > MAX_NANOS {
            return Err(out_of_range());
        }
    }

    if negative && total != 0 {
        return Err(DurationError::Negative(input.to_string()));
    }

    Ok(Duration::from_nanos(total as u64))
}
