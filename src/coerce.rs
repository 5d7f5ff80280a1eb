//! Tolerant cell parsers.
//!
//! Coercion never fails: a cell that cannot be read becomes `0` (numbers) or
//! `Q1` (quarters). The `_checked` variants report whether the value was read
//! from the cell or defaulted, for diagnostics.

use crate::schema::Quarter;
use serde::{Deserialize, Serialize};

/// A raw table cell before coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    pub fn is_blank(&self) -> bool {
        match self {
            RawValue::Number(_) => false,
            RawValue::Text(s) => s.trim().is_empty(),
        }
    }

    fn to_text(&self) -> String {
        match self {
            RawValue::Number(n) => n.to_string(),
            RawValue::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoercionOrigin {
    /// Read from the cell.
    Parsed,
    /// The cell was absent or unreadable; the default was used.
    Defaulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coerced<T> {
    pub value: T,
    pub origin: CoercionOrigin,
}

impl<T> Coerced<T> {
    fn parsed(value: T) -> Self {
        Self {
            value,
            origin: CoercionOrigin::Parsed,
        }
    }

    fn defaulted(value: T) -> Self {
        Self {
            value,
            origin: CoercionOrigin::Defaulted,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        self.origin == CoercionOrigin::Defaulted
    }
}

/// Reads a currency-like cell such as `"Rp 1,500,000"` or `"(IDR) -2.5"`.
///
/// Every character other than digits, `.` and `-` is discarded and the longest
/// leading decimal of the remainder is taken. Dotted grouping is therefore not
/// understood: `"1.500.000"` reads as `1.5`.
pub fn coerce_currency_checked(value: Option<&RawValue>) -> Coerced<f64> {
    let text = match value {
        Some(RawValue::Number(n)) if n.is_finite() => return Coerced::parsed(*n),
        Some(RawValue::Number(_)) | None => return Coerced::defaulted(0.0),
        Some(RawValue::Text(s)) => s,
    };

    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    match parse_leading_decimal(&cleaned) {
        Some(n) if n.is_finite() => Coerced::parsed(n),
        _ => Coerced::defaulted(0.0),
    }
}

pub fn coerce_currency(value: Option<&RawValue>) -> f64 {
    coerce_currency_checked(value).value
}

/// Accepts `Q1`..`Q4` in any case; otherwise reads a leading integer and clamps
/// it into 1..=4. Unreadable input becomes `Q1`.
pub fn coerce_quarter_checked(value: Option<&RawValue>) -> Coerced<Quarter> {
    let text = match value {
        Some(v) => v.to_text().trim().to_uppercase(),
        None => return Coerced::defaulted(Quarter::Q1),
    };

    if let Some(digit) = text.strip_prefix('Q') {
        if let Ok(n @ 1..=4) = digit.parse::<i64>() {
            if digit.len() == 1 {
                return Coerced::parsed(Quarter::from_number(n));
            }
        }
    }

    match parse_leading_integer(&text) {
        Some(n) => Coerced::parsed(Quarter::from_number(n)),
        None => Coerced::defaulted(Quarter::Q1),
    }
}

pub fn coerce_quarter(value: Option<&RawValue>) -> Quarter {
    coerce_quarter_checked(value).value
}

/// Reads a leading integer year (`"2024"`, `" 2024.0"`); anything else is 0.
pub fn coerce_year_checked(value: Option<&RawValue>) -> Coerced<i32> {
    let parsed = match value {
        Some(RawValue::Number(n)) if n.is_finite() => Some(n.trunc() as i64),
        Some(RawValue::Number(_)) | None => None,
        Some(RawValue::Text(s)) => parse_leading_integer(s.trim()),
    };

    match parsed.and_then(|n| i32::try_from(n).ok()) {
        Some(year) if year != 0 => Coerced::parsed(year),
        _ => Coerced::defaulted(0),
    }
}

pub fn coerce_year(value: Option<&RawValue>) -> i32 {
    coerce_year_checked(value).value
}

/// Longest prefix of the form `-?digits[.digits]` containing at least one digit.
fn parse_leading_decimal(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if bytes.first() == Some(&b'-') {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return None;
    }

    s[..end].parse::<f64>().ok()
}

/// Leading `[+-]?digits`, ignoring anything after the digits. Runs too long
/// for `i64` saturate toward the sign.
fn parse_leading_integer(s: &str) -> Option<i64> {
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };

    let digits: &str = rest
        .find(|c: char| !c.is_ascii_digit())
        .map_or(rest, |idx| &rest[..idx]);

    if digits.is_empty() {
        return None;
    }
    match digits.parse::<i64>() {
        Ok(n) => Some(sign * n),
        Err(_) if sign < 0 => Some(i64::MIN),
        Err(_) => Some(i64::MAX),
    }
}
