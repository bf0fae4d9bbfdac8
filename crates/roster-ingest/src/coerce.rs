//! Raw row → [`Record`] coercion
//!
//! Coercion never fails. Missing columns default (`id = 0`, empty text),
//! over-long text is cut to [`MAX_TEXT_LEN`] characters, NUL characters are
//! dropped (PostgreSQL text cannot hold them), and an `id` that does not start
//! with an integer becomes `0`. A malformed row therefore never aborts a run.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use crate::record::{Record, MAX_TEXT_LEN};

/// A parsed row, addressable by column name
pub trait RawRow {
    fn get(&self, field: &str) -> Option<Cow<'_, str>>;
}

impl RawRow for HashMap<String, String> {
    fn get(&self, field: &str) -> Option<Cow<'_, str>> {
        HashMap::get(self, field).map(|v| Cow::Borrowed(v.as_str()))
    }
}

impl RawRow for BTreeMap<String, String> {
    fn get(&self, field: &str) -> Option<Cow<'_, str>> {
        BTreeMap::get(self, field).map(|v| Cow::Borrowed(v.as_str()))
    }
}

/// Normalize one raw row
pub fn coerce<R: RawRow + ?Sized>(row: &R) -> Record {
    Record {
        id: row.get("id").map(|v| parse_leading_int(&v)).unwrap_or(0),
        firstname: text(row, "firstname"),
        lastname: text(row, "lastname"),
        email: text(row, "email"),
        email2: text(row, "email2"),
        profession: text(row, "profession"),
    }
}

fn text<R: RawRow + ?Sized>(row: &R, field: &str) -> String {
    row.get(field).map(|v| cap(&v)).unwrap_or_default()
}

/// Drop NUL characters and truncate to at most [`MAX_TEXT_LEN`] characters
pub fn cap(value: &str) -> String {
    if !value.contains('\0') {
        if let Some((end, _)) = value.char_indices().nth(MAX_TEXT_LEN) {
            return value[..end].to_string();
        }
        return value.to_string();
    }
    value
        .chars()
        .filter(|&c| c != '\0')
        .take(MAX_TEXT_LEN)
        .collect()
}

/// Parse the leading integer of `value`
///
/// Surrounding whitespace and a single sign are accepted, parsing stops at
/// the first non-digit (`"42abc"` is 42, `"3.9"` is 3). No digits, or a value
/// outside the `i64` range, yields 0.
pub fn parse_leading_int(value: &str) -> i64 {
    let trimmed = value.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_end = rest
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return 0;
    }

    let digits = &rest[..digits_end];
    let parsed = if negative {
        format!("-{digits}").parse::<i64>()
    } else {
        digits.parse::<i64>()
    };
    parsed.unwrap_or(0)
}
