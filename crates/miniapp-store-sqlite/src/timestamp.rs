// crates/miniapp-store-sqlite/src/timestamp.rs
// ============================================================================
// Module: Stored Timestamps
// Description: Clock access and tolerant decoding of stored timestamps.
// Purpose: Read unix-millisecond columns alongside legacy text timestamps.
// Dependencies: miniapp-core, rusqlite, time
// ============================================================================

//! ## Overview
//! New rows store timestamps as unix milliseconds. Databases written by the
//! single-tenant deployment may still hold `YYYY-MM-DD HH:MM:SS[.ffffff]`
//! text in user rows; those decode as UTC. `NULL` decodes as the epoch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use miniapp_core::UnixMillis;
use rusqlite::Row;
use rusqlite::types::Type;
use rusqlite::types::ValueRef;
use time::PrimitiveDateTime;
use time::macros::format_description;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Returns the current unix timestamp in milliseconds.
pub(crate) fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Text timestamp that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized timestamp text")]
struct TimestampParseError;

/// Decodes a timestamp column that may hold millis, legacy text, or `NULL`.
pub(crate) fn timestamp_column(row: &Row<'_>, index: usize) -> rusqlite::Result<UnixMillis> {
    match row.get_ref(index)? {
        ValueRef::Null => Ok(UnixMillis::new(0)),
        ValueRef::Integer(millis) => Ok(UnixMillis::new(millis)),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(parse_legacy_timestamp)
            .map(UnixMillis::new)
            .ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    index,
                    Type::Text,
                    Box::new(TimestampParseError),
                )
            }),
        ValueRef::Real(_) => Err(rusqlite::Error::InvalidColumnType(
            index,
            "timestamp".to_string(),
            Type::Real,
        )),
        ValueRef::Blob(_) => Err(rusqlite::Error::InvalidColumnType(
            index,
            "timestamp".to_string(),
            Type::Blob,
        )),
    }
}

/// Parses `YYYY-MM-DD[ T]HH:MM:SS[.fraction]` as UTC milliseconds.
#[must_use]
pub fn parse_legacy_timestamp(raw: &str) -> Option<i64> {
    let normalized = raw.trim().replacen('T', " ", 1);
    let (base, fraction) = match normalized.split_once('.') {
        Some((base, fraction)) => (base, Some(fraction)),
        None => (normalized.as_str(), None),
    };
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let parsed = PrimitiveDateTime::parse(base, &format).ok()?;
    let seconds = parsed.assume_utc().unix_timestamp();
    let millis = match fraction {
        Some(digits) => fraction_millis(digits)?,
        None => 0,
    };
    seconds.checked_mul(1_000)?.checked_add(millis)
}

/// Converts a fractional-seconds digit string to whole milliseconds.
fn fraction_millis(digits: &str) -> Option<i64> {
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let mut millis = 0_i64;
    for position in 0 .. 3 {
        let digit = digits.as_bytes().get(position).map_or(0, |byte| i64::from(byte - b'0'));
        millis = millis * 10 + digit;
    }
    Some(millis)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
