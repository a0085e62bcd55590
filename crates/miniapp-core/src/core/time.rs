// crates/miniapp-core/src/core/time.rs
// ============================================================================
// Module: Miniapp Time Model
// Description: Timestamp representation for stored records.
// Purpose: Keep persisted times as plain unix milliseconds.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! All persisted timestamps are unix epoch milliseconds. The core never reads
//! the wall clock; stores stamp records when they write them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Unix epoch milliseconds.
///
/// # Invariants
/// - No validation is performed; ordering is a store responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixMillis(i64);

impl UnixMillis {
    /// Wraps a raw millisecond value.
    #[must_use]
    pub const fn new(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the raw millisecond value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}
