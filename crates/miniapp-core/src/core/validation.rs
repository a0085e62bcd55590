// crates/miniapp-core/src/core/validation.rs
// ============================================================================
// Module: Input Validation
// Description: Size and character limits for tenant-supplied inputs.
// Purpose: Reject oversized or malformed inputs before they reach storage.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! [`InputLimits`] bounds slugs, keys, comments, and HTML payloads. Callers
//! validate at trust boundaries; stores assume validated input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::AppSlug;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum slug length in bytes.
pub const DEFAULT_MAX_SLUG_LENGTH: usize = 128;
/// Default maximum HTML payload size in bytes.
pub const DEFAULT_MAX_HTML_BYTES: usize = 1024 * 1024;
/// Default maximum bearer key length in bytes.
pub const DEFAULT_MAX_KEY_LENGTH: usize = 256;
/// Default maximum comment length in bytes.
pub const DEFAULT_MAX_COMMENT_LENGTH: usize = 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Input validation failures.
///
/// # Invariants
/// - Messages never embed the rejected value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was empty.
    #[error("{0} must be non-empty")]
    Empty(&'static str),
    /// A field exceeded its size limit.
    #[error("{field} exceeds limit: {actual} bytes (max {max})")]
    TooLong {
        /// Field label.
        field: &'static str,
        /// Configured maximum.
        max: usize,
        /// Observed size.
        actual: usize,
    },
    /// A field contained a disallowed character.
    #[error("{0} contains invalid characters")]
    InvalidCharacters(&'static str),
}

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Limits applied to tenant-supplied inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputLimits {
    /// Maximum slug length in bytes.
    pub max_slug_length: usize,
    /// Maximum HTML payload size in bytes.
    pub max_html_bytes: usize,
    /// Maximum bearer key length in bytes.
    pub max_key_length: usize,
    /// Maximum comment length in bytes.
    pub max_comment_length: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_slug_length: DEFAULT_MAX_SLUG_LENGTH,
            max_html_bytes: DEFAULT_MAX_HTML_BYTES,
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
            max_comment_length: DEFAULT_MAX_COMMENT_LENGTH,
        }
    }
}

impl InputLimits {
    /// Validates a slug: non-empty, bounded, `[A-Za-z0-9._-]` only.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the slug is rejected.
    pub fn slug(&self, raw: &str) -> Result<AppSlug, ValidationError> {
        ensure_bounded("slug", raw, self.max_slug_length)?;
        if !raw.bytes().all(is_slug_byte) {
            return Err(ValidationError::InvalidCharacters("slug"));
        }
        Ok(AppSlug::new(raw))
    }

    /// Validates a slug naming an existing app: non-empty and bounded only.
    ///
    /// Migrated rows may carry slugs outside the write charset; reads and
    /// deletes must still reach them.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the slug is empty or too long.
    pub fn lookup_slug(&self, raw: &str) -> Result<AppSlug, ValidationError> {
        ensure_bounded("slug", raw, self.max_slug_length)?;
        Ok(AppSlug::new(raw))
    }

    /// Validates a bearer key: non-empty, bounded, no whitespace or control bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the key is rejected.
    pub fn key(&self, raw: &str) -> Result<(), ValidationError> {
        ensure_bounded("key", raw, self.max_key_length)?;
        if raw.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
            return Err(ValidationError::InvalidCharacters("key"));
        }
        Ok(())
    }

    /// Validates an optional comment length.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the comment is too long.
    pub fn comment(&self, raw: Option<&str>) -> Result<(), ValidationError> {
        let Some(value) = raw else {
            return Ok(());
        };
        if value.len() > self.max_comment_length {
            return Err(ValidationError::TooLong {
                field: "comment",
                max: self.max_comment_length,
                actual: value.len(),
            });
        }
        Ok(())
    }

    /// Validates an HTML payload size. Empty payloads are allowed.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the payload is too large.
    pub const fn html(&self, raw: &str) -> Result<(), ValidationError> {
        if raw.len() > self.max_html_bytes {
            return Err(ValidationError::TooLong {
                field: "html",
                max: self.max_html_bytes,
                actual: raw.len(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects empty or oversized values.
const fn ensure_bounded(field: &'static str, raw: &str, max: usize) -> Result<(), ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if raw.len() > max {
        return Err(ValidationError::TooLong {
            field,
            max,
            actual: raw.len(),
        });
    }
    Ok(())
}

/// Returns true for bytes permitted in slugs.
const fn is_slug_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.')
}
