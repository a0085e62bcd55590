// crates/miniapp-store-sqlite/src/error.rs
// ============================================================================
// Module: SQLite Store Errors
// Description: Error taxonomy for the SQLite backend.
// Purpose: Classify engine failures into typed, caller-actionable outcomes.
// Dependencies: miniapp-core, rusqlite, thiserror
// ============================================================================

//! ## Overview
//! Engine errors are classified once, at the statement that raised them, so
//! callers see `KeyAlreadyExists` or `UnknownOwner` instead of raw constraint
//! codes. `Schema` errors are fatal: startup must abort.

// ============================================================================
// SECTION: Imports
// ============================================================================

use miniapp_core::StoreError;
use miniapp_core::UserId;
use rusqlite::ErrorCode;
use rusqlite::ffi;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding bearer keys or HTML payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Connection pool error.
    #[error("sqlite store pool error: {0}")]
    Pool(String),
    /// Invalid configuration or stored data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Schema convergence failed and was rolled back.
    #[error("sqlite store schema error: {0}")]
    Schema(String),
    /// A user key collided with an existing user.
    #[error("sqlite store key already exists")]
    KeyAlreadyExists,
    /// An app write referenced a missing owner.
    #[error("sqlite store unknown owner: {0}")]
    UnknownOwner(UserId),
    /// No free placeholder admin key was found within the attempt bound.
    #[error("no free legacy admin key after {attempts} suffixed attempts")]
    AdminKeySpaceExhausted {
        /// Suffixed candidates tried after the base key.
        attempts: u32,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Db(message),
            SqliteStoreError::Pool(message) => Self::Pool(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::Schema(message) => Self::Schema(message),
            SqliteStoreError::KeyAlreadyExists => Self::KeyAlreadyExists,
            SqliteStoreError::UnknownOwner(owner) => Self::UnknownOwner(owner),
            SqliteStoreError::AdminKeySpaceExhausted {
                attempts,
            } => Self::Schema(format!("no free legacy admin key after {attempts} attempts")),
        }
    }
}

impl From<r2d2::Error> for SqliteStoreError {
    fn from(error: r2d2::Error) -> Self {
        Self::Pool(error.to_string())
    }
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Constraint family raised by a failed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConstraintKind {
    /// `UNIQUE` or `PRIMARY KEY` violation.
    Unique,
    /// `FOREIGN KEY` violation.
    ForeignKey,
}

/// Returns the constraint family for a constraint violation, if any.
pub(crate) fn constraint_kind(error: &rusqlite::Error) -> Option<ConstraintKind> {
    let rusqlite::Error::SqliteFailure(failure, _) = error else {
        return None;
    };
    if failure.code != ErrorCode::ConstraintViolation {
        return None;
    }
    match failure.extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
            Some(ConstraintKind::Unique)
        }
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(ConstraintKind::ForeignKey),
        _ => None,
    }
}

/// Maps a plain engine error.
#[allow(clippy::needless_pass_by_value, reason = "Used as a map_err function pointer.")]
pub(crate) fn db_error(error: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(error.to_string())
}
