// crates/miniapp-service/src/error.rs
// ============================================================================
// Module: Service Errors
// Description: Caller-facing error taxonomy for service operations.
// Purpose: Collapse auth, validation, and store failures into typed outcomes.
// Dependencies: miniapp-core, thiserror
// ============================================================================

//! ## Overview
//! [`ServiceError`] is what the routing layer maps to responses. Every
//! authentication or ownership failure becomes [`ServiceError::Forbidden`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use miniapp_core::StoreError;
use miniapp_core::ValidationError;
use thiserror::Error;

use crate::auth::AuthError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Service operation errors.
///
/// # Invariants
/// - Messages never embed bearer keys or HTML payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Unknown key, or a tenant acting outside its scope.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The requested app does not exist for that tenant.
    #[error("not found")]
    NotFound,
    /// Identity creation used a key that is already assigned.
    #[error("key already exists")]
    KeyAlreadyExists,
    /// Request input failed validation.
    #[error("invalid request: {0}")]
    Invalid(String),
    /// Backend failure.
    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::KeyAlreadyExists => Self::KeyAlreadyExists,
            StoreError::UnknownOwner(owner) => Self::Invalid(format!("unknown owner: {owner}")),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Store(store) => Self::from(store),
            denied @ (AuthError::Unauthenticated(_) | AuthError::Unauthorized(_)) => {
                Self::Forbidden(denied.to_string())
            }
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(error: ValidationError) -> Self {
        Self::Invalid(error.to_string())
    }
}
