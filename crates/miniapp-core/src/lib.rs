// crates/miniapp-core/src/lib.rs
// ============================================================================
// Module: Miniapp Core Library
// Description: Public API surface for the Miniapp Host core.
// Purpose: Expose tenant, app, and usage types plus backend-agnostic store interfaces.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Miniapp core defines the tenant identity model, the per-tenant app records,
//! the append-only usage log, and the interfaces a storage backend implements.
//! It performs no I/O; backends such as `miniapp-store-sqlite` supply the
//! persistence and the service layer supplies authorization.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AccessLog;
pub use interfaces::AppStore;
pub use interfaces::IdentityStore;
pub use interfaces::StoreError;
