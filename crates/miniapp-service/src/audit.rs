// crates/miniapp-service/src/audit.rs
// ============================================================================
// Module: Service Audit Logging
// Description: Structured audit events for auth, store, and lifecycle.
// Purpose: Emit redacted JSON-lines audit records through pluggable sinks.
// Dependencies: miniapp-config, miniapp-store-sqlite, serde, serde_json, sha2
// ============================================================================

//! ## Overview
//! Events are serialized as one JSON object per line. Keys never appear in
//! audit output: auth events carry a sha256 fingerprint instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use miniapp_config::AdminKeySource;
use miniapp_config::AuditConfig;
use miniapp_core::AppSlug;
use miniapp_core::UserId;
use miniapp_store_sqlite::AdminReconcileOutcome;
use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

use crate::auth::AuthError;
use crate::auth::ServiceAction;
use crate::service::StartupReport;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Authorization decision event.
#[derive(Debug, Clone, Serialize)]
pub struct AuthAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Decision outcome (`allow` or `deny`).
    pub decision: &'static str,
    /// Operation label.
    pub action: &'static str,
    /// Fingerprint of the presented key (sha256).
    pub key_fingerprint: Option<String>,
    /// Resolved caller on allow.
    pub user_id: Option<UserId>,
    /// Tenant named by the caller, if any.
    pub target_user_id: Option<UserId>,
    /// Failure reason on deny.
    pub reason: Option<String>,
}

impl AuthAuditEvent {
    /// Builds an allow event.
    #[must_use]
    pub fn allowed(
        action: ServiceAction,
        key: &str,
        user_id: UserId,
        target: Option<UserId>,
    ) -> Self {
        Self {
            event: "miniapp_authz",
            timestamp_ms: now_ms(),
            decision: "allow",
            action: action.label(),
            key_fingerprint: fingerprint_of(key),
            user_id: Some(user_id),
            target_user_id: target,
            reason: None,
        }
    }

    /// Builds a deny event.
    #[must_use]
    pub fn denied(
        action: ServiceAction,
        key: &str,
        target: Option<UserId>,
        error: &AuthError,
    ) -> Self {
        Self {
            event: "miniapp_authz",
            timestamp_ms: now_ms(),
            decision: "deny",
            action: action.label(),
            key_fingerprint: fingerprint_of(key),
            user_id: None,
            target_user_id: target,
            reason: Some(error.to_string()),
        }
    }
}

/// Store mutation event.
#[derive(Debug, Clone, Serialize)]
pub struct StoreAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Operation label.
    pub action: &'static str,
    /// Tenant the mutation applied to.
    pub owner: UserId,
    /// App slug when the mutation targets an app.
    pub slug: Option<String>,
    /// Result label.
    pub outcome: &'static str,
}

impl StoreAuditEvent {
    /// Creates a store event with a consistent timestamp.
    #[must_use]
    pub fn new(
        action: ServiceAction,
        owner: UserId,
        slug: Option<&AppSlug>,
        outcome: &'static str,
    ) -> Self {
        Self {
            event: "miniapp_store",
            timestamp_ms: now_ms(),
            action: action.label(),
            owner,
            slug: slug.map(|value| value.as_str().to_string()),
            outcome,
        }
    }
}

/// Startup event.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Schema state observed before convergence.
    pub schema_state: &'static str,
    /// Number of schema writes performed.
    pub schema_actions: usize,
    /// App rows copied out of aside tables.
    pub migrated_rows: usize,
    /// Where the admin key came from.
    pub admin_key_source: AdminKeySource,
    /// Admin reconciliation result.
    pub admin_reconcile: AdminReconcileOutcome,
}

impl LifecycleAuditEvent {
    /// Summarizes a startup report.
    #[must_use]
    pub fn new(report: &StartupReport) -> Self {
        Self {
            event: "miniapp_lifecycle",
            timestamp_ms: now_ms(),
            schema_state: report.schema.observed.label(),
            schema_actions: report.schema.actions.len(),
            migrated_rows: report.schema.migrated_rows,
            admin_key_source: report.admin_key_source,
            admin_reconcile: report.admin_reconcile,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for service events.
pub trait AuditSink: Send + Sync {
    /// Record an authorization decision.
    fn record_auth(&self, event: &AuthAuditEvent);

    /// Record a store mutation.
    fn record_store(&self, _event: &StoreAuditEvent) {}

    /// Record a startup event.
    fn record_lifecycle(&self, _event: &LifecycleAuditEvent) {}
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one serialized event.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

impl AuditSink for StderrAuditSink {
    fn record_auth(&self, event: &AuthAuditEvent) {
        Self::emit(event);
    }

    fn record_store(&self, event: &StoreAuditEvent) {
        Self::emit(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        Self::emit(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event.
    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_auth(&self, event: &AuthAuditEvent) {
        self.emit(event);
    }

    fn record_store(&self, event: &StoreAuditEvent) {
        self.emit(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        self.emit(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_auth(&self, _event: &AuthAuditEvent) {}
}

/// In-memory audit sink for tests and embedding.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Recorded events in arrival order.
    events: Mutex<Vec<Value>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded event.
    #[must_use]
    pub fn events(&self) -> Vec<Value> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Stores one serialized event.
    fn push<T: Serialize>(&self, event: &T) {
        if let Ok(value) = serde_json::to_value(event)
            && let Ok(mut events) = self.events.lock()
        {
            events.push(value);
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record_auth(&self, event: &AuthAuditEvent) {
        self.push(event);
    }

    fn record_store(&self, event: &StoreAuditEvent) {
        self.push(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        self.push(event);
    }
}

/// Builds the sink selected by the audit configuration.
///
/// # Errors
///
/// Returns an error if the configured audit file cannot be opened.
pub fn audit_sink_from_config(config: &AuditConfig) -> io::Result<Arc<dyn AuditSink>> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.path {
        Some(path) => Ok(Arc::new(FileAuditSink::new(path)?)),
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the lowercase hex sha256 fingerprint of a key.
#[must_use]
pub fn key_fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Fingerprints non-empty keys.
fn fingerprint_of(key: &str) -> Option<String> {
    (!key.is_empty()).then(|| key_fingerprint(key))
}

/// Milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}
