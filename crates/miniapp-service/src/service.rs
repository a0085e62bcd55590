// crates/miniapp-service/src/service.rs
// ============================================================================
// Module: Miniapp Service
// Description: Tenant-scoped facade over the identity, app, and usage stores.
// Purpose: Resolve, authorize, validate, mutate, record, and audit in order.
// Dependencies: miniapp-config, miniapp-core, miniapp-store-sqlite, serde
// ============================================================================

//! ## Overview
//! [`MiniAppService`] is the single entry point for request handlers. Every
//! keyed operation resolves the caller and applies the ownership policy
//! before validating input or touching the store, so a rejected request has
//! no side effects.
//!
//! Startup goes through [`MiniAppService::start`]: the schema converges, the
//! admin key is reconciled, and a lifecycle event is emitted before the
//! service is handed out.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use miniapp_config::AdminKeySource;
use miniapp_config::MiniAppConfig;
use miniapp_config::ResolvedAdminKey;
use miniapp_core::AccessAction;
use miniapp_core::AccessLog;
use miniapp_core::App;
use miniapp_core::AppStore;
use miniapp_core::AppSummary;
use miniapp_core::IdentityStore;
use miniapp_core::InputLimits;
use miniapp_core::StatsRecord;
use miniapp_core::StoreError;
use miniapp_core::UsageStats;
use miniapp_core::User;
use miniapp_core::UserId;
use miniapp_store_sqlite::AdminReconcileOutcome;
use miniapp_store_sqlite::SchemaReport;
use miniapp_store_sqlite::SqliteMiniAppStore;
use serde::Serialize;

use crate::audit::AuditSink;
use crate::audit::AuthAuditEvent;
use crate::audit::LifecycleAuditEvent;
use crate::audit::StoreAuditEvent;
use crate::auth::AuthError;
use crate::auth::KeyAuthorizer;
use crate::auth::ServiceAction;
use crate::auth::authorize_target;
use crate::auth::list_scope;
use crate::auth::require_admin;
use crate::error::ServiceError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of bringing a store online.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartupReport {
    /// Schema convergence result.
    pub schema: SchemaReport,
    /// Admin key reconciliation result.
    pub admin_reconcile: AdminReconcileOutcome,
    /// Where the admin key came from.
    pub admin_key_source: AdminKeySource,
}

/// Tenant with merged usage counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityStats {
    /// Tenant record.
    pub user: User,
    /// Usage counters, zero when nothing was recorded.
    pub stats: StatsRecord,
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Tenant-scoped service facade.
pub struct MiniAppService<S> {
    /// Backing store.
    store: S,
    /// Key resolution policy.
    authorizer: KeyAuthorizer,
    /// Input limits.
    limits: InputLimits,
    /// Audit destination.
    audit: Arc<dyn AuditSink>,
}

impl MiniAppService<SqliteMiniAppStore> {
    /// Opens the configured store, converges it, reconciles the admin key,
    /// and returns a ready service.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] when the store cannot be opened or the
    /// schema cannot converge; the process must not serve requests then.
    pub fn start(
        config: &MiniAppConfig,
        admin_key: &ResolvedAdminKey,
        audit: Arc<dyn AuditSink>,
    ) -> Result<(Self, StartupReport), ServiceError> {
        let store =
            SqliteMiniAppStore::open(&config.store.sqlite_config()).map_err(StoreError::from)?;
        let report = bootstrap_store(&store, config, admin_key)?;
        audit.record_lifecycle(&LifecycleAuditEvent::new(&report));
        let service = Self::new(
            store,
            KeyAuthorizer::new(admin_key.secret()),
            config.input_limits(),
            audit,
        );
        Ok((service, report))
    }
}

impl<S> MiniAppService<S>
where
    S: IdentityStore + AppStore + AccessLog,
{
    /// Wraps an already converged store.
    #[must_use]
    pub fn new(
        store: S,
        authorizer: KeyAuthorizer,
        limits: InputLimits,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            authorizer,
            limits,
            audit,
        }
    }

    /// Returns the backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Resolves a presented key.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Forbidden`] when the key resolves to no one.
    pub fn resolve_identity(&self, key: &str) -> Result<User, ServiceError> {
        self.authorize(ServiceAction::ResolveIdentity, key, None).map(|(identity, _)| identity)
    }

    // ------------------------------------------------------------------------
    // Apps
    // ------------------------------------------------------------------------

    /// Creates or replaces an app and returns the owning tenant.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Forbidden`], [`ServiceError::Invalid`], or
    /// [`ServiceError::Store`].
    pub fn save_app(
        &self,
        key: &str,
        target: Option<UserId>,
        slug: &str,
        html: &str,
    ) -> Result<UserId, ServiceError> {
        let (_, owner) = self.authorize(ServiceAction::SaveApp, key, target)?;
        let slug = self.limits.slug(slug)?;
        self.limits.html(html)?;
        self.store.upsert_app(&slug, owner, html)?;
        self.audit.record_store(&StoreAuditEvent::new(
            ServiceAction::SaveApp,
            owner,
            Some(&slug),
            "saved",
        ));
        Ok(owner)
    }

    /// Reads one app.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] when the tenant has no such app.
    pub fn fetch_app(
        &self,
        key: &str,
        target: Option<UserId>,
        slug: &str,
    ) -> Result<App, ServiceError> {
        let (_, owner) = self.authorize(ServiceAction::FetchApp, key, target)?;
        let slug = self.limits.lookup_slug(slug)?;
        self.store.fetch_app(&slug, owner)?.ok_or(ServiceError::NotFound)
    }

    /// Lists apps, newest first. The admin sees every tenant unless a target
    /// is named.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Forbidden`] or [`ServiceError::Store`].
    pub fn list_apps(
        &self,
        key: &str,
        target: Option<UserId>,
    ) -> Result<Vec<AppSummary>, ServiceError> {
        let decision = self.authorizer.resolve(&self.store, key).and_then(|identity| {
            let scope = list_scope(&identity, target)?;
            Ok((identity, scope))
        });
        let (_, scope) = self.audit_decision(ServiceAction::ListApps, key, target, decision)?;
        Ok(self.store.list_apps(scope)?)
    }

    /// Deletes an app. Returns true when a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Forbidden`], [`ServiceError::Invalid`], or
    /// [`ServiceError::Store`].
    pub fn delete_app(
        &self,
        key: &str,
        target: Option<UserId>,
        slug: &str,
    ) -> Result<bool, ServiceError> {
        let (_, owner) = self.authorize(ServiceAction::DeleteApp, key, target)?;
        let slug = self.limits.lookup_slug(slug)?;
        let removed = self.store.delete_app(&slug, owner)?;
        let outcome = if removed { "deleted" } else { "absent" };
        self.audit.record_store(&StoreAuditEvent::new(
            ServiceAction::DeleteApp,
            owner,
            Some(&slug),
            outcome,
        ));
        Ok(removed)
    }

    /// Serves a stored app to an anonymous viewer and records the view
    /// against its owner.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] when the app does not exist.
    pub fn view_app(&self, owner: UserId, slug: &str) -> Result<App, ServiceError> {
        let slug = self.limits.lookup_slug(slug)?;
        let app = self.store.fetch_app(&slug, owner)?.ok_or(ServiceError::NotFound)?;
        self.store.record_event(Some(owner), AccessAction::ViewPersistent, Some(&slug))?;
        Ok(app)
    }

    // ------------------------------------------------------------------------
    // Stateless Links
    // ------------------------------------------------------------------------

    /// Records that the caller signed a stateless link.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Forbidden`] or [`ServiceError::Store`].
    pub fn record_generate(&self, key: &str) -> Result<UserId, ServiceError> {
        let (identity, _) = self.authorize(ServiceAction::Generate, key, None)?;
        self.store.record_event(Some(identity.id), AccessAction::Generate, None)?;
        Ok(identity.id)
    }

    /// Records a stateless link view, attributed to the tenant that signed
    /// the link rather than the viewer.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] when the event cannot be written.
    pub fn record_stateless_view(&self, signer: Option<UserId>) -> Result<(), ServiceError> {
        Ok(self.store.record_event(signer, AccessAction::ViewStateless, None)?)
    }

    // ------------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------------

    /// Issues a new tenant key. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Forbidden`] for non-admins and
    /// [`ServiceError::KeyAlreadyExists`] for a duplicate key.
    pub fn create_identity(
        &self,
        key: &str,
        new_key: &str,
        comment: Option<&str>,
    ) -> Result<UserId, ServiceError> {
        self.authorize_admin(ServiceAction::CreateIdentity, key)?;
        self.limits.key(new_key)?;
        self.limits.comment(comment)?;
        let id = self.store.create_user(new_key, comment)?;
        self.audit.record_store(&StoreAuditEvent::new(
            ServiceAction::CreateIdentity,
            id,
            None,
            "created",
        ));
        Ok(id)
    }

    /// Lists every tenant in id order. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Forbidden`] for non-admins.
    pub fn enumerate_identities(&self, key: &str) -> Result<Vec<User>, ServiceError> {
        self.authorize_admin(ServiceAction::ListIdentities, key)?;
        Ok(self.store.list_users()?)
    }

    /// Lists every tenant with its usage counters. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Forbidden`] for non-admins.
    pub fn list_users_with_stats(&self, key: &str) -> Result<Vec<IdentityStats>, ServiceError> {
        self.authorize_admin(ServiceAction::ListIdentities, key)?;
        let users = self.store.list_users()?;
        let stats = self.store.aggregate_stats()?;
        Ok(users
            .into_iter()
            .map(|user| {
                let record = stats.get(user.id);
                IdentityStats {
                    user,
                    stats: record,
                }
            })
            .collect())
    }

    /// Returns usage counters for every tenant. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Forbidden`] for non-admins.
    pub fn aggregate_stats(&self, key: &str) -> Result<UsageStats, ServiceError> {
        self.authorize_admin(ServiceAction::AggregateStats, key)?;
        Ok(self.store.aggregate_stats()?)
    }

    // ------------------------------------------------------------------------
    // Authorization
    // ------------------------------------------------------------------------

    /// Resolves the caller and the tenant it acts on.
    fn authorize(
        &self,
        action: ServiceAction,
        key: &str,
        target: Option<UserId>,
    ) -> Result<(User, UserId), ServiceError> {
        let decision = self.authorizer.resolve(&self.store, key).and_then(|identity| {
            let owner = authorize_target(&identity, target)?;
            Ok((identity, owner))
        });
        self.audit_decision(action, key, target, decision)
    }

    /// Resolves the caller and requires the admin identity.
    fn authorize_admin(&self, action: ServiceAction, key: &str) -> Result<User, ServiceError> {
        let decision = self.authorizer.resolve(&self.store, key).and_then(|identity| {
            require_admin(&identity)?;
            Ok((identity, ()))
        });
        self.audit_decision(action, key, None, decision).map(|(identity, ())| identity)
    }

    /// Emits the auth event for a decision and converts denials.
    fn audit_decision<T>(
        &self,
        action: ServiceAction,
        key: &str,
        target: Option<UserId>,
        decision: Result<(User, T), AuthError>,
    ) -> Result<(User, T), ServiceError> {
        match decision {
            Ok(granted) => {
                self.audit.record_auth(&AuthAuditEvent::allowed(action, key, granted.0.id, target));
                Ok(granted)
            }
            Err(error) => {
                self.audit.record_auth(&AuthAuditEvent::denied(action, key, target, &error));
                Err(error.into())
            }
        }
    }
}

// ============================================================================
// SECTION: Startup
// ============================================================================

/// Converges the schema and reconciles the admin key.
///
/// # Errors
///
/// Returns [`ServiceError::Store`] when convergence fails and
/// [`ServiceError::KeyAlreadyExists`] when another tenant already holds the
/// admin key.
pub fn bootstrap_store(
    store: &SqliteMiniAppStore,
    config: &MiniAppConfig,
    admin_key: &ResolvedAdminKey,
) -> Result<StartupReport, ServiceError> {
    let schema = store.ensure_schema(config.schema_options()).map_err(StoreError::from)?;
    let admin_reconcile =
        store.reconcile_admin_key(admin_key.secret()).map_err(StoreError::from)?;
    Ok(StartupReport {
        schema,
        admin_reconcile,
        admin_key_source: admin_key.source(),
    })
}
