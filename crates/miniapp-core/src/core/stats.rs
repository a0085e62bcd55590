// crates/miniapp-core/src/core/stats.rs
// ============================================================================
// Module: Usage Statistics
// Description: Per-tenant counters derived from the access log and app table.
// Purpose: Provide a merge-friendly, never-persisted stats view.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`UsageStats`] is rebuilt on every query. Action counters come from the
//! access log; `apps_count` is the live app row count, never a log-derived
//! value. Tenants absent from both sources report zero.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::UserId;
use crate::core::model::AccessAction;

// ============================================================================
// SECTION: Stats Types
// ============================================================================

/// Counters for a single tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRecord {
    /// Stateless links generated.
    pub generated: u64,
    /// Stateless link views attributed to this tenant.
    pub view_stateless: u64,
    /// Stored app views.
    pub view_persistent: u64,
    /// Live stored app count.
    pub apps_count: u64,
}

impl StatsRecord {
    /// Adds `count` occurrences of `action`.
    pub const fn add_action(&mut self, action: AccessAction, count: u64) {
        match action {
            AccessAction::Generate => self.generated = self.generated.saturating_add(count),
            AccessAction::ViewStateless => {
                self.view_stateless = self.view_stateless.saturating_add(count);
            }
            AccessAction::ViewPersistent => {
                self.view_persistent = self.view_persistent.saturating_add(count);
            }
        }
    }

    /// Returns the counter for `action`.
    #[must_use]
    pub const fn action_count(&self, action: AccessAction) -> u64 {
        match action {
            AccessAction::Generate => self.generated,
            AccessAction::ViewStateless => self.view_stateless,
            AccessAction::ViewPersistent => self.view_persistent,
        }
    }
}

/// Stats for every tenant with at least one log entry or app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageStats {
    /// Per-tenant records.
    records: BTreeMap<UserId, StatsRecord>,
}

impl UsageStats {
    /// Creates an empty stats set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Adds log-derived counts for a tenant.
    pub fn add_action(&mut self, user_id: UserId, action: AccessAction, count: u64) {
        self.records.entry(user_id).or_default().add_action(action, count);
    }

    /// Sets the live app count for a tenant.
    pub fn set_apps_count(&mut self, user_id: UserId, apps_count: u64) {
        self.records.entry(user_id).or_default().apps_count = apps_count;
    }

    /// Returns the record for a tenant, defaulting to zero counters.
    #[must_use]
    pub fn get(&self, user_id: UserId) -> StatsRecord {
        self.records.get(&user_id).copied().unwrap_or_default()
    }

    /// Returns true when the tenant appears in either source.
    #[must_use]
    pub fn contains(&self, user_id: UserId) -> bool {
        self.records.contains_key(&user_id)
    }

    /// Iterates records in ascending tenant order.
    pub fn iter(&self) -> impl Iterator<Item = (UserId, &StatsRecord)> {
        self.records.iter().map(|(id, record)| (*id, record))
    }

    /// Number of tenants with a record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when no tenant has a record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::AccessAction;
    use super::UsageStats;
    use super::UserId;

    #[test]
    fn missing_tenant_defaults_to_zero() {
        let stats = UsageStats::new();
        let Some(user) = UserId::from_raw(7) else {
            return;
        };
        assert!(!stats.contains(user));
        assert_eq!(stats.get(user).generated, 0);
        assert_eq!(stats.get(user).apps_count, 0);
    }

    #[test]
    fn apps_count_is_independent_of_log_counts() {
        let mut stats = UsageStats::new();
        stats.add_action(UserId::ADMIN, AccessAction::ViewPersistent, 4);
        stats.set_apps_count(UserId::ADMIN, 1);
        stats.add_action(UserId::ADMIN, AccessAction::ViewPersistent, 1);
        let record = stats.get(UserId::ADMIN);
        assert_eq!(record.view_persistent, 5);
        assert_eq!(record.apps_count, 1);
        assert_eq!(record.action_count(AccessAction::Generate), 0);
    }
}
