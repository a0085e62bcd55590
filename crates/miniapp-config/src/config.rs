// crates/miniapp-config/src/config.rs
// ============================================================================
// Module: Miniapp Configuration
// Description: Configuration loading and validation for the miniapp host.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: miniapp-core, miniapp-store-sqlite, serde, toml, rand, base64
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file is a valid configuration.
//! Unknown keys are rejected.
//!
//! The admin key resolves from the file, then from an environment variable,
//! and is otherwise generated. A generated key lives only for the process;
//! callers should surface it once to the operator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use miniapp_core::InputLimits;
use miniapp_core::core::validation::DEFAULT_MAX_COMMENT_LENGTH;
use miniapp_core::core::validation::DEFAULT_MAX_HTML_BYTES;
use miniapp_core::core::validation::DEFAULT_MAX_KEY_LENGTH;
use miniapp_core::core::validation::DEFAULT_MAX_SLUG_LENGTH;
use miniapp_store_sqlite::SchemaOptions;
use miniapp_store_sqlite::SqliteJournalMode;
use miniapp_store_sqlite::SqliteStoreConfig;
use miniapp_store_sqlite::SqliteSyncMode;
use miniapp_store_sqlite::pool::DEFAULT_BUSY_TIMEOUT_MS;
use miniapp_store_sqlite::pool::DEFAULT_CONNECTION_TIMEOUT_MS;
use miniapp_store_sqlite::pool::DEFAULT_POOL_SIZE;
use miniapp_store_sqlite::pool::MAX_POOL_SIZE;
use miniapp_store_sqlite::schema::DEFAULT_MAX_KEY_SUFFIX_ATTEMPTS;
use miniapp_store_sqlite::schema::LEGACY_ADMIN_KEY;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "miniapp.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "MINIAPP_CONFIG";
/// Default environment variable holding the admin key.
pub const DEFAULT_ADMIN_KEY_ENV: &str = "SECRET_KEY";
/// Default database path.
const DEFAULT_STORE_PATH: &str = "data/apps.db";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for `admin.max_key_suffix_attempts`.
pub(crate) const MAX_KEY_SUFFIX_ATTEMPTS: u32 = 10_000;
/// Upper bound for `limits.max_html_bytes`.
pub(crate) const MAX_HTML_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Upper bound for `limits.max_slug_length`.
pub(crate) const MAX_SLUG_LENGTH_LIMIT: usize = 255;
/// Upper bound for `limits.max_key_length`.
pub(crate) const MAX_KEY_LENGTH_LIMIT: usize = 4096;
/// Upper bound for `limits.max_comment_length`.
pub(crate) const MAX_COMMENT_LENGTH_LIMIT: usize = 64 * 1024;
/// Maximum environment variable name length.
const MAX_ENV_NAME_LENGTH: usize = 128;
/// Random bytes in a generated admin key.
const GENERATED_KEY_BYTES: usize = 32;

// ============================================================================
// SECTION: Top-Level Config
// ============================================================================

/// Miniapp host configuration.
///
/// # Invariants
/// - Constructed once at startup and passed by reference; never global.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MiniAppConfig {
    /// Store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Admin identity configuration.
    #[serde(default)]
    pub admin: AdminKeyConfig,
    /// Input size limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl MiniAppConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.limits.validate()?;
        self.admin.validate(&self.limits.input_limits())?;
        self.audit.validate()?;
        Ok(())
    }

    /// Returns the input limits for request validation.
    #[must_use]
    pub const fn input_limits(&self) -> InputLimits {
        self.limits.input_limits()
    }

    /// Returns schema migration options.
    #[must_use]
    pub fn schema_options(&self) -> SchemaOptions {
        SchemaOptions {
            legacy_admin_key: LEGACY_ADMIN_KEY.to_string(),
            max_key_suffix_attempts: self.admin.max_key_suffix_attempts,
        }
    }
}

// ============================================================================
// SECTION: Store Config
// ============================================================================

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Database file path.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// Sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Maximum open connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Connection checkout timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            pool_size: DEFAULT_POOL_SIZE,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    /// Validates store settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("store.path", &self.path.to_string_lossy())?;
        if self.pool_size == 0 || self.pool_size > MAX_POOL_SIZE {
            return Err(ConfigError::Invalid(format!(
                "store.pool_size must be between 1 and {MAX_POOL_SIZE}"
            )));
        }
        if self.connection_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "store.connection_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the `SQLite` store configuration.
    #[must_use]
    pub fn sqlite_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.path.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
            pool_size: self.pool_size,
            connection_timeout_ms: self.connection_timeout_ms,
        }
    }
}

/// Returns the default database path.
fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

/// Returns the default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default pool size.
const fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

/// Returns the default checkout timeout.
const fn default_connection_timeout_ms() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_MS
}

// ============================================================================
// SECTION: Admin Config
// ============================================================================

/// `[admin]` section.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminKeyConfig {
    /// Literal admin key.
    #[serde(default)]
    pub key: Option<String>,
    /// Environment variable consulted when `key` is absent.
    #[serde(default = "default_admin_key_env")]
    pub key_env: String,
    /// Bound on suffixed placeholder keys tried during legacy migration.
    #[serde(default = "default_max_key_suffix_attempts")]
    pub max_key_suffix_attempts: u32,
}

impl Default for AdminKeyConfig {
    fn default() -> Self {
        Self {
            key: None,
            key_env: default_admin_key_env(),
            max_key_suffix_attempts: DEFAULT_MAX_KEY_SUFFIX_ATTEMPTS,
        }
    }
}

impl fmt::Debug for AdminKeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminKeyConfig")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("key_env", &self.key_env)
            .field("max_key_suffix_attempts", &self.max_key_suffix_attempts)
            .finish()
    }
}

impl AdminKeyConfig {
    /// Validates admin settings.
    fn validate(&self, limits: &InputLimits) -> Result<(), ConfigError> {
        if let Some(key) = &self.key {
            limits.key(key).map_err(|err| ConfigError::Invalid(format!("admin.{err}")))?;
        }
        let name = self.key_env.trim();
        if name.is_empty() || name.len() > MAX_ENV_NAME_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "admin.key_env must be 1 to {MAX_ENV_NAME_LENGTH} bytes"
            )));
        }
        if !name.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'_') {
            return Err(ConfigError::Invalid(
                "admin.key_env must contain only ASCII letters, digits, or '_'".to_string(),
            ));
        }
        if self.max_key_suffix_attempts == 0
            || self.max_key_suffix_attempts > MAX_KEY_SUFFIX_ATTEMPTS
        {
            return Err(ConfigError::Invalid(format!(
                "admin.max_key_suffix_attempts must be between 1 and {MAX_KEY_SUFFIX_ATTEMPTS}"
            )));
        }
        Ok(())
    }

    /// Resolves the admin key from config, then the process environment, then
    /// a freshly generated secret.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the environment value is invalid.
    pub fn resolve(&self, limits: &InputLimits) -> Result<ResolvedAdminKey, ConfigError> {
        self.resolve_with(limits, |name| env::var(name).ok())
    }

    /// Resolves the admin key using `lookup` for environment access.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the looked-up value is invalid.
    pub fn resolve_with(
        &self,
        limits: &InputLimits,
        lookup: impl FnOnce(&str) -> Option<String>,
    ) -> Result<ResolvedAdminKey, ConfigError> {
        if let Some(key) = &self.key {
            return Ok(ResolvedAdminKey {
                secret: key.clone(),
                source: AdminKeySource::Config,
            });
        }
        if let Some(value) = lookup(self.key_env.trim()).filter(|value| !value.is_empty()) {
            limits
                .key(&value)
                .map_err(|err| ConfigError::Invalid(format!("{}: {err}", self.key_env.trim())))?;
            return Ok(ResolvedAdminKey {
                secret: value,
                source: AdminKeySource::Environment,
            });
        }
        Ok(ResolvedAdminKey {
            secret: generate_admin_key(),
            source: AdminKeySource::Generated,
        })
    }
}

/// Returns the default admin key environment variable.
fn default_admin_key_env() -> String {
    DEFAULT_ADMIN_KEY_ENV.to_string()
}

/// Returns the default suffix attempt bound.
const fn default_max_key_suffix_attempts() -> u32 {
    DEFAULT_MAX_KEY_SUFFIX_ATTEMPTS
}

/// Generates a url-safe random admin key.
fn generate_admin_key() -> String {
    let mut bytes = [0u8; GENERATED_KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Where the admin key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminKeySource {
    /// `admin.key` in the config file.
    Config,
    /// The `admin.key_env` environment variable.
    Environment,
    /// Generated for this process.
    Generated,
}

/// Resolved admin secret.
///
/// # Invariants
/// - `Debug` output never includes the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedAdminKey {
    /// Secret value.
    secret: String,
    /// Resolution source.
    source: AdminKeySource,
}

impl ResolvedAdminKey {
    /// Returns the secret value.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Returns where the secret came from.
    #[must_use]
    pub const fn source(&self) -> AdminKeySource {
        self.source
    }
}

impl fmt::Debug for ResolvedAdminKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedAdminKey")
            .field("secret", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

// ============================================================================
// SECTION: Limits Config
// ============================================================================

/// `[limits]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum HTML payload size in bytes.
    #[serde(default = "default_max_html_bytes")]
    pub max_html_bytes: usize,
    /// Maximum slug length in bytes.
    #[serde(default = "default_max_slug_length")]
    pub max_slug_length: usize,
    /// Maximum key length in bytes.
    #[serde(default = "default_max_key_length")]
    pub max_key_length: usize,
    /// Maximum comment length in bytes.
    #[serde(default = "default_max_comment_length")]
    pub max_comment_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_html_bytes: DEFAULT_MAX_HTML_BYTES,
            max_slug_length: DEFAULT_MAX_SLUG_LENGTH,
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
            max_comment_length: DEFAULT_MAX_COMMENT_LENGTH,
        }
    }
}

impl LimitsConfig {
    /// Validates limit bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_limit("limits.max_html_bytes", self.max_html_bytes, MAX_HTML_BYTES_LIMIT)?;
        validate_limit("limits.max_slug_length", self.max_slug_length, MAX_SLUG_LENGTH_LIMIT)?;
        validate_limit("limits.max_key_length", self.max_key_length, MAX_KEY_LENGTH_LIMIT)?;
        validate_limit(
            "limits.max_comment_length",
            self.max_comment_length,
            MAX_COMMENT_LENGTH_LIMIT,
        )?;
        Ok(())
    }

    /// Converts to core input limits.
    #[must_use]
    pub const fn input_limits(&self) -> InputLimits {
        InputLimits {
            max_slug_length: self.max_slug_length,
            max_html_bytes: self.max_html_bytes,
            max_key_length: self.max_key_length,
            max_comment_length: self.max_comment_length,
        }
    }
}

/// Returns the default HTML limit.
const fn default_max_html_bytes() -> usize {
    DEFAULT_MAX_HTML_BYTES
}

/// Returns the default slug limit.
const fn default_max_slug_length() -> usize {
    DEFAULT_MAX_SLUG_LENGTH
}

/// Returns the default key limit.
const fn default_max_key_length() -> usize {
    DEFAULT_MAX_KEY_LENGTH
}

/// Returns the default comment limit.
const fn default_max_comment_length() -> usize {
    DEFAULT_MAX_COMMENT_LENGTH
}

// ============================================================================
// SECTION: Audit Config
// ============================================================================

/// `[audit]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Emit audit events.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// JSON-lines output file; stderr when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates the audit path.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", &path.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Returns the default audit toggle.
const fn default_audit_enabled() -> bool {
    true
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a positive, bounded limit.
fn validate_limit(field: &str, value: usize, max: usize) -> Result<(), ConfigError> {
    if value == 0 || value > max {
        return Err(ConfigError::Invalid(format!("{field} must be between 1 and {max}")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::validate_limit;
    use super::validate_path_string;

    #[test]
    fn validate_path_string_rejects_whitespace_only() {
        assert!(validate_path_string("store.path", "   ").is_err());
        assert!(validate_path_string("store.path", "./data/apps.db").is_ok());
    }

    #[test]
    fn validate_limit_rejects_zero_and_overflow() {
        assert!(validate_limit("limits.x", 0, 10).is_err());
        assert!(validate_limit("limits.x", 11, 10).is_err());
        assert!(validate_limit("limits.x", 10, 10).is_ok());
    }
}
