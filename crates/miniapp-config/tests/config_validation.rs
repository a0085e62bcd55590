//! Config loading and validation tests for miniapp-config.
// crates/miniapp-config/tests/config_validation.rs
// =============================================================================
// Module: Config Validation Tests
// Description: Validate defaults, limits, file guards, and admin key resolution.
// Purpose: Ensure configuration fails closed on every malformed input.
// =============================================================================

#![allow(clippy::use_debug, reason = "Debug output is asserted for redaction.")]

use std::fs;

use miniapp_config::AdminKeyConfig;
use miniapp_config::AdminKeySource;
use miniapp_config::ConfigError;
use miniapp_config::MiniAppConfig;
use miniapp_store_sqlite::SqliteJournalMode;
use miniapp_store_sqlite::SqliteSyncMode;
use tempfile::TempDir;

type TestResult = Result<(), String>;

fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}

fn ensure(condition: bool, message: &str) -> TestResult {
    if condition { Ok(()) } else { Err(message.to_string()) }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

#[test]
fn empty_config_uses_defaults() -> TestResult {
    let config = MiniAppConfig::from_toml_str("").map_err(|err| err.to_string())?;
    ensure(config.store.path.ends_with("apps.db"), "default store path")?;
    ensure(config.store.journal_mode == SqliteJournalMode::Wal, "default journal mode")?;
    ensure(config.store.sync_mode == SqliteSyncMode::Full, "default sync mode")?;
    ensure(config.store.pool_size == 4, "default pool size")?;
    ensure(config.admin.key.is_none(), "no literal admin key")?;
    ensure(config.admin.key_env == "SECRET_KEY", "default admin env var")?;
    ensure(config.admin.max_key_suffix_attempts == 100, "default suffix bound")?;
    ensure(config.limits.max_html_bytes == 1024 * 1024, "default html limit")?;
    ensure(config.audit.enabled && config.audit.path.is_none(), "default audit")?;
    ensure(config.schema_options().legacy_admin_key == "legacy-admin", "placeholder key")?;
    Ok(())
}

#[test]
fn sections_override_defaults() -> TestResult {
    let config = MiniAppConfig::from_toml_str(
        r#"
        [store]
        path = "/var/lib/miniapp/apps.db"
        journal_mode = "delete"
        sync_mode = "normal"
        pool_size = 8

        [admin]
        key_env = "MINIAPP_ADMIN_KEY"
        max_key_suffix_attempts = 5

        [limits]
        max_slug_length = 64

        [audit]
        enabled = false
        "#,
    )
    .map_err(|err| err.to_string())?;
    let sqlite = config.store.sqlite_config();
    ensure(sqlite.journal_mode == SqliteJournalMode::Delete, "journal mode override")?;
    ensure(sqlite.sync_mode == SqliteSyncMode::Normal, "sync mode override")?;
    ensure(sqlite.pool_size == 8, "pool size override")?;
    ensure(config.input_limits().max_slug_length == 64, "slug limit override")?;
    ensure(config.schema_options().max_key_suffix_attempts == 5, "suffix override")?;
    ensure(!config.audit.enabled, "audit disabled")?;
    Ok(())
}

// ============================================================================
// SECTION: Validation
// ============================================================================

#[test]
fn unknown_fields_are_rejected() -> TestResult {
    assert_invalid(MiniAppConfig::from_toml_str("[store]\nbogus = 1\n"), "parse error")?;
    assert_invalid(MiniAppConfig::from_toml_str("[server]\nbind = \"x\"\n"), "parse error")?;
    Ok(())
}

#[test]
fn pool_size_bounds_are_enforced() -> TestResult {
    assert_invalid(MiniAppConfig::from_toml_str("[store]\npool_size = 0\n"), "pool_size")?;
    assert_invalid(MiniAppConfig::from_toml_str("[store]\npool_size = 65\n"), "pool_size")?;
    Ok(())
}

#[test]
fn limits_are_bounded() -> TestResult {
    assert_invalid(
        MiniAppConfig::from_toml_str("[limits]\nmax_html_bytes = 0\n"),
        "limits.max_html_bytes",
    )?;
    assert_invalid(
        MiniAppConfig::from_toml_str("[limits]\nmax_html_bytes = 16777217\n"),
        "limits.max_html_bytes",
    )?;
    assert_invalid(
        MiniAppConfig::from_toml_str("[limits]\nmax_slug_length = 256\n"),
        "limits.max_slug_length",
    )?;
    Ok(())
}

#[test]
fn admin_settings_are_validated() -> TestResult {
    assert_invalid(MiniAppConfig::from_toml_str("[admin]\nkey = \"\"\n"), "admin.key")?;
    assert_invalid(MiniAppConfig::from_toml_str("[admin]\nkey = \"a b\"\n"), "admin.key")?;
    assert_invalid(
        MiniAppConfig::from_toml_str("[admin]\nkey_env = \"BAD-NAME\"\n"),
        "admin.key_env",
    )?;
    assert_invalid(
        MiniAppConfig::from_toml_str("[admin]\nmax_key_suffix_attempts = 0\n"),
        "max_key_suffix_attempts",
    )?;
    assert_invalid(
        MiniAppConfig::from_toml_str("[admin]\nmax_key_suffix_attempts = 10001\n"),
        "max_key_suffix_attempts",
    )?;
    Ok(())
}

#[test]
fn store_path_must_be_non_empty() -> TestResult {
    assert_invalid(MiniAppConfig::from_toml_str("[store]\npath = \" \"\n"), "store.path")?;
    let long_component = "a".repeat(300);
    assert_invalid(
        MiniAppConfig::from_toml_str(&format!("[store]\npath = \"{long_component}/apps.db\"\n")),
        "store.path path component too long",
    )?;
    Ok(())
}

// ============================================================================
// SECTION: File Loading
// ============================================================================

#[test]
fn load_reads_explicit_path() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("miniapp.toml");
    fs::write(&path, "[store]\npool_size = 2\n").map_err(|err| err.to_string())?;
    let config = MiniAppConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    ensure(config.store.pool_size == 2, "loaded pool size")?;
    Ok(())
}

#[test]
fn load_rejects_oversized_and_non_utf8_files() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let large = dir.path().join("large.toml");
    fs::write(&large, vec![b'#'; 1024 * 1024 + 1]).map_err(|err| err.to_string())?;
    assert_invalid(MiniAppConfig::load(Some(&large)), "size limit")?;

    let binary = dir.path().join("binary.toml");
    fs::write(&binary, [0xff_u8, 0xfe, 0xfd]).map_err(|err| err.to_string())?;
    assert_invalid(MiniAppConfig::load(Some(&binary)), "utf-8")?;
    Ok(())
}

#[test]
fn load_reports_missing_file_as_io() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let missing = dir.path().join("absent.toml");
    match MiniAppConfig::load(Some(&missing)) {
        Err(ConfigError::Io(_)) => Ok(()),
        _ => Err("expected io error".to_string()),
    }
}

// ============================================================================
// SECTION: Admin Key Resolution
// ============================================================================

#[test]
fn admin_key_prefers_literal_then_environment() -> TestResult {
    let config = MiniAppConfig::default();
    let limits = config.input_limits();

    let literal = AdminKeyConfig {
        key: Some("from-file".to_string()),
        ..AdminKeyConfig::default()
    };
    let resolved = literal
        .resolve_with(&limits, |_| Some("from-env".to_string()))
        .map_err(|err| err.to_string())?;
    ensure(resolved.secret() == "from-file", "literal key wins")?;
    ensure(resolved.source() == AdminKeySource::Config, "config source")?;

    let resolved = config
        .admin
        .resolve_with(&limits, |name| (name == "SECRET_KEY").then(|| "from-env".to_string()))
        .map_err(|err| err.to_string())?;
    ensure(resolved.secret() == "from-env", "environment key")?;
    ensure(resolved.source() == AdminKeySource::Environment, "environment source")?;
    Ok(())
}

#[test]
fn admin_key_is_generated_when_unset() -> TestResult {
    let config = MiniAppConfig::default();
    let limits = config.input_limits();
    let first = config.admin.resolve_with(&limits, |_| None).map_err(|err| err.to_string())?;
    let second =
        config.admin.resolve_with(&limits, |_| Some(String::new())).map_err(|err| err.to_string())?;
    ensure(first.source() == AdminKeySource::Generated, "generated source")?;
    ensure(second.source() == AdminKeySource::Generated, "empty env value ignored")?;
    ensure(first.secret().len() == 43, "32 bytes of url-safe base64")?;
    ensure(first.secret() != second.secret(), "generated keys differ")?;
    ensure(limits.key(first.secret()).is_ok(), "generated key passes key validation")?;
    Ok(())
}

#[test]
fn admin_key_from_environment_is_validated() -> TestResult {
    let config = MiniAppConfig::default();
    let limits = config.input_limits();
    assert_invalid(
        config.admin.resolve_with(&limits, |_| Some("has space".to_string())),
        "SECRET_KEY",
    )?;
    Ok(())
}

#[test]
fn debug_output_redacts_admin_secrets() -> TestResult {
    let admin = AdminKeyConfig {
        key: Some("super-secret".to_string()),
        ..AdminKeyConfig::default()
    };
    let limits = MiniAppConfig::default().input_limits();
    let resolved = admin.resolve_with(&limits, |_| None).map_err(|err| err.to_string())?;
    let rendered = format!("{admin:?} {resolved:?}");
    ensure(!rendered.contains("super-secret"), "secret must not appear in debug output")?;
    Ok(())
}
