// crates/miniapp-cli/src/main.rs
// ============================================================================
// Module: Miniapp CLI Entry Point
// Description: Operator commands for the miniapp store.
// Purpose: Initialize stores, issue tenant keys, and inspect usage offline.
// Dependencies: clap, miniapp-config, miniapp-service, miniapp-store-sqlite
// ============================================================================

//! ## Overview
//! `miniapp init` is the only command that reconciles the admin key; the
//! other commands converge the schema and then act on the store directly as
//! the operator. Output is JSON on stdout; errors go to stderr with a failure
//! exit code.
//!
//! Keys are only printed on request (`user list --show-keys`) or when `init`
//! generated the admin key.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use miniapp_config::AdminKeySource;
use miniapp_config::MiniAppConfig;
use miniapp_core::AccessLog;
use miniapp_core::AppScope;
use miniapp_core::AppStore;
use miniapp_core::IdentityStore;
use miniapp_core::StatsRecord;
use miniapp_core::StoreError;
use miniapp_core::UnixMillis;
use miniapp_core::UsageStats;
use miniapp_core::User;
use miniapp_core::UserId;
use miniapp_service::MiniAppService;
use miniapp_service::StartupReport;
use miniapp_service::audit_sink_from_config;
use miniapp_store_sqlite::SqliteMiniAppStore;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "miniapp", version, disable_help_subcommand = true)]
struct Cli {
    /// Optional config file path (defaults to miniapp.toml or `MINIAPP_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Converge the schema and reconcile the admin key.
    Init,
    /// Tenant administration.
    User {
        /// Selected user subcommand.
        #[command(subcommand)]
        command: UserCommand,
    },
    /// App inspection.
    App {
        /// Selected app subcommand.
        #[command(subcommand)]
        command: AppCommand,
    },
    /// Print per-tenant usage counters.
    Stats,
    /// Print the most recent usage events.
    Events(EventsCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// User subcommands.
#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Issue a new tenant key.
    Add(UserAddCommand),
    /// List tenants with their usage counters.
    List(UserListCommand),
}

/// Arguments for `user add`.
#[derive(Args, Debug)]
struct UserAddCommand {
    /// Bearer key for the new tenant.
    #[arg(long, value_name = "KEY")]
    key: String,
    /// Optional operator note.
    #[arg(long, value_name = "TEXT")]
    comment: Option<String>,
}

/// Arguments for `user list`.
#[derive(Args, Debug)]
struct UserListCommand {
    /// Include bearer keys in the output.
    #[arg(long, action = ArgAction::SetTrue)]
    show_keys: bool,
}

/// App subcommands.
#[derive(Subcommand, Debug)]
enum AppCommand {
    /// List apps, newest first.
    List(AppListCommand),
}

/// Arguments for `app list`.
#[derive(Args, Debug)]
struct AppListCommand {
    /// Restrict the listing to one tenant.
    #[arg(long, value_name = "ID", value_parser = parse_user_id)]
    owner: Option<UserId>,
}

/// Arguments for `events`.
#[derive(Args, Debug)]
struct EventsCommand {
    /// Maximum number of events to print.
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u16).range(1 ..= 1000))]
    limit: u16,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a configuration file.
    Validate,
}

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// `init` output.
#[derive(Debug, Serialize)]
struct InitOutput<'a> {
    /// Startup result.
    report: &'a StartupReport,
    /// Admin key, present only when it was generated for this run.
    generated_admin_key: Option<&'a str>,
}

/// `user list` row.
#[derive(Debug, PartialEq, Eq, Serialize)]
struct UserRow {
    /// Tenant identifier.
    id: UserId,
    /// Bearer key when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    /// Operator note.
    comment: Option<String>,
    /// Creation time.
    created_at: UnixMillis,
    /// Usage counters.
    stats: StatsRecord,
}

/// `user add` output.
#[derive(Debug, Serialize)]
struct CreatedUser {
    /// Assigned identifier.
    id: UserId,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run(cli: Cli) -> CliResult<ExitCode> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Init => command_init(config_path),
        Commands::User {
            command,
        } => command_user(config_path, command),
        Commands::App {
            command: AppCommand::List(command),
        } => command_app_list(config_path, &command),
        Commands::Stats => command_stats(config_path),
        Commands::Events(command) => command_events(config_path, &command),
        Commands::Config {
            command: ConfigCommand::Validate,
        } => command_config_validate(config_path),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes `init`.
fn command_init(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    let admin_key = config
        .admin
        .resolve(&config.input_limits())
        .map_err(|err| CliError::new(format!("admin key resolution failed: {err}")))?;
    let audit = audit_sink_from_config(&config.audit)
        .map_err(|err| CliError::new(format!("audit sink unavailable: {err}")))?;
    let (_service, report) = MiniAppService::start(&config, &admin_key, audit)
        .map_err(|err| CliError::new(format!("startup failed: {err}")))?;
    let generated_admin_key =
        (admin_key.source() == AdminKeySource::Generated).then(|| admin_key.secret());
    write_json(&InitOutput {
        report: &report,
        generated_admin_key,
    })?;
    Ok(ExitCode::SUCCESS)
}

/// Dispatches user subcommands.
fn command_user(config_path: Option<&Path>, command: UserCommand) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    match command {
        UserCommand::Add(command) => {
            let limits = config.input_limits();
            limits.key(&command.key).map_err(|err| CliError::new(err.to_string()))?;
            limits
                .comment(command.comment.as_deref())
                .map_err(|err| CliError::new(err.to_string()))?;
            let id = store
                .create_user(&command.key, command.comment.as_deref())
                .map_err(|err| CliError::new(format!("user creation failed: {err}")))?;
            write_json(&CreatedUser {
                id,
            })?;
        }
        UserCommand::List(command) => {
            let users = store.list_users().map_err(store_error)?;
            let stats = store.aggregate_stats().map_err(store_error)?;
            write_json(&user_rows(users, &stats, command.show_keys))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `app list`.
fn command_app_list(config_path: Option<&Path>, command: &AppListCommand) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    let scope = command.owner.map_or(AppScope::All, AppScope::Owner);
    write_json(&store.list_apps(scope).map_err(store_error)?)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `stats`.
fn command_stats(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    write_json(&store.aggregate_stats().map_err(store_error)?)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `events`.
fn command_events(config_path: Option<&Path>, command: &EventsCommand) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    let store = open_store(&config)?;
    let events = store
        .recent_events(usize::from(command.limit))
        .map_err(|err| CliError::new(format!("store error: {err}")))?;
    write_json(&events)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `config validate`.
fn command_config_validate(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let _config = load_config(config_path)?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error(&err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<MiniAppConfig> {
    MiniAppConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// Opens the configured store and converges its schema.
fn open_store(config: &MiniAppConfig) -> CliResult<SqliteMiniAppStore> {
    let store = SqliteMiniAppStore::open(&config.store.sqlite_config())
        .map_err(|err| CliError::new(format!("store open failed: {err}")))?;
    store
        .ensure_schema(config.schema_options())
        .map_err(|err| CliError::new(format!("schema convergence failed: {err}")))?;
    Ok(store)
}

/// Parses a positive user identifier.
fn parse_user_id(raw: &str) -> Result<UserId, String> {
    raw.parse::<u64>()
        .ok()
        .and_then(UserId::from_raw)
        .ok_or_else(|| "expected a positive user id".to_string())
}

/// Merges users with their counters.
fn user_rows(users: Vec<User>, stats: &UsageStats, show_keys: bool) -> Vec<UserRow> {
    users
        .into_iter()
        .map(|user| UserRow {
            id: user.id,
            key: show_keys.then_some(user.key),
            comment: user.comment,
            created_at: user.created_at,
            stats: stats.get(user.id),
        })
        .collect()
}

/// Formats a store error.
#[allow(clippy::needless_pass_by_value, reason = "Used as a map_err adapter.")]
fn store_error(error: StoreError) -> CliError {
    CliError::new(format!("store error: {error}"))
}

/// Writes pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("json serialization failed: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error(&err)))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(error: &std::io::Error) -> String {
    format!("failed to write to stdout: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
