// fathom-cli/src/main.rs
// ============================================================================
// Module: Fathom CLI Entry Point
// Description: Thin command dispatcher over `fathom-config`/`fathom-store-sqlite`/
//              `fathom-server`.
// Purpose: `spec.md` §6.2 command table.
// Dependencies: clap, fathom-config, fathom-server, fathom-store-sqlite, thiserror, tokio
// ============================================================================

//! ## Overview
//! Every subcommand loads a [`fathom_config::Config`] the same way the
//! library does (`Config::load`), then either opens the store at
//! `config.db_path` for a maintenance/read operation or starts the HTTP
//! server. All user-facing output goes through [`write_stdout_line`]/
//! [`write_stderr_line`] rather than `println!`/`eprintln!`.

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use fathom_config::Config;
use fathom_config::ConfigOverrides;
use fathom_config::Preset;
use fathom_core::core::identifiers::RunId;
use fathom_server::ServerConfig;
use fathom_store_sqlite::Page;
use fathom_store_sqlite::RunFilter;
use fathom_store_sqlite::SqliteStore;
use fathom_store_sqlite::SqliteStoreError;
use fathom_store_sqlite::MAX_PAGE_LIMIT;
use thiserror::Error;

/// Template written by `fathom init`.
const INIT_TEMPLATE: &str = include_str!("fathom.toml.template");

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "fathom", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Path to a config file; overrides `TRACE_CONFIG` and the default probe.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Writes a starter `fathom.toml` in the current directory.
    Init,
    /// Starts the HTTP read API.
    Server(ServerArgs),
    /// Prints aggregate run/step counts and database size.
    Stats,
    /// Deletes runs older than the retention window.
    Prune(PruneArgs),
    /// Reclaims free space in the database file.
    Vacuum,
    /// Takes an online backup of the database file.
    Backup(BackupArgs),
    /// Dumps one run, or every run, as JSON.
    Export(ExportArgs),
    /// Shows or validates the effective configuration.
    Config(ConfigArgs),
}

/// Arguments for `server`.
#[derive(Args, Debug)]
struct ServerArgs {
    /// Interface to bind; overrides the config default.
    #[arg(long)]
    host: Option<String>,
    /// Port to bind; overrides the config default.
    #[arg(long)]
    port: Option<u16>,
}

/// Arguments for `prune`.
#[derive(Args, Debug)]
struct PruneArgs {
    /// Delete runs started more than this many days ago; defaults to the
    /// configured `retention_days`.
    #[arg(long)]
    retention_days: Option<u64>,
    /// Reclaim the freed space afterward.
    #[arg(long, action = ArgAction::SetTrue)]
    vacuum: bool,
}

/// Arguments for `backup`.
#[derive(Args, Debug)]
struct BackupArgs {
    /// Destination path for the backup file.
    destination: PathBuf,
}

/// Arguments for `export`.
#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("target").required(true).args(["run_id", "all"])))]
struct ExportArgs {
    /// Run to export.
    run_id: Option<String>,
    /// Export every run instead of a single one.
    #[arg(long, action = ArgAction::SetTrue)]
    all: bool,
    /// Caps the number of runs exported under `--all`.
    #[arg(long)]
    limit: Option<u64>,
    /// Writes the export to a file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Arguments for `config`.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Prints the effective option table.
    #[arg(long, action = ArgAction::SetTrue)]
    show: bool,
    /// Preset to load before file/environment overrides.
    #[arg(long, value_parser = parse_preset, default_value = "production")]
    profile: Preset,
}

/// clap value parser for `--profile`.
fn parse_preset(value: &str) -> Result<Preset, String> {
    Preset::parse(value).map_err(|err| err.to_string())
}

/// CLI error wrapper carrying an already human-readable message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Wraps an already human-readable message.
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Parses arguments and dispatches to the selected subcommand.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        write_stdout_line(&format!("fathom {}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        write_stderr_line("no subcommand given; see --help")
            .map_err(|err| CliError::new(output_error("stderr", &err)))?;
        return Ok(ExitCode::FAILURE);
    };

    match command {
        Commands::Init => command_init(),
        Commands::Server(args) => command_server(cli.config.as_deref(), args).await,
        Commands::Stats => command_stats(cli.config.as_deref()),
        Commands::Prune(args) => command_prune(cli.config.as_deref(), args),
        Commands::Vacuum => command_vacuum(cli.config.as_deref()),
        Commands::Backup(args) => command_backup(cli.config.as_deref(), args),
        Commands::Export(args) => command_export(cli.config.as_deref(), args),
        Commands::Config(args) => command_config(cli.config.as_deref(), args),
    }
}

// ============================================================================
// SECTION: init
// ============================================================================

/// Writes a starter `fathom.toml` in the current directory.
fn command_init() -> CliResult<ExitCode> {
    let path = Path::new("fathom.toml");
    if path.exists() {
        return Err(CliError::new(format!("{} already exists", path.display())));
    }
    fs::write(path, INIT_TEMPLATE)
        .map_err(|err| CliError::new(format!("failed to write {}: {err}", path.display())))?;
    write_stdout_line(&format!("wrote {}", path.display()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: server
// ============================================================================

/// Opens the configured store and runs the HTTP read API until shutdown.
async fn command_server(config_path: Option<&Path>, args: ServerArgs) -> CliResult<ExitCode> {
    let trace_config = load_config(config_path, Preset::Production)?;

    let mut server_config = ServerConfig::default();
    if let Some(host) = args.host {
        server_config.host = host;
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }

    let store = Arc::new(
        SqliteStore::open(&trace_config.db_path)
            .map_err(|err| CliError::new(format!("failed to open store: {err}")))?,
    );

    write_stdout_line(&format!("fathom-server listening on {}", server_config.bind_address()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;

    fathom_server::serve(store, trace_config, server_config)
        .await
        .map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: stats
// ============================================================================

/// Prints aggregate run/step counts and the database file size.
fn command_stats(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(config_path, Preset::Production)?;
    let store = open_store(&config)?;
    let report = store
        .stats(&config.db_path)
        .map_err(|err| CliError::new(format!("stats failed: {err}")))?;

    for (status, count) in &report.runs_by_status {
        write_stdout_line(&format!("runs.{status}: {count}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    for (event_type, count) in &report.steps_by_event_type {
        write_stdout_line(&format!("steps.{event_type}: {count}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    write_stdout_line(&format!("database_bytes: {}", report.total_bytes))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: prune / vacuum / backup
// ============================================================================

/// Deletes runs older than the retention window, optionally vacuuming after.
fn command_prune(config_path: Option<&Path>, args: PruneArgs) -> CliResult<ExitCode> {
    let config = load_config(config_path, Preset::Production)?;
    let store = open_store(&config)?;
    let retention_days = args.retention_days.unwrap_or(config.retention_days);
    let now_ms = now_unix_ms()?;

    let deleted = store
        .prune(retention_days, now_ms)
        .map_err(|err| CliError::new(format!("prune failed: {err}")))?;
    write_stdout_line(&format!("pruned {deleted} run(s) older than {retention_days} day(s)"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;

    if args.vacuum {
        store.vacuum().map_err(|err| CliError::new(format!("vacuum failed: {err}")))?;
        write_stdout_line("vacuum complete")
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Reclaims free space in the database file.
fn command_vacuum(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(config_path, Preset::Production)?;
    let store = open_store(&config)?;
    store.vacuum().map_err(|err| CliError::new(format!("vacuum failed: {err}")))?;
    write_stdout_line("vacuum complete").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Takes an online backup of the database file.
fn command_backup(config_path: Option<&Path>, args: BackupArgs) -> CliResult<ExitCode> {
    let config = load_config(config_path, Preset::Production)?;
    let store = open_store(&config)?;
    store
        .backup(&args.destination)
        .map_err(|err| CliError::new(format!("backup failed: {err}")))?;
    write_stdout_line(&format!("backed up to {}", args.destination.display()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: export
// ============================================================================

/// Dumps one run, or every run, as JSON, to a file or to stdout.
fn command_export(config_path: Option<&Path>, args: ExportArgs) -> CliResult<ExitCode> {
    let config = load_config(config_path, Preset::Production)?;
    let store = open_store(&config)?;

    let body = if args.all {
        let limit = args.limit.unwrap_or(MAX_PAGE_LIMIT);
        let page = Page { limit, offset: 0 };
        let (runs, _total) = store
            .list_runs(&RunFilter::default(), page)
            .map_err(|err| CliError::new(format!("list_runs failed: {err}")))?;
        let mut exported = Vec::with_capacity(runs.len());
        for run in runs {
            let (run, steps) = store
                .export_run(&config, &run.run_id)
                .map_err(|err| CliError::new(format!("export failed: {err}")))?;
            exported.push(serde_json::json!({ "run": run, "steps": steps }));
        }
        serde_json::Value::Array(exported)
    } else {
        let raw = args.run_id.as_deref().unwrap_or_default();
        let run_id = RunId::from_raw(raw.to_owned());
        let (run, steps) = store.export_run(&config, &run_id).map_err(|err| match err {
            SqliteStoreError::NotFound(id) => CliError::new(format!("no such run: {id}")),
            other => CliError::new(format!("export failed: {other}")),
        })?;
        serde_json::json!({ "run": run, "steps": steps })
    };

    let text = serde_json::to_string_pretty(&body)
        .map_err(|err| CliError::new(format!("failed to render export: {err}")))?;

    match args.output {
        Some(path) => {
            fs::write(&path, text)
                .map_err(|err| CliError::new(format!("failed to write {}: {err}", path.display())))?;
            write_stdout_line(&format!("wrote {}", path.display()))
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
        None => {
            write_stdout_line(&text).map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: config
// ============================================================================

/// Shows or validates the effective configuration for the chosen profile.
fn command_config(config_path: Option<&Path>, args: ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(config_path, args.profile)?;
    if args.show {
        for (field, value) in config.describe() {
            write_stdout_line(&format!("{field} = {value}"))
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
    } else {
        write_stdout_line("config is valid").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: shared helpers
// ============================================================================

/// Loads the effective config for `preset`, layering in `config_path`/env.
fn load_config(config_path: Option<&Path>, preset: Preset) -> CliResult<Config> {
    Config::load(preset, config_path, ConfigOverrides::default())
        .map_err(|err| CliError::new(format!("config error: {err}")))
}

/// Opens the store at `config.db_path`.
fn open_store(config: &Config) -> CliResult<SqliteStore> {
    SqliteStore::open(&config.db_path)
        .map_err(|err| CliError::new(format!("failed to open store at {}: {err}", config.db_path.display())))
}

/// Returns the current wall-clock time in Unix milliseconds.
fn now_unix_ms() -> CliResult<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| CliError::new(format!("system clock error: {err}")))?;
    i64::try_from(duration.as_millis()).map_err(|_| CliError::new("system clock overflowed i64 milliseconds"))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    use std::io::Write as _;
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    use std::io::Write as _;
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an I/O failure on one of the output streams.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use clap::Parser as _;

    use super::parse_preset;
    use super::Cli;
    use super::Commands;
    use super::ExportArgs;

    #[test]
    fn cli_definition_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_preset_accepts_known_names_and_rejects_others() {
        assert!(parse_preset("production").is_ok());
        assert!(parse_preset("development").is_ok());
        assert!(parse_preset("debug").is_ok());
        assert!(parse_preset("nonsense").is_err());
    }

    #[test]
    fn export_requires_either_run_id_or_all() {
        let err = Cli::try_parse_from(["fathom", "export"]).expect_err("should require a target");
        assert!(err.to_string().contains("required"));
    }

    #[test]
    fn export_rejects_run_id_together_with_all() {
        let err = Cli::try_parse_from(["fathom", "export", "run-1", "--all"])
            .expect_err("run_id and --all are mutually exclusive");
        assert!(err.to_string().contains("cannot be used"));
    }

    #[test]
    fn export_all_parses_without_a_run_id() {
        let cli = Cli::try_parse_from(["fathom", "export", "--all", "--limit", "10"])
            .expect("valid invocation");
        let Some(Commands::Export(ExportArgs { run_id, all, limit, .. })) = cli.command else {
            unreachable!("export subcommand");
        };
        assert!(run_id.is_none());
        assert!(all);
        assert_eq!(limit, Some(10));
    }
}
