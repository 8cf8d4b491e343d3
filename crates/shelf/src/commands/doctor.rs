//! Doctor command — diagnose configuration and environment.

use camino::Utf8Path;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use shelf_core::config::{self, Config};
use shelf_core::library::UserId;
use shelf_core::translator::CommandTranslator;

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct DoctorReport {
    directories: DirectoryPaths,
    config: ConfigStatus,
    storage: StorageStatus,
    translator: TranslatorStatus,
    user: Option<String>,
    environment: EnvironmentInfo,
}

#[derive(Serialize)]
struct DirectoryPaths {
    config: Option<String>,
    data: Option<String>,
}

#[derive(Serialize)]
struct ConfigStatus {
    /// Path to loaded config file, if any
    file: Option<String>,
    /// Whether a config file was found
    found: bool,
}

#[derive(Serialize)]
struct StorageStatus {
    store: Option<String>,
    store_exists: bool,
    audit: Option<String>,
    audit_exists: bool,
}

#[derive(Serialize)]
struct TranslatorStatus {
    command: Option<String>,
    /// Whether the command's program resolves on PATH
    available: bool,
}

#[derive(Serialize)]
struct EnvironmentInfo {
    /// Current working directory
    cwd: Option<String>,
    /// Relevant environment variables
    env_vars: Vec<EnvVar>,
}

#[derive(Serialize)]
struct EnvVar {
    name: &'static str,
    value: Option<String>,
    description: &'static str,
}

impl EnvVar {
    fn read(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            value: std::env::var(name).ok(),
            description,
        }
    }
}

impl DoctorReport {
    fn gather(config: &Config, user: Option<&UserId>, cwd: &Utf8Path) -> Self {
        let config_file = config::find_project_config(cwd);
        let store = config.store_path();
        let audit = config.audit_path();
        let translator = CommandTranslator::from_config(config);

        Self {
            directories: DirectoryPaths {
                config: config::user_config_dir().map(|p| p.to_string()),
                data: config::user_data_dir().map(|p| p.to_string()),
            },
            config: ConfigStatus {
                found: config_file.is_some(),
                file: config_file.map(|p| p.to_string()),
            },
            storage: StorageStatus {
                store_exists: store.as_ref().is_some_and(|p| p.exists()),
                store: store.map(|p| p.to_string()),
                audit_exists: audit.as_ref().is_some_and(|p| p.exists()),
                audit: audit.map(|p| p.to_string()),
            },
            translator: TranslatorStatus {
                available: translator.as_ref().is_some_and(CommandTranslator::is_available),
                command: translator.map(|t| t.command().to_string()),
            },
            user: user.map(ToString::to_string),
            environment: EnvironmentInfo {
                cwd: Some(cwd.to_string()),
                env_vars: vec![
                    EnvVar::read(crate::ENV_USER, "Acting user"),
                    EnvVar::read("SHELF_LOG_PATH", "Explicit log file path"),
                    EnvVar::read("SHELF_LOG_DIR", "Log directory"),
                    EnvVar::read("XDG_CONFIG_HOME", "Override config directory"),
                    EnvVar::read("XDG_DATA_HOME", "Override data directory"),
                    EnvVar::read("RUST_LOG", "Log filter directive"),
                ],
            },
        }
    }
}

/// Run diagnostics and report configuration status.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `config` - Loaded configuration
/// * `user` - Resolved acting user, if any
/// * `cwd` - Current working directory
#[instrument(name = "cmd_doctor", skip_all, fields(json_output))]
pub fn cmd_doctor(
    _args: DoctorArgs,
    global_json: bool,
    config: &Config,
    user: Option<&UserId>,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing doctor command");

    let spinner = if global_json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Gathering diagnostics...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let report = DoctorReport::gather(config, user, cwd);
    spinner.finish_and_clear();

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Configuration".bold().underline());
    if let Some(ref file) = report.config.file {
        println!("  {} Config file: {}", "✓".green(), file.cyan());
    } else {
        println!("  {} No config file found", "○".yellow());
        offer_config_creation()?;
    }
    match report.user {
        Some(ref user) => println!("  {} Acting user: {}", "✓".green(), user.cyan()),
        None => println!(
            "  {} No acting user; pass --user or set {}",
            "○".yellow(),
            crate::ENV_USER
        ),
    }
    println!();

    println!("{}", "Storage".bold().underline());
    print_file("  Store", report.storage.store.as_deref(), report.storage.store_exists);
    print_file("  Audit log", report.storage.audit.as_deref(), report.storage.audit_exists);
    println!();

    println!("{}", "Translator".bold().underline());
    match report.translator.command {
        Some(ref command) if report.translator.available => {
            println!("  {} {}", "✓".green(), command.cyan());
        }
        Some(ref command) => {
            println!("  {} {} (program not found on PATH)", "✗".red(), command.cyan());
        }
        None => println!(
            "  {} Not configured; releases will fail until [translator] command is set",
            "○".yellow()
        ),
    }
    println!();

    println!("{}", "Directories".bold().underline());
    print_dir("  Config", report.directories.config.as_deref());
    print_dir("  Data", report.directories.data.as_deref());
    println!();

    println!("{}", "Environment".bold().underline());
    println!("  {}: {}", "Working directory".dimmed(), cwd.cyan());

    let set_vars: Vec<_> = report
        .environment
        .env_vars
        .iter()
        .filter(|v| v.value.is_some())
        .collect();

    if set_vars.is_empty() {
        println!("  {} No XDG/logging overrides set", "○".dimmed());
    } else {
        for var in set_vars {
            println!(
                "  {}: {}",
                var.name.dimmed(),
                var.value.as_deref().unwrap_or("").cyan()
            );
        }
    }

    Ok(())
}

fn print_dir(label: &str, path: Option<&str>) {
    print!("{}: ", label.dimmed());
    match path {
        Some(p) => println!("{}", p.cyan()),
        None => println!("{}", "(unavailable)".yellow()),
    }
}

fn print_file(label: &str, path: Option<&str>, exists: bool) {
    print!("{}: ", label.dimmed());
    match path {
        Some(p) if exists => println!("{}", p.cyan()),
        Some(p) => println!("{} {}", p.cyan(), "(not created yet)".dimmed()),
        None => println!("{}", "(unavailable)".yellow()),
    }
}

/// Offer to create a default config file when none exists.
fn offer_config_creation() -> anyhow::Result<()> {
    let Some(config_dir) = config::user_config_dir() else {
        return Ok(());
    };

    let config_path = config_dir.join("config.yaml");

    // Don't prompt if running non-interactively
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Ok(());
    }

    let create = Confirm::new("Create a default config file?")
        .with_default(false)
        .with_help_message(&format!("Will create {config_path}"))
        .prompt();

    if let Ok(true) = create {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_saphyr::to_string(&Config::default())?;
        std::fs::write(&config_path, yaml)?;
        println!("  {} Created {}", "✓".green(), config_path.cyan());
    }

    Ok(())
}
