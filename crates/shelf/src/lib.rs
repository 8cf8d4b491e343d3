//! Library interface for the `shelf` CLI.
//!
//! This crate exposes the CLI's argument parser and command structure as a library,
//! primarily for documentation generation and testing. The actual entry point is
//! in `main.rs`.
//!
//! # Structure
//!
//! - [`Cli`] - The root argument parser (clap derive)
//! - [`Commands`] - Available subcommands
//! - [`commands`] - Command implementations
//!
//! # Documentation Generation
//!
//! The [`command()`] function returns the clap `Command` for generating man pages
//! and shell completions via `xtask`.

pub mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Configure global color output based on this choice.
    ///
    /// Call this once at startup to set the color mode.
    pub fn apply(self) {
        match self {
            Self::Auto => {} // owo-colors auto-detects by default
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

/// Environment variable naming the acting user.
pub const ENV_USER: &str = "SHELF_USER";

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG                Log filter (e.g., debug, shelf_core=trace)
    SHELF_USER              Acting user (when --user is not given)
    SHELF_LOG_PATH          Explicit log file path
    SHELF_LOG_DIR           Log directory
";
/// Command-line interface definition for shelf.
#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Draft and release lifecycle for versioned code libraries", long_about = None)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long, global = true)]
    pub chdir: Option<PathBuf>,

    /// Act as USER (overrides SHELF_USER and the `user` config key)
    #[arg(short, long, global = true, value_name = "USER")]
    pub user: Option<String>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available subcommands for the CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Create a new library as a draft in a new library set
    Create(commands::create::CreateArgs),

    /// Release a draft as the next major or minor version
    Release(commands::release::ReleaseArgs),

    /// Start a new draft from a released library
    Draft(commands::draft::DraftArgs),

    /// Edit a draft's name or source
    Edit(commands::edit::EditArgs),

    /// Grant a user a role on a library set
    Share(commands::share::ShareArgs),

    /// Remove a user's access to a library set
    Unshare(commands::share::UnshareArgs),

    /// Show a library
    Show(commands::show::ShowArgs),

    /// List the libraries in a library set
    List(commands::list::ListArgs),

    /// Preview the version a release would get
    NextVersion(commands::next_version::NextVersionArgs),

    /// Diagnose configuration and environment
    Doctor(commands::doctor::DoctorArgs),

    /// Show package information
    Info(commands::info::InfoArgs),
}

/// Returns the clap command for documentation generation
pub fn command() -> clap::Command {
    Cli::command()
}
