//! Create command — start a new library in its own set.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use super::{Session, SourceArgs, print_json, print_library};

/// Arguments for the `create` subcommand.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Library name (unique, case-insensitive)
    pub name: String,

    /// Data model the source is written against
    #[arg(long, value_name = "MODEL")]
    pub model: String,

    #[command(flatten)]
    pub source: SourceArgs,
}

/// Create a library as a draft at `0.0.000`.
#[instrument(name = "cmd_create", skip_all, fields(name = %args.name))]
pub fn cmd_create(args: CreateArgs, global_json: bool, session: &Session) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing create command");

    let user = session.user()?;
    let source = args.source.require()?;
    let library = session
        .service
        .create_library(&args.name, &args.model, &source, user)
        .context("failed to create library")?;

    if global_json {
        print_json(&library)?;
    } else {
        println!("  {} Created library {}", "✓".green(), library.name.bold());
        print_library(&library);
    }
    Ok(())
}
