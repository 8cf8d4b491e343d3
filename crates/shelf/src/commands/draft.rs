//! Draft command — derive a new draft from a release.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use shelf_core::library::LibraryId;

use super::{Session, SourceArgs, print_json, print_library};

/// Arguments for the `draft` subcommand.
#[derive(Args, Debug)]
pub struct DraftArgs {
    /// Id of the release to draft from
    pub id: LibraryId,

    /// Name for the new draft (defaults to the release's name)
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    #[command(flatten)]
    pub source: SourceArgs,
}

/// Create a new draft carrying the release's version forward.
#[instrument(name = "cmd_draft", skip_all, fields(id = %args.id))]
pub fn cmd_draft(args: DraftArgs, global_json: bool, session: &Session) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing draft command");

    let user = session.user()?;
    let source = args.source.require()?;
    let name = match args.name {
        Some(name) => name,
        None => session.service.library(&args.id)?.name,
    };

    let draft = session
        .service
        .create_draft(&args.id, &name, &source, user)
        .context("failed to create draft")?;

    if global_json {
        print_json(&draft)?;
    } else {
        println!(
            "  {} Drafted {} from {}",
            "✓".green(),
            draft.name.bold(),
            draft.version.to_string().cyan()
        );
        print_library(&draft);
    }
    Ok(())
}
