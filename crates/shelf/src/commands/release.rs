//! Release command — turn a draft into the next major or minor version.

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use shelf_core::library::LibraryId;

use super::{KindArgs, Session, print_json, print_library};

/// Arguments for the `release` subcommand.
#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Id of the draft to release
    pub id: LibraryId,

    #[command(flatten)]
    pub kind: KindArgs,

    /// Auth token forwarded to the translator
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Release a draft after validating its source.
#[instrument(name = "cmd_release", skip_all, fields(id = %args.id))]
pub fn cmd_release(args: ReleaseArgs, global_json: bool, session: &Session) -> anyhow::Result<()> {
    let kind = args.kind.kind();
    debug!(json_output = global_json, %kind, "executing release command");

    let user = session.user()?;
    let library = session.service.library(&args.id)?;

    let interactive = !global_json && !args.yes && std::io::stdin().is_terminal();
    if interactive {
        let next = session
            .service
            .next_version(&args.id, kind)
            .context("failed to compute next version")?;
        println!(
            "{}: {} → {}",
            library.name.bold(),
            library.version.to_string().dimmed(),
            next.to_string().green().bold()
        );
        let confirmed = Confirm::new(&format!("Release as {kind} version {next}?"))
            .with_default(true)
            .prompt()
            .context("confirmation prompt failed")?;
        if !confirmed {
            println!("{}", "Release cancelled.".yellow());
            return Ok(());
        }
    }

    let spinner = if global_json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!("Validating {}...", library.name));
    spinner.enable_steady_tick(Duration::from_millis(80));

    let result = session
        .service
        .create_version(&args.id, kind, user, args.token.as_deref());
    spinner.finish_and_clear();
    let released = result.context("release failed")?;

    if global_json {
        print_json(&released)?;
    } else {
        println!(
            "  {} Released {} {}",
            "✓".green().bold(),
            released.name.bold(),
            released.version.to_string().green().bold()
        );
        print_library(&released);
    }
    Ok(())
}
