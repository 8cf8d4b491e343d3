//! Edit command — change a draft's name or source.

use anyhow::{Context, bail};
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use shelf_core::LibraryEdit;
use shelf_core::library::LibraryId;

use super::{Session, SourceArgs, print_json, print_library};

/// Arguments for the `edit` subcommand.
#[derive(Args, Debug)]
pub struct EditArgs {
    /// Id of the draft to edit
    pub id: LibraryId,

    /// New library name
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Auth token forwarded to the translator
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,
}

/// Apply an edit to a draft.
#[instrument(name = "cmd_edit", skip_all, fields(id = %args.id))]
pub fn cmd_edit(args: EditArgs, global_json: bool, session: &Session) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing edit command");

    let user = session.user()?;
    let edit = LibraryEdit {
        name: args.name,
        source: args.source.read()?,
    };
    if edit == LibraryEdit::default() {
        bail!("nothing to change; pass --name, --source or --source-file");
    }

    let saved = session
        .service
        .update_draft(&args.id, &edit, user, args.token.as_deref())
        .context("failed to edit draft")?;

    if global_json {
        print_json(&saved)?;
    } else {
        println!("  {} Updated {}", "✓".green(), saved.name.bold());
        if saved.has_compile_errors {
            println!(
                "  {} {}",
                "!".yellow(),
                "Source has compile errors; fix them before releasing".yellow()
            );
        }
        print_library(&saved);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::session;

    fn rename(id: LibraryId, name: Option<&str>) -> EditArgs {
        EditArgs {
            id,
            name: name.map(str::to_string),
            source: SourceArgs::default(),
            token: None,
        }
    }

    #[test]
    fn renames_draft() {
        let (session, _) = session(Some("alice"));
        let user = session.user().unwrap().clone();
        let lib = session
            .service
            .create_library("core", "fhir", "define X: 1", &user)
            .unwrap();

        cmd_edit(rename(lib.id, Some("core-next")), true, &session).unwrap();
        assert_eq!(session.service.library(&lib.id).unwrap().name, "core-next");
    }

    #[test]
    fn empty_edit_is_rejected() {
        let (session, store) = session(Some("alice"));
        let user = session.user().unwrap().clone();
        let lib = session
            .service
            .create_library("core", "fhir", "define X: 1", &user)
            .unwrap();
        store.clear_writes();

        assert!(cmd_edit(rename(lib.id, None), true, &session).is_err());
        assert_eq!(store.write_count(), 0);
    }
}
