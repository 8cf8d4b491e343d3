//! List command — show a library set and its libraries.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use shelf_core::library::{Library, LibrarySet, SetId};

use super::share::print_acl;
use super::{Session, print_json, state_label};

/// Arguments for the `list` subcommand.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Library set id
    pub set_id: SetId,
}

#[derive(Debug, Serialize)]
struct ListOutput {
    set: LibrarySet,
    libraries: Vec<Library>,
}

/// Print a set's owner, access list and libraries, releases first.
#[instrument(name = "cmd_list", skip_all, fields(set_id = %args.set_id))]
pub fn cmd_list(args: ListArgs, global_json: bool, session: &Session) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing list command");

    let set = session
        .service
        .library_set(&args.set_id)
        .context("failed to load library set")?;
    let libraries = session.service.libraries_in_set(&set.id)?;

    if global_json {
        return print_json(&ListOutput { set, libraries });
    }

    println!("{} {}", "Library set".bold(), set.id);
    print_acl(&set);
    println!();
    if libraries.is_empty() {
        println!("  {}", "No libraries".dimmed());
    }
    for library in &libraries {
        println!(
            "  {:<10} {:<24} {} {}",
            library.version.to_string().cyan(),
            library.name,
            state_label(library),
            library.id.to_string().dimmed()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::session;
    use shelf_core::version::ReleaseKind;

    #[test]
    fn lists_release_and_draft() {
        let (session, _) = session(Some("alice"));
        let user = session.user().unwrap().clone();
        let lib = session
            .service
            .create_library("core", "fhir", "define X: 1", &user)
            .unwrap();
        session
            .service
            .create_version(&lib.id, ReleaseKind::Minor, &user, None)
            .unwrap();
        session
            .service
            .create_draft(&lib.id, "core", "define X: 2", &user)
            .unwrap();

        cmd_list(ListArgs { set_id: lib.set_id }, false, &session).unwrap();
        cmd_list(ListArgs { set_id: lib.set_id }, true, &session).unwrap();
        assert_eq!(session.service.libraries_in_set(&lib.set_id).unwrap().len(), 2);
    }

    #[test]
    fn unknown_set_fails() {
        let (session, _) = session(None);
        assert!(cmd_list(ListArgs { set_id: SetId::new() }, true, &session).is_err());
    }
}
