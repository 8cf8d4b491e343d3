//! Next-version command — preview the version a release would get.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use serde_json::json;
use tracing::{debug, instrument};

use shelf_core::library::LibraryId;

use super::{KindArgs, Session, print_json};

/// Arguments for the `next-version` subcommand.
#[derive(Args, Debug)]
pub struct NextVersionArgs {
    /// Id of the draft
    pub id: LibraryId,

    #[command(flatten)]
    pub kind: KindArgs,
}

/// Print the version `release` would assign, without releasing.
#[instrument(name = "cmd_next_version", skip_all, fields(id = %args.id))]
pub fn cmd_next_version(
    args: NextVersionArgs,
    global_json: bool,
    session: &Session,
) -> anyhow::Result<()> {
    let kind = args.kind.kind();
    debug!(json_output = global_json, %kind, "executing next-version command");

    let version = session
        .service
        .next_version(&args.id, kind)
        .context("failed to compute next version")?;

    if global_json {
        print_json(&json!({
            "id": args.id,
            "kind": kind,
            "version": version,
        }))?;
    } else {
        println!("{}", version.to_string().cyan());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::session;
    use shelf_core::version::{ReleaseKind, Version};

    #[test]
    fn previews_without_writing() {
        let (session, store) = session(Some("alice"));
        let user = session.user().unwrap().clone();
        let lib = session
            .service
            .create_library("core", "fhir", "define X: 1", &user)
            .unwrap();
        store.clear_writes();

        let args = NextVersionArgs {
            id: lib.id,
            kind: KindArgs {
                major: true,
                minor: false,
            },
        };
        cmd_next_version(args, true, &session).unwrap();
        assert_eq!(store.write_count(), 0);
        assert_eq!(
            session.service.next_version(&lib.id, ReleaseKind::Major).unwrap(),
            Version::new(1, 0, 0)
        );
    }
}
