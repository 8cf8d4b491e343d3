//! Show command — display one library.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use shelf_core::access::{Capability, is_creator};
use shelf_core::library::{Library, LibraryId};

use super::{Session, print_json, print_library};

/// Arguments for the `show` subcommand.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Library id
    pub id: LibraryId,

    /// Include the library source
    #[arg(long)]
    pub source: bool,
}

/// What the acting user may do with a library.
#[derive(Debug, Serialize)]
struct Permissions {
    user: String,
    can_edit: bool,
    can_release: bool,
    capabilities: Vec<Capability>,
}

#[derive(Debug, Serialize)]
struct ShowOutput {
    #[serde(flatten)]
    library: Library,
    #[serde(skip_serializing_if = "Option::is_none")]
    permissions: Option<Permissions>,
}

/// Print a library and, with an acting user, that user's rights on it.
#[instrument(name = "cmd_show", skip_all, fields(id = %args.id))]
pub fn cmd_show(args: ShowArgs, global_json: bool, session: &Session) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing show command");

    let library = session
        .service
        .library(&args.id)
        .context("failed to load library")?;

    let permissions = match session.user_opt() {
        Some(user) => {
            let capabilities = session.service.capabilities(&library.set_id, user)?;
            Some(Permissions {
                user: user.to_string(),
                can_edit: library.draft && !capabilities.is_empty(),
                can_release: library.draft && is_creator(&library, user),
                capabilities,
            })
        }
        None => None,
    };

    if global_json {
        return print_json(&ShowOutput {
            library,
            permissions,
        });
    }

    print_library(&library);
    if let Some(perms) = permissions {
        println!();
        println!("  {} {}", "As".dimmed(), perms.user.bold());
        print_flag("edit", perms.can_edit);
        print_flag("release", perms.can_release);
        if !perms.capabilities.is_empty() {
            let names: Vec<String> = perms.capabilities.iter().map(ToString::to_string).collect();
            println!("  {}: {}", "Via".dimmed(), names.join(", "));
        }
    }
    if args.source {
        println!();
        println!("{}", library.source);
    }
    Ok(())
}

fn print_flag(label: &str, allowed: bool) {
    if allowed {
        println!("  {} can {label}", "✓".green());
    } else {
        println!("  {} cannot {label}", "✗".red());
    }
}
