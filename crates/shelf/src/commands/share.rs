//! Share and unshare commands — manage a library set's access list.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use shelf_core::library::{LibrarySet, Role, SetId, UserId};

use super::{Session, print_json};

/// Arguments for the `share` subcommand.
#[derive(Args, Debug)]
pub struct ShareArgs {
    /// Library set id
    pub set_id: SetId,

    /// User to grant access to
    pub grantee: String,

    /// Role to grant
    #[arg(long, value_enum, default_value_t = Role::Read)]
    pub role: Role,
}

/// Arguments for the `unshare` subcommand.
#[derive(Args, Debug)]
pub struct UnshareArgs {
    /// Library set id
    pub set_id: SetId,

    /// User whose access is removed
    pub grantee: String,
}

/// Grant a role on a set.
#[instrument(name = "cmd_share", skip_all, fields(set_id = %args.set_id))]
pub fn cmd_share(args: ShareArgs, global_json: bool, session: &Session) -> anyhow::Result<()> {
    debug!(json_output = global_json, role = %args.role, "executing share command");

    let user = session.user()?;
    let grantee = UserId::from(args.grantee);
    let set = session
        .service
        .grant_access(&args.set_id, &grantee, args.role, user)
        .context("failed to share library set")?;

    if global_json {
        print_json(&set)?;
    } else {
        println!(
            "  {} {} can now {} library set {}",
            "✓".green(),
            grantee.to_string().bold(),
            args.role.to_string().cyan(),
            set.id
        );
        print_acl(&set);
    }
    Ok(())
}

/// Remove a user from a set's access list.
#[instrument(name = "cmd_unshare", skip_all, fields(set_id = %args.set_id))]
pub fn cmd_unshare(args: UnshareArgs, global_json: bool, session: &Session) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing unshare command");

    let user = session.user()?;
    let grantee = UserId::from(args.grantee);
    let set = session
        .service
        .revoke_access(&args.set_id, &grantee, user)
        .context("failed to unshare library set")?;

    if global_json {
        print_json(&set)?;
    } else {
        println!(
            "  {} {} no longer has access to library set {}",
            "✓".green(),
            grantee.to_string().bold(),
            set.id
        );
        print_acl(&set);
    }
    Ok(())
}

/// Print a set's owner and access list.
pub fn print_acl(set: &LibrarySet) {
    println!("  {}: {}", "Owner".dimmed(), set.owner.to_string().bold());
    if set.acl.is_empty() {
        println!("  {} {}", "○".dimmed(), "Not shared".dimmed());
    }
    for entry in &set.acl {
        let roles: Vec<String> = entry.roles.iter().map(ToString::to_string).collect();
        println!("  {}: {}", entry.user.to_string().dimmed(), roles.join(", ").cyan());
    }
}
