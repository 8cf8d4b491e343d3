//! Command implementations

pub mod create;

pub mod doctor;

pub mod draft;

pub mod edit;

pub mod info;

pub mod list;

pub mod next_version;

pub mod release;

pub mod share;

pub mod show;

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;

use shelf_core::access::AccessPolicy;
use shelf_core::audit::JsonlAuditLog;
use shelf_core::config::Config;
use shelf_core::library::{Library, UserId};
use shelf_core::lifecycle::LifecycleService;
use shelf_core::store::FileStore;
use shelf_core::translator::{CommandTranslator, UnconfiguredTranslator};
use shelf_core::version::ReleaseKind;

/// A lifecycle service plus the user commands act as.
pub struct Session {
    /// The service commands run against.
    pub service: LifecycleService,
    user: Option<UserId>,
}

impl Session {
    /// Wrap a service and an optional acting user.
    pub fn new(service: LifecycleService, user: Option<UserId>) -> Self {
        Self { service, user }
    }

    /// Open the configured store, audit log and translator.
    pub fn from_config(config: &Config, user: Option<UserId>) -> anyhow::Result<Self> {
        let store_path = config
            .store_path()
            .context("cannot determine a store location; set [store] path in config")?;
        let store = FileStore::open(&store_path)
            .with_context(|| format!("failed to open library store at {store_path}"))?;

        let audit_path = config
            .audit_path()
            .context("cannot determine an audit log location; set [audit] path in config")?;
        let audit = JsonlAuditLog::open(&audit_path)
            .with_context(|| format!("failed to open audit log at {audit_path}"))?;

        let service = match CommandTranslator::from_config(config) {
            Some(translator) => LifecycleService::new(store, translator, audit),
            None => LifecycleService::new(store, UnconfiguredTranslator, audit),
        };
        let policy = AccessPolicy::from_config(config.access.as_ref());

        Ok(Self::new(service.with_policy(policy), user))
    }

    /// The acting user, required by every mutating command.
    pub fn user(&self) -> anyhow::Result<&UserId> {
        self.user.as_ref().context(
            "no acting user; pass --user, set SHELF_USER, or set `user` in the config file",
        )
    }

    /// The acting user, if one was given.
    pub fn user_opt(&self) -> Option<&UserId> {
        self.user.as_ref()
    }
}

/// Pick the acting user: `--user`, then `SHELF_USER`, then the config.
pub fn resolve_user(flag: Option<String>, env: Option<String>, config: &Config) -> Option<UserId> {
    flag.or(env)
        .or_else(|| config.user.clone())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .map(UserId::from)
}

/// Library source given inline or from a file.
#[derive(Args, Debug, Default, Clone)]
#[group(multiple = false)]
pub struct SourceArgs {
    /// Library source text
    #[arg(long, value_name = "TEXT")]
    pub source: Option<String>,

    /// Read library source from FILE (`-` for stdin)
    #[arg(long, value_name = "FILE")]
    pub source_file: Option<PathBuf>,
}

impl SourceArgs {
    /// The source text, if any was given.
    pub fn read(&self) -> anyhow::Result<Option<String>> {
        if let Some(ref text) = self.source {
            return Ok(Some(text.clone()));
        }
        let Some(ref path) = self.source_file else {
            return Ok(None);
        };
        if path.as_os_str() == "-" {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read source from stdin")?;
            return Ok(Some(text));
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read source file {}", path.display()))?;
        Ok(Some(text))
    }

    /// The source text, failing if none was given.
    pub fn require(&self) -> anyhow::Result<String> {
        match self.read()? {
            Some(text) => Ok(text),
            None => bail!("library source is required (--source or --source-file)"),
        }
    }
}

/// `--major` / `--minor` selector.
#[derive(Args, Debug, Clone, Copy)]
#[group(required = true, multiple = false)]
pub struct KindArgs {
    /// Release a new major version (X.0.000)
    #[arg(long)]
    pub major: bool,

    /// Release a new minor version (x.Y.000)
    #[arg(long)]
    pub minor: bool,
}

impl KindArgs {
    /// The selected release kind.
    pub const fn kind(self) -> ReleaseKind {
        if self.major {
            ReleaseKind::Major
        } else {
            ReleaseKind::Minor
        }
    }
}

/// Print any serializable value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Human-readable state label for a library.
pub fn state_label(library: &Library) -> String {
    if library.draft {
        "draft".yellow().to_string()
    } else {
        "released".green().to_string()
    }
}

/// Print the fields of a library for humans.
pub fn print_library(library: &Library) {
    println!(
        "{} {} ({})",
        library.name.bold(),
        library.version.to_string().cyan(),
        state_label(library)
    );
    println!("  {}: {}", "Id".dimmed(), library.id);
    println!("  {}: {}", "Set".dimmed(), library.set_id);
    println!("  {}: {}", "Model".dimmed(), library.model);
    if library.has_compile_errors {
        println!("  {}: {}", "Compile errors".dimmed(), "yes".red());
    }
    println!(
        "  {}: {} at {}",
        "Created".dimmed(),
        library.created_by,
        library.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  {}: {} at {}",
        "Modified".dimmed(),
        library.last_modified_by,
        library.last_modified_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}
