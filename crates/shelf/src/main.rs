//! shelf CLI
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use shelf::commands::{self, Session, resolve_user};
use shelf::{Cli, Commands, ENV_USER};
use shelf_core::config::{Config, ConfigLoader};
use shelf_core::library::UserId;
use tracing::debug;

mod observability;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = camino::Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = cli.config {
        let config_path = camino::Utf8PathBuf::try_from(config_path.clone()).map_err(|e| {
            anyhow::anyhow!(
                "config path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
        loader = loader.with_file(&config_path);
    }
    let config = loader.load().context("failed to load configuration")?;

    let obs_config = observability::ObservabilityConfig::new(config.log_dir.clone());
    let env_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init_observability(&obs_config, env_filter)
        .context("failed to initialize logging/tracing")?;

    let user = resolve_user(cli.user.clone(), std::env::var(ENV_USER).ok(), &config);

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        user = ?user,
        "CLI initialized"
    );

    let result = run(cli.command, cli.json, &config, user.as_ref(), &cwd);
    if let Err(ref err) = result {
        tracing::error!(error = %err, "fatal error");
    }
    result
}

fn run(
    command: Commands,
    json: bool,
    config: &Config,
    user: Option<&UserId>,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    // Opening the store creates its file, so only commands that need it do so
    let session = || Session::from_config(config, user.cloned());

    match command {
        Commands::Create(args) => commands::create::cmd_create(args, json, &session()?),
        Commands::Release(args) => commands::release::cmd_release(args, json, &session()?),
        Commands::Draft(args) => commands::draft::cmd_draft(args, json, &session()?),
        Commands::Edit(args) => commands::edit::cmd_edit(args, json, &session()?),
        Commands::Share(args) => commands::share::cmd_share(args, json, &session()?),
        Commands::Unshare(args) => commands::share::cmd_unshare(args, json, &session()?),
        Commands::Show(args) => commands::show::cmd_show(args, json, &session()?),
        Commands::List(args) => commands::list::cmd_list(args, json, &session()?),
        Commands::NextVersion(args) => {
            commands::next_version::cmd_next_version(args, json, &session()?)
        }
        Commands::Doctor(args) => commands::doctor::cmd_doctor(args, json, config, user, cwd),
        Commands::Info(args) => commands::info::cmd_info(args, json, config, cwd),
    }
}
