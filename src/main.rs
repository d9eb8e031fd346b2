mod cli;
mod commands;
mod config;
mod manifest;
mod progress;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::AzdoConfig;
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config_path: Option<PathBuf>,
    pub config: AzdoConfig,
    pub org_url: Option<String>,
    pub token: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "azdo", &mut io::stdout());
        return Ok(());
    }

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: AzdoConfig::load(cli.config.as_deref())?,
        config_path: cli.config,
        org_url: cli.org_url,
        token: cli.token,
    };
    log::trace!("verbosity {} (quiet: {})", ctx.verbose, ctx.quiet);

    let result = match cli.command {
        Command::Plan(args) => commands::apply::plan_command(&ctx, args),
        Command::Apply(args) => commands::apply::apply(&ctx, args),
        Command::Destroy(args) => commands::apply::destroy(&ctx, args),
        Command::Project(cmd) => commands::project::run(&ctx, cmd),
        Command::Projects => commands::catalog::projects(&ctx),
        Command::Processes => commands::catalog::processes(&ctx),
        Command::Config(cmd) => commands::config::run(&ctx, cmd),
        Command::Completions { .. } => Ok(()),
    };

    if let Err(err) = &result {
        if let Some(azdo_err) = err.downcast_ref::<azdokit::Error>() {
            let category = azdo_err.category();
            ui::error(&format!("{category}: {err:#}"));
            ui::dim(category.advice());
            std::process::exit(1);
        }
    }
    result
}
