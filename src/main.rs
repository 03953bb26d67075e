mod agents;
mod cancel;
mod cli;
mod config;
mod digest;
mod error;
mod notify;
mod registry;
mod runtime;
mod utils;
mod workflow;

use clap::Parser;
use cli::{Action, Cli};
use colored::Colorize;
use config::Settings;
use error::{DockcheckError, Result};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);
    if cli.no_color || std::env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            match e {
                DockcheckError::UserCancelled | DockcheckError::Cancelled => 130,
                _ => 1,
            }
        }
    };
    process::exit(code);
}

fn init_logging(verbose: bool) {
    let default = if verbose { "dockcheck=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<i32> {
    if cli.action() == Action::Configure {
        workflow::execute_configure(cli.config.as_deref())?;
        return Ok(0);
    }

    let settings = cli.apply_overrides(Settings::load(cli.config.as_deref())?);
    settings.validate()?;

    match cli.action() {
        Action::Check => {
            let cancel = cancel::CancellationToken::new();
            cancel::install_interrupt_handler(&cancel);
            let summary = workflow::execute_check(&settings, &cancel)?;
            Ok(summary.exit_code())
        }
        Action::TestNotify => workflow::execute_test_notify(&settings).map(|()| 0),
        Action::ListBackups => workflow::execute_list_backups(&settings).map(|()| 0),
        Action::CleanupBackups(days) => {
            workflow::execute_cleanup_backups(&settings, days).map(|()| 0)
        }
        Action::Configure => Ok(0),
    }
}
