mod cli;
mod core;
mod tui;

use std::fs::File;
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, UiArgs};
use crate::core::error::RenderError;

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_logging(&cli) {
        eprintln!("{err}");
        std::process::exit(1);
    }

    let command = cli.command.unwrap_or(Commands::Ui(UiArgs::default()));
    match cli::execute(command) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

// The UI owns the terminal, so without a log file it logs nowhere.
fn init_logging(cli: &Cli) -> Result<(), RenderError> {
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match &cli.log_file {
        Some(path) => {
            let file = File::create(path).map_err(|err| RenderError::Terminal {
                message: format!("cannot open log file {}: {err}", path.display()),
            })?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None if cli.is_interactive() => {}
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .try_init();
        }
    }

    Ok(())
}
