use std::fs;
use std::path::Path;
use std::sync::mpsc::Receiver;

pub mod command;
pub mod config;
pub mod error;
pub mod job;
pub mod locate;
pub mod preset;
pub mod runner;

use command::RenderCommand;
use config::RenderConfig;
use error::RenderError;
use runner::RunEvent;

/// Builds the command and makes sure the output folder exists. Nothing is
/// created when validation fails.
pub fn prepare(cfg: &RenderConfig) -> Result<RenderCommand, RenderError> {
    let command = command::build(cfg)?;

    let output_dir = Path::new(&cfg.output_dir);
    fs::create_dir_all(output_dir).map_err(|source| RenderError::OutputDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    Ok(command)
}

pub fn start(command: &RenderCommand) -> Receiver<RunEvent> {
    tracing::info!(
        program = command.program().unwrap_or("<none>"),
        command = %command.display,
        "starting render"
    );
    runner::spawn(command.args.clone())
}
