use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("scene path is required")]
    SceneRequired,
    #[error("output directory is required")]
    OutputDirRequired,
    #[error("end frame must be >= start frame (start={start}, end={end})")]
    InvalidFrameRange { start: i64, end: i64 },
    #[error("invalid extra arguments: {message}")]
    ExtraArgs { message: String },
    #[error("invalid value for {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("cannot create output folder {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("preset file {}: {source}", path.display())]
    PresetIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("preset file {} is not a valid preset: {source}", path.display())]
    PresetFormat {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("terminal error: {message}")]
    Terminal { message: String },
}

impl RenderError {
    /// Errors raised before anything touches the filesystem or a process.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::SceneRequired
                | Self::OutputDirRequired
                | Self::InvalidFrameRange { .. }
                | Self::ExtraArgs { .. }
                | Self::InvalidField { .. }
        )
    }

    pub(crate) fn terminal(err: impl std::fmt::Display) -> Self {
        Self::Terminal {
            message: err.to_string(),
        }
    }
}
