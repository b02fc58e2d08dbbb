//! Best-effort discovery of the Cinema 4D `Commandline` binary.
//!
//! Run once at startup; the result is only a default for the executable field.

use std::path::PathBuf;

const WINDOWS_CANDIDATES: [&str; 3] = [
    r"C:\Program Files\Maxon Cinema 4D 2025\Commandline.exe",
    r"C:\Program Files\Maxon Cinema 4D 2024\Commandline.exe",
    r"C:\Program Files\Maxon Cinema 4D R26\Commandline.exe",
];

const MAC_CANDIDATES: [&str; 3] = [
    "/Applications/Maxon Cinema 4D 2025/Commandline.app/Contents/MacOS/Commandline",
    "/Applications/Maxon Cinema 4D 2024/Commandline.app/Contents/MacOS/Commandline",
    "/Applications/Maxon Cinema 4D R26/Commandline.app/Contents/MacOS/Commandline",
];

pub trait ExecutableLocator {
    fn candidates(&self) -> Vec<PathBuf>;

    fn locate(&self) -> Option<PathBuf> {
        self.candidates().into_iter().find(|path| path.exists())
    }
}

/// Default install locations on Windows.
pub struct WindowsLocator;

impl ExecutableLocator for WindowsLocator {
    fn candidates(&self) -> Vec<PathBuf> {
        WINDOWS_CANDIDATES.iter().map(PathBuf::from).collect()
    }

    fn locate(&self) -> Option<PathBuf> {
        self.candidates()
            .into_iter()
            .find(|path| path.exists())
            .or_else(|| PathLocator::default().locate())
    }
}

/// Default install locations on macOS.
pub struct MacLocator;

impl ExecutableLocator for MacLocator {
    fn candidates(&self) -> Vec<PathBuf> {
        MAC_CANDIDATES.iter().map(PathBuf::from).collect()
    }

    fn locate(&self) -> Option<PathBuf> {
        self.candidates()
            .into_iter()
            .find(|path| path.exists())
            .or_else(|| PathLocator::default().locate())
    }
}

/// Looks the binary up on `PATH`.
pub struct PathLocator {
    pub binary: String,
}

impl Default for PathLocator {
    fn default() -> Self {
        Self {
            binary: "Commandline".to_string(),
        }
    }
}

impl ExecutableLocator for PathLocator {
    fn candidates(&self) -> Vec<PathBuf> {
        which::which_all(&self.binary)
            .map(|found| found.collect())
            .unwrap_or_default()
    }
}

pub fn host_locator() -> Box<dyn ExecutableLocator> {
    if cfg!(windows) {
        Box::new(WindowsLocator)
    } else if cfg!(target_os = "macos") {
        Box::new(MacLocator)
    } else {
        Box::new(PathLocator::default())
    }
}

/// Path of the first renderer found, or an empty string.
pub fn guess_executable() -> String {
    match host_locator().locate() {
        Some(path) => {
            tracing::info!(path = %path.display(), "found Commandline executable");
            path.to_string_lossy().into_owned()
        }
        None => {
            tracing::debug!("no Commandline executable found");
            String::new()
        }
    }
}
