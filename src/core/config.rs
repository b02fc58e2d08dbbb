use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_FPS: u32 = 25;
pub const DEFAULT_BASE_NAME: &str = "frame_";
pub const DEFAULT_RENDERER: &str = "Redshift";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Exr,
    Tif,
    Jpg,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [Self::Png, Self::Exr, Self::Tif, Self::Jpg];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Exr => "exr",
            Self::Tif => "tif",
            Self::Jpg => "jpg",
        }
    }

    /// Next format in UI cycling order, wrapping around.
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == lower)
            .ok_or_else(|| format!("unknown format '{s}' (expected png, exr, tif or jpg)"))
    }
}

/// Every parameter of one render invocation.
///
/// Serialized field names match the `.c4drs.json` preset layout, so presets
/// written by older tooling load unchanged. Missing keys fall back to
/// [`RenderConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    #[serde(rename = "c4d_cmd")]
    pub executable: String,
    pub scene_path: String,
    pub output_dir: String,
    pub base_name: String,
    pub format: OutputFormat,
    pub override_format: bool,
    #[serde(rename = "override_res")]
    pub override_resolution: bool,
    #[serde(rename = "res_w")]
    pub width: u32,
    #[serde(rename = "res_h")]
    pub height: u32,
    pub use_duration: bool,
    pub duration_seconds: f64,
    pub fps: u32,
    pub start_frame: i64,
    pub end_frame: i64,
    pub renderer: String,
    pub force_renderer: bool,
    /// 0 means all available threads.
    pub threads: u32,
    pub extra_args: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            executable: String::new(),
            scene_path: String::new(),
            output_dir: String::new(),
            base_name: DEFAULT_BASE_NAME.to_string(),
            format: OutputFormat::Png,
            override_format: true,
            override_resolution: false,
            width: 1920,
            height: 1080,
            use_duration: true,
            duration_seconds: 15.0,
            fps: DEFAULT_FPS,
            start_frame: 0,
            end_frame: 100,
            renderer: DEFAULT_RENDERER.to_string(),
            force_renderer: true,
            threads: 0,
            extra_args: String::new(),
        }
    }
}

impl RenderConfig {
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Applies the same cleanup the form performs when syncing into a config.
    /// Extra args are left untouched since leading quotes may matter.
    pub fn normalized(mut self) -> Self {
        self.executable = self.executable.trim().to_string();
        self.scene_path = self.scene_path.trim().to_string();
        self.output_dir = self.output_dir.trim().to_string();

        let base = self.base_name.trim();
        self.base_name = if base.is_empty() {
            DEFAULT_BASE_NAME.to_string()
        } else {
            base.to_string()
        };

        let renderer = self.renderer.trim();
        self.renderer = if renderer.is_empty() {
            DEFAULT_RENDERER.to_string()
        } else {
            renderer.to_string()
        };

        if self.fps == 0 {
            self.fps = DEFAULT_FPS;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_render_tool_conventions() {
        let cfg = RenderConfig::default();
        assert_eq!(cfg.base_name, "frame_");
        assert_eq!(cfg.renderer, "Redshift");
        assert_eq!(cfg.fps, 25);
        assert_eq!(cfg.format, OutputFormat::Png);
        assert!(cfg.override_format);
        assert!(!cfg.override_resolution);
        assert!(cfg.use_duration);
        assert_eq!(cfg.threads, 0);
        assert!(cfg.executable.is_empty());
    }

    #[test]
    fn normalized_fills_blank_fields() {
        let cfg = RenderConfig {
            executable: "  /opt/c4d/Commandline ".to_string(),
            scene_path: " /s.c4d ".to_string(),
            base_name: "   ".to_string(),
            renderer: String::new(),
            fps: 0,
            extra_args: " --keep ".to_string(),
            ..RenderConfig::default()
        }
        .normalized();

        assert_eq!(cfg.executable, "/opt/c4d/Commandline");
        assert_eq!(cfg.scene_path, "/s.c4d");
        assert_eq!(cfg.base_name, "frame_");
        assert_eq!(cfg.renderer, "Redshift");
        assert_eq!(cfg.fps, 25);
        assert_eq!(cfg.extra_args, " --keep ");
    }

    #[test]
    fn format_parses_case_insensitively_and_cycles() {
        assert_eq!("EXR".parse::<OutputFormat>(), Ok(OutputFormat::Exr));
        assert!("gif".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Jpg.next(), OutputFormat::Png);
        assert_eq!(OutputFormat::Png.next(), OutputFormat::Exr);
    }
}
