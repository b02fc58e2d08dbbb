use std::path::PathBuf;
use std::sync::mpsc;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::core::config::{OutputFormat, RenderConfig};
use crate::core::error::RenderError;
use crate::core::{self, command, locate, preset, runner};
use crate::tui;

#[derive(Debug, Parser)]
#[command(
    name = "rsflow",
    version,
    about = "Cinema 4D / Redshift command-line render front-end"
)]
pub struct Cli {
    /// Write logs to FILE (the interactive UI logs nowhere otherwise)
    #[arg(long = "log-file", value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn is_interactive(&self) -> bool {
        matches!(self.command, None | Some(Commands::Ui(_)))
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interactive form with command preview and live render log (default)
    Ui(UiArgs),
    /// Print the command that would be run
    Preview(RenderArgs),
    /// Build the command, run the renderer and stream its output
    Run(RenderArgs),
    /// Write the resulting settings to a preset file
    Save(SaveArgs),
}

#[derive(Debug, Default, Args)]
pub struct UiArgs {
    /// Preset to load into the form on startup
    #[arg(long, value_name = "FILE")]
    pub preset: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SaveArgs {
    /// Destination preset file (conventionally *.c4drs.json)
    #[arg(value_name = "FILE")]
    pub path: PathBuf,
    #[command(flatten)]
    pub render: RenderArgs,
}

#[derive(Debug, Default, Args)]
pub struct RenderArgs {
    /// Start from this preset instead of the defaults
    #[arg(long, value_name = "FILE")]
    pub preset: Option<PathBuf>,
    /// Path to the Cinema 4D Commandline executable
    #[arg(long = "exe", value_name = "PATH")]
    pub executable: Option<String>,
    /// Scene file to render (.c4d)
    #[arg(long = "scene", value_name = "PATH")]
    pub scene_path: Option<String>,
    /// Folder the frames are written to
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<String>,
    /// Filename prefix of the rendered frames
    #[arg(long = "base-name", value_name = "NAME")]
    pub base_name: Option<String>,
    /// Output format override (png, exr, tif, jpg)
    #[arg(long)]
    pub format: Option<OutputFormat>,
    #[arg(long, overrides_with = "no_override_format")]
    pub override_format: bool,
    #[arg(long)]
    pub no_override_format: bool,
    /// Resolution override, e.g. 1920x1080
    #[arg(long, value_name = "WxH", value_parser = parse_resolution)]
    pub resolution: Option<(u32, u32)>,
    #[arg(long, conflicts_with = "resolution")]
    pub no_resolution: bool,
    /// Render duration in seconds (frames 0..round(duration x fps))
    #[arg(long, value_name = "SECONDS", conflicts_with = "frames")]
    pub duration: Option<f64>,
    #[arg(long)]
    pub fps: Option<u32>,
    /// Explicit inclusive frame range
    #[arg(
        long,
        num_args = 2,
        value_names = ["START", "END"],
        allow_negative_numbers = true
    )]
    pub frames: Option<Vec<i64>>,
    /// Force this renderer (defaults to Redshift)
    #[arg(long, value_name = "NAME")]
    pub renderer: Option<String>,
    #[arg(long, conflicts_with = "renderer")]
    pub no_force_renderer: bool,
    /// Render threads, 0 = all
    #[arg(long)]
    pub threads: Option<u32>,
    /// Additional renderer arguments, shell quoted
    #[arg(long = "extra", value_name = "ARGS", allow_hyphen_values = true)]
    pub extra_args: Option<String>,
}

impl RenderArgs {
    /// Preset (if any) replaces `base`, then each given flag overrides one field.
    pub fn to_config(&self, base: RenderConfig) -> Result<RenderConfig, RenderError> {
        let mut cfg = match &self.preset {
            Some(path) => preset::load(path)?,
            None => base,
        };

        if let Some(executable) = &self.executable {
            cfg.executable = executable.clone();
        }
        if let Some(scene) = &self.scene_path {
            cfg.scene_path = scene.clone();
        }
        if let Some(dir) = &self.output_dir {
            cfg.output_dir = dir.clone();
        }
        if let Some(base_name) = &self.base_name {
            cfg.base_name = base_name.clone();
        }
        if let Some(format) = self.format {
            cfg.format = format;
            cfg.override_format = true;
        }
        if self.override_format {
            cfg.override_format = true;
        }
        if self.no_override_format {
            cfg.override_format = false;
        }
        if let Some((width, height)) = self.resolution {
            cfg.override_resolution = true;
            cfg.width = width;
            cfg.height = height;
        }
        if self.no_resolution {
            cfg.override_resolution = false;
        }
        if let Some(duration) = self.duration {
            if !duration.is_finite() || duration < 0.0 {
                return Err(RenderError::InvalidField {
                    field: "duration",
                    value: duration.to_string(),
                });
            }
            cfg.use_duration = true;
            cfg.duration_seconds = duration;
        }
        if let Some(fps) = self.fps {
            cfg.fps = fps;
        }
        if let Some(frames) = &self.frames {
            if let [start, end] = frames[..] {
                cfg.use_duration = false;
                cfg.start_frame = start;
                cfg.end_frame = end;
            }
        }
        if let Some(renderer) = &self.renderer {
            cfg.renderer = renderer.clone();
            cfg.force_renderer = true;
        }
        if self.no_force_renderer {
            cfg.force_renderer = false;
        }
        if let Some(threads) = self.threads {
            cfg.threads = threads;
        }
        if let Some(extra) = &self.extra_args {
            cfg.extra_args = extra.clone();
        }

        Ok(cfg.normalized())
    }
}

pub fn parse_resolution(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let width = width
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("invalid width '{width}': {err}"))?;
    let height = height
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("invalid height '{height}': {err}"))?;
    if width == 0 || height == 0 {
        return Err("resolution must be positive".to_string());
    }
    Ok((width, height))
}

/// Defaults used when no preset is given: the located renderer, if any.
pub fn startup_config() -> RenderConfig {
    RenderConfig::default().with_executable(locate::guess_executable())
}

/// Runs one command and returns the process exit code.
pub fn execute(command: Commands) -> Result<i32, RenderError> {
    match command {
        Commands::Ui(args) => {
            let cfg = match &args.preset {
                Some(path) => preset::load(path)?,
                None => startup_config(),
            };
            tui::run(cfg)?;
            Ok(0)
        }
        Commands::Preview(args) => {
            let cfg = args.to_config(startup_config())?;
            let built = command::build(&cfg)?;
            println!("{}", built.display);
            Ok(0)
        }
        Commands::Run(args) => {
            let cfg = args.to_config(startup_config())?;
            let built = core::prepare(&cfg)?;
            println!("{}", built.display);
            eprintln!("Starting render…");

            tracing::info!(command = %built.display, "starting render");

            let (done_tx, done_rx) = mpsc::channel();
            let worker = runner::run_with_callbacks(
                built.args,
                |line| println!("{line}"),
                move |code| {
                    let _ = done_tx.send(code);
                },
            );
            let _ = worker.join();
            let code = done_rx.recv().unwrap_or(runner::LAUNCH_FAILURE_CODE);

            if code == 0 {
                eprintln!("Render completed successfully.");
            } else {
                eprintln!("Render FAILED with exit code {code}.");
            }
            Ok(code)
        }
        Commands::Save(args) => {
            let cfg = args.render.to_config(startup_config())?;
            preset::save(&args.path, &cfg)?;
            println!("Saved: {}", args.path.display());
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Cli {
        Cli::try_parse_from(argv).unwrap()
    }

    fn render_args(argv: &[&str]) -> RenderArgs {
        match parse(argv).command {
            Some(Commands::Preview(args)) | Some(Commands::Run(args)) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_means_ui() {
        let cli = parse(&["rsflow"]);
        assert!(cli.command.is_none());
        assert!(cli.is_interactive());
        assert!(!parse(&["rsflow", "preview"]).is_interactive());
    }

    #[test]
    fn flags_override_defaults() {
        let args = render_args(&[
            "rsflow",
            "preview",
            "--scene",
            "/s.c4d",
            "--output-dir",
            "/out",
            "--format",
            "exr",
            "--resolution",
            "1280x720",
            "--frames",
            "-5",
            "20",
            "--threads",
            "8",
            "--extra",
            "--foo \"bar baz\"",
        ]);
        let cfg = args.to_config(RenderConfig::default()).unwrap();

        assert_eq!(cfg.scene_path, "/s.c4d");
        assert_eq!(cfg.format, OutputFormat::Exr);
        assert!(cfg.override_resolution);
        assert_eq!((cfg.width, cfg.height), (1280, 720));
        assert!(!cfg.use_duration);
        assert_eq!((cfg.start_frame, cfg.end_frame), (-5, 20));
        assert_eq!(cfg.threads, 8);
        assert_eq!(cfg.extra_args, "--foo \"bar baz\"");
    }

    #[test]
    fn negative_switches_clear_gates() {
        let args = render_args(&[
            "rsflow",
            "run",
            "--no-override-format",
            "--no-force-renderer",
            "--duration",
            "2",
        ]);
        let cfg = args.to_config(RenderConfig::default()).unwrap();
        assert!(!cfg.override_format);
        assert!(!cfg.force_renderer);
        assert!(cfg.use_duration);
        assert_eq!(cfg.duration_seconds, 2.0);
    }

    #[test]
    fn duration_must_be_finite_and_not_negative() {
        for bad in ["--duration=NaN", "--duration=inf", "--duration=-1.5"] {
            let args = render_args(&["rsflow", "preview", bad]);
            let err = args.to_config(RenderConfig::default()).unwrap_err();
            assert!(
                matches!(err, RenderError::InvalidField { field: "duration", .. }),
                "{bad} was accepted"
            );
            assert!(err.is_validation());
        }
    }

    #[test]
    fn preset_is_the_base_for_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.c4drs.json");
        let stored = RenderConfig {
            scene_path: "/from/preset.c4d".to_string(),
            output_dir: "/from/preset".to_string(),
            threads: 4,
            ..RenderConfig::default()
        };
        preset::save(&path, &stored).unwrap();

        let args = render_args(&[
            "rsflow",
            "preview",
            "--preset",
            path.to_str().unwrap(),
            "--threads",
            "16",
        ]);
        let cfg = args
            .to_config(RenderConfig::default().with_executable("ignored"))
            .unwrap();
        assert_eq!(cfg.scene_path, "/from/preset.c4d");
        assert_eq!(cfg.threads, 16);
        assert!(cfg.executable.is_empty());
    }

    #[test]
    fn resolution_parser_rejects_garbage() {
        assert_eq!(parse_resolution("3840X2160"), Ok((3840, 2160)));
        assert!(parse_resolution("1920").is_err());
        assert!(parse_resolution("0x1080").is_err());
        assert!(parse_resolution("axb").is_err());
    }

    #[test]
    fn conflicting_timing_flags_are_rejected() {
        let result = Cli::try_parse_from([
            "rsflow", "preview", "--duration", "3", "--frames", "0", "10",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn save_takes_path_and_render_flags() {
        match parse(&["rsflow", "save", "out.c4drs.json", "--scene", "/s.c4d"]).command {
            Some(Commands::Save(args)) => {
                assert_eq!(args.path, PathBuf::from("out.c4drs.json"));
                assert_eq!(args.render.scene_path.as_deref(), Some("/s.c4d"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
