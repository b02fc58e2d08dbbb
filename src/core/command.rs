use std::borrow::Cow;

use crate::core::config::{RenderConfig, DEFAULT_BASE_NAME};
use crate::core::error::RenderError;

pub const FLAG_RENDERER: &str = "-renderer";
pub const FLAG_RENDER: &str = "-render";
pub const FLAG_OUTPUT_IMAGE: &str = "-oimage";
pub const FLAG_OUTPUT_FORMAT: &str = "-ofmt";
pub const FLAG_OUTPUT_RESOLUTION: &str = "-ores";
pub const FLAG_FRAME: &str = "-frame";
pub const FLAG_THREADS: &str = "-threads";

/// Quoting and path conventions used when building a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Posix,
    Windows,
}

impl Platform {
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderCommand {
    pub args: Vec<String>,
    pub display: String,
}

impl RenderCommand {
    /// The executable token, if the config carried one.
    pub fn program(&self) -> Option<&str> {
        self.args
            .first()
            .map(String::as_str)
            .filter(|first| !first.starts_with('-'))
    }
}

pub fn build(cfg: &RenderConfig) -> Result<RenderCommand, RenderError> {
    build_for(cfg, Platform::host())
}

pub fn build_for(cfg: &RenderConfig, platform: Platform) -> Result<RenderCommand, RenderError> {
    let mut args = Vec::new();

    if !cfg.executable.is_empty() {
        args.push(cfg.executable.clone());
    }

    if cfg.force_renderer && !cfg.renderer.is_empty() {
        args.push(FLAG_RENDERER.to_string());
        args.push(cfg.renderer.clone());
    }

    if cfg.scene_path.is_empty() {
        return Err(RenderError::SceneRequired);
    }
    args.push(FLAG_RENDER.to_string());
    args.push(cfg.scene_path.clone());

    if cfg.output_dir.is_empty() {
        return Err(RenderError::OutputDirRequired);
    }
    let base = if cfg.base_name.is_empty() {
        DEFAULT_BASE_NAME
    } else {
        cfg.base_name.as_str()
    };
    args.push(FLAG_OUTPUT_IMAGE.to_string());
    args.push(join_stem(&cfg.output_dir, base, platform));

    if cfg.override_format {
        args.push(FLAG_OUTPUT_FORMAT.to_string());
        args.push(cfg.format.as_str().to_string());
    }

    if cfg.override_resolution {
        args.push(FLAG_OUTPUT_RESOLUTION.to_string());
        args.push(cfg.width.to_string());
        args.push(cfg.height.to_string());
    }

    let (start, end) = frame_range(cfg)?;
    args.push(FLAG_FRAME.to_string());
    args.push(start.to_string());
    args.push(end.to_string());

    args.push(FLAG_THREADS.to_string());
    args.push(cfg.threads.to_string());

    if !cfg.extra_args.trim().is_empty() {
        args.extend(split_extra_args(&cfg.extra_args, platform)?);
    }

    let rendered = display_string(&args, platform);
    tracing::debug!(tokens = args.len(), command = %rendered, "built render command");

    Ok(RenderCommand {
        args,
        display: rendered,
    })
}

/// Inclusive frame interval handed to `-frame`.
pub fn frame_range(cfg: &RenderConfig) -> Result<(i64, i64), RenderError> {
    if cfg.use_duration {
        let total = (cfg.duration_seconds * f64::from(cfg.fps)).round_ties_even();
        return Ok((0, total as i64));
    }

    if cfg.end_frame < cfg.start_frame {
        return Err(RenderError::InvalidFrameRange {
            start: cfg.start_frame,
            end: cfg.end_frame,
        });
    }
    Ok((cfg.start_frame, cfg.end_frame))
}

fn join_stem(dir: &str, base: &str, platform: Platform) -> String {
    match platform {
        Platform::Posix => {
            if base.starts_with('/') {
                base.to_string()
            } else if dir.ends_with('/') {
                format!("{dir}{base}")
            } else {
                format!("{dir}/{base}")
            }
        }
        Platform::Windows => {
            let has_drive = base.chars().nth(1) == Some(':');
            if base.starts_with(['\\', '/']) || has_drive {
                base.to_string()
            } else if dir.ends_with(['\\', '/', ':']) {
                format!("{dir}{base}")
            } else {
                format!("{dir}\\{base}")
            }
        }
    }
}

pub fn split_extra_args(extra: &str, platform: Platform) -> Result<Vec<String>, RenderError> {
    match platform {
        Platform::Posix => {
            shell_words::split(&escape_posix_literals(extra)).map_err(|err| RenderError::ExtraArgs {
                message: err.to_string(),
            })
        }
        Platform::Windows => split_windows(extra),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Delimiter,
    Unquoted,
    Single,
    Double,
}

// `shell_words` drops a word starting with `#` and everything after it as a
// comment, and inside double quotes it also treats `\$`, `` \` `` and a
// backslash-newline as escapes. Render arguments keep all of those verbatim:
// a leading `#` is escaped and inside double quotes only `\"` and `\\`
// remain escapes.
fn escape_posix_literals(extra: &str) -> String {
    let mut escaped = String::with_capacity(extra.len());
    let mut state = QuoteState::Delimiter;
    let mut chars = extra.chars().peekable();

    while let Some(ch) = chars.next() {
        match state {
            QuoteState::Delimiter | QuoteState::Unquoted => match ch {
                ' ' | '\t' | '\n' => {
                    escaped.push(ch);
                    state = QuoteState::Delimiter;
                }
                '#' if state == QuoteState::Delimiter => {
                    escaped.push_str("\\#");
                    state = QuoteState::Unquoted;
                }
                '\\' => {
                    escaped.push(ch);
                    if let Some(next) = chars.next() {
                        escaped.push(next);
                    }
                    state = QuoteState::Unquoted;
                }
                '\'' => {
                    escaped.push(ch);
                    state = QuoteState::Single;
                }
                '"' => {
                    escaped.push(ch);
                    state = QuoteState::Double;
                }
                _ => {
                    escaped.push(ch);
                    state = QuoteState::Unquoted;
                }
            },
            QuoteState::Single => {
                escaped.push(ch);
                if ch == '\'' {
                    state = QuoteState::Unquoted;
                }
            }
            QuoteState::Double => match ch {
                '"' => {
                    escaped.push(ch);
                    state = QuoteState::Unquoted;
                }
                '\\' => match chars.peek() {
                    Some('"' | '\\') => {
                        escaped.push(ch);
                        escaped.extend(chars.next());
                    }
                    _ => escaped.push_str("\\\\"),
                },
                _ => escaped.push(ch),
            },
        }
    }

    escaped
}

// Quotes group words but stay in the token and backslashes are literal, so
// `\\server\share` and `C:\path` survive untouched.
fn split_windows(extra: &str) -> Result<Vec<String>, RenderError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for ch in extra.chars() {
        if let Some(open) = quote {
            current.push(ch);
            if ch == open {
                tokens.push(std::mem::take(&mut current));
                quote = None;
            }
            continue;
        }

        if ch.is_whitespace() {
            if in_word {
                tokens.push(std::mem::take(&mut current));
                in_word = false;
            }
        } else if !in_word && (ch == '"' || ch == '\'') {
            current.push(ch);
            quote = Some(ch);
        } else {
            current.push(ch);
            in_word = true;
        }
    }

    if quote.is_some() {
        return Err(RenderError::ExtraArgs {
            message: "missing closing quote".to_string(),
        });
    }
    if in_word {
        tokens.push(current);
    }
    Ok(tokens)
}

pub fn display_string(args: &[String], platform: Platform) -> String {
    args.iter()
        .map(|arg| quote_token(arg, platform))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_token(token: &str, platform: Platform) -> Cow<'_, str> {
    match platform {
        Platform::Posix => shell_words::quote(token),
        Platform::Windows => {
            if token.chars().any(char::is_whitespace) || token.contains('\\') {
                Cow::Owned(format!("\"{token}\""))
            } else {
                Cow::Borrowed(token)
            }
        }
    }
}
