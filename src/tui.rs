use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Terminal;

use crate::core;
use crate::core::command;
use crate::core::config::{OutputFormat, RenderConfig};
use crate::core::error::RenderError;
use crate::core::job::{Job, JobStatus};
use crate::core::preset;
use crate::core::runner::RunEvent;

const MAX_LOG_LINES: usize = 2000;

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self, RenderError> {
        enable_raw_mode().map_err(RenderError::terminal)?;
        let mut stdout = io::stdout();
        if let Err(err) = stdout.execute(EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(RenderError::terminal(err));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = stdout.execute(LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Toggle,
    Choice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldId {
    Executable,
    Scene,
    OutputDir,
    BaseName,
    OverrideFormat,
    Format,
    OverrideResolution,
    Width,
    Height,
    UseDuration,
    Duration,
    Fps,
    StartFrame,
    EndFrame,
    ForceRenderer,
    Renderer,
    Threads,
    ExtraArgs,
}

impl FieldId {
    const ALL: [FieldId; 18] = [
        Self::Executable,
        Self::Scene,
        Self::OutputDir,
        Self::BaseName,
        Self::OverrideFormat,
        Self::Format,
        Self::OverrideResolution,
        Self::Width,
        Self::Height,
        Self::UseDuration,
        Self::Duration,
        Self::Fps,
        Self::StartFrame,
        Self::EndFrame,
        Self::ForceRenderer,
        Self::Renderer,
        Self::Threads,
        Self::ExtraArgs,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::Executable => "C4D Commandline",
            Self::Scene => "Scene (.c4d)",
            Self::OutputDir => "Output folder",
            Self::BaseName => "Base filename",
            Self::OverrideFormat => "Override format",
            Self::Format => "Format",
            Self::OverrideResolution => "Override resolution",
            Self::Width => "Width",
            Self::Height => "Height",
            Self::UseDuration => "Use duration x FPS",
            Self::Duration => "Duration (s)",
            Self::Fps => "FPS",
            Self::StartFrame => "Start frame",
            Self::EndFrame => "End frame",
            Self::ForceRenderer => "Force renderer",
            Self::Renderer => "Renderer",
            Self::Threads => "Threads (0=all)",
            Self::ExtraArgs => "Extra args",
        }
    }

    fn kind(self) -> FieldKind {
        match self {
            Self::OverrideFormat
            | Self::OverrideResolution
            | Self::UseDuration
            | Self::ForceRenderer => FieldKind::Toggle,
            Self::Format => FieldKind::Choice,
            _ => FieldKind::Text,
        }
    }

    /// Section title shown above the first field of each group.
    fn section(self) -> Option<&'static str> {
        match self {
            Self::Executable => Some("Paths"),
            Self::OverrideFormat => Some("Export Options"),
            Self::UseDuration => Some("Timing"),
            Self::ForceRenderer => Some("Advanced"),
            _ => None,
        }
    }
}

/// Raw form contents. Numbers stay text until [`FormState::to_config`] so a
/// half-typed value never leaks into the render config.
#[derive(Debug, Clone, PartialEq)]
struct FormState {
    executable: String,
    scene_path: String,
    output_dir: String,
    base_name: String,
    override_format: bool,
    format: OutputFormat,
    override_resolution: bool,
    width: String,
    height: String,
    use_duration: bool,
    duration: String,
    fps: String,
    start_frame: String,
    end_frame: String,
    force_renderer: bool,
    renderer: String,
    threads: String,
    extra_args: String,
}

impl FormState {
    fn from_config(cfg: &RenderConfig) -> Self {
        Self {
            executable: cfg.executable.clone(),
            scene_path: cfg.scene_path.clone(),
            output_dir: cfg.output_dir.clone(),
            base_name: cfg.base_name.clone(),
            override_format: cfg.override_format,
            format: cfg.format,
            override_resolution: cfg.override_resolution,
            width: cfg.width.to_string(),
            height: cfg.height.to_string(),
            use_duration: cfg.use_duration,
            duration: cfg.duration_seconds.to_string(),
            fps: cfg.fps.to_string(),
            start_frame: cfg.start_frame.to_string(),
            end_frame: cfg.end_frame.to_string(),
            force_renderer: cfg.force_renderer,
            renderer: cfg.renderer.clone(),
            threads: cfg.threads.to_string(),
            extra_args: cfg.extra_args.clone(),
        }
    }

    /// Parses every field into a fresh config; the form is never mutated.
    fn to_config(&self) -> Result<RenderConfig, RenderError> {
        let width = parse_field::<u32>(FieldId::Width, &self.width)?;
        let height = parse_field::<u32>(FieldId::Height, &self.height)?;
        if width == 0 {
            return Err(invalid(FieldId::Width, &self.width));
        }
        if height == 0 {
            return Err(invalid(FieldId::Height, &self.height));
        }

        let duration_seconds = parse_field::<f64>(FieldId::Duration, &self.duration)?;
        if !duration_seconds.is_finite() || duration_seconds < 0.0 {
            return Err(invalid(FieldId::Duration, &self.duration));
        }

        let fps = if self.fps.trim().is_empty() {
            0
        } else {
            parse_field::<u32>(FieldId::Fps, &self.fps)?
        };

        let cfg = RenderConfig {
            executable: self.executable.clone(),
            scene_path: self.scene_path.clone(),
            output_dir: self.output_dir.clone(),
            base_name: self.base_name.clone(),
            format: self.format,
            override_format: self.override_format,
            override_resolution: self.override_resolution,
            width,
            height,
            use_duration: self.use_duration,
            duration_seconds,
            fps,
            start_frame: parse_field(FieldId::StartFrame, &self.start_frame)?,
            end_frame: parse_field(FieldId::EndFrame, &self.end_frame)?,
            renderer: self.renderer.clone(),
            force_renderer: self.force_renderer,
            threads: parse_field(FieldId::Threads, &self.threads)?,
            extra_args: self.extra_args.clone(),
        };
        Ok(cfg.normalized())
    }

    fn text(&self, id: FieldId) -> Option<&str> {
        let text = match id {
            FieldId::Executable => &self.executable,
            FieldId::Scene => &self.scene_path,
            FieldId::OutputDir => &self.output_dir,
            FieldId::BaseName => &self.base_name,
            FieldId::Width => &self.width,
            FieldId::Height => &self.height,
            FieldId::Duration => &self.duration,
            FieldId::Fps => &self.fps,
            FieldId::StartFrame => &self.start_frame,
            FieldId::EndFrame => &self.end_frame,
            FieldId::Renderer => &self.renderer,
            FieldId::Threads => &self.threads,
            FieldId::ExtraArgs => &self.extra_args,
            FieldId::OverrideFormat
            | FieldId::Format
            | FieldId::OverrideResolution
            | FieldId::UseDuration
            | FieldId::ForceRenderer => return None,
        };
        Some(text.as_str())
    }

    fn text_mut(&mut self, id: FieldId) -> Option<&mut String> {
        let text = match id {
            FieldId::Executable => &mut self.executable,
            FieldId::Scene => &mut self.scene_path,
            FieldId::OutputDir => &mut self.output_dir,
            FieldId::BaseName => &mut self.base_name,
            FieldId::Width => &mut self.width,
            FieldId::Height => &mut self.height,
            FieldId::Duration => &mut self.duration,
            FieldId::Fps => &mut self.fps,
            FieldId::StartFrame => &mut self.start_frame,
            FieldId::EndFrame => &mut self.end_frame,
            FieldId::Renderer => &mut self.renderer,
            FieldId::Threads => &mut self.threads,
            FieldId::ExtraArgs => &mut self.extra_args,
            FieldId::OverrideFormat
            | FieldId::Format
            | FieldId::OverrideResolution
            | FieldId::UseDuration
            | FieldId::ForceRenderer => return None,
        };
        Some(text)
    }

    fn toggle(&mut self, id: FieldId) {
        match id {
            FieldId::OverrideFormat => self.override_format = !self.override_format,
            FieldId::Format => self.format = self.format.next(),
            FieldId::OverrideResolution => self.override_resolution = !self.override_resolution,
            FieldId::UseDuration => self.use_duration = !self.use_duration,
            FieldId::ForceRenderer => self.force_renderer = !self.force_renderer,
            _ => {}
        }
    }

    fn value(&self, id: FieldId) -> String {
        let checkbox = |on: bool| if on { "[x]" } else { "[ ]" }.to_string();
        match id {
            FieldId::OverrideFormat => checkbox(self.override_format),
            FieldId::Format => format!("< {} >", self.format),
            FieldId::OverrideResolution => checkbox(self.override_resolution),
            FieldId::UseDuration => {
                if self.use_duration {
                    "(x) duration x FPS   ( ) frame range".to_string()
                } else {
                    "( ) duration x FPS   (x) frame range".to_string()
                }
            }
            FieldId::ForceRenderer => checkbox(self.force_renderer),
            _ => self.text(id).unwrap_or_default().to_string(),
        }
    }
}

fn parse_field<T: std::str::FromStr>(id: FieldId, raw: &str) -> Result<T, RenderError> {
    raw.trim().parse::<T>().map_err(|_| invalid(id, raw))
}

fn invalid(id: FieldId, raw: &str) -> RenderError {
    RenderError::InvalidField {
        field: id.label(),
        value: raw.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptAction {
    SavePreset,
    LoadPreset,
}

impl PromptAction {
    fn title(self) -> &'static str {
        match self {
            Self::SavePreset => "Save preset to",
            Self::LoadPreset => "Load preset from",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Mode {
    Form,
    Prompt { action: PromptAction, input: String },
}

#[derive(Debug, Clone, PartialEq)]
struct Notice {
    title: String,
    message: String,
}

struct AppState {
    cfg: RenderConfig,
    form: FormState,
    selected: usize,
    mode: Mode,
    notice: Option<Notice>,
    preview: String,
    log: Vec<String>,
    scroll_offset: usize,
    view_lines: usize,
    job: Option<Job>,
    events: Option<Receiver<RunEvent>>,
    next_job_id: u64,
    should_quit: bool,
}

impl AppState {
    fn new(cfg: RenderConfig) -> Self {
        let form = FormState::from_config(&cfg);
        Self {
            cfg,
            form,
            selected: 1,
            mode: Mode::Form,
            notice: None,
            preview: String::new(),
            log: vec!["F2 preview · F5 run · F6 save preset · F7 load preset · Esc quit".to_string()],
            scroll_offset: 0,
            view_lines: 1,
            job: None,
            events: None,
            next_job_id: 1,
            should_quit: false,
        }
    }

    fn selected_field(&self) -> FieldId {
        FieldId::ALL[self.selected]
    }

    fn job_running(&self) -> bool {
        self.job.as_ref().is_some_and(Job::is_running)
    }

    fn notify(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.notice = Some(Notice {
            title: title.into(),
            message: message.into(),
        });
    }

    /// Form → config, replacing the previous config on success.
    fn sync(&mut self) -> Result<(), RenderError> {
        self.cfg = self.form.to_config()?;
        Ok(())
    }

    fn preview(&mut self) {
        let built = self.sync().and_then(|()| command::build(&self.cfg));
        match built {
            Ok(built) => self.preview = built.display,
            Err(err) => self.notify("Build Error", err.to_string()),
        }
    }

    fn start_run(&mut self) {
        if self.job_running() {
            self.push_log("A render is already running. Please wait for it to finish.");
            return;
        }

        let built = match self.sync().and_then(|()| core::prepare(&self.cfg)) {
            Ok(built) => built,
            Err(err) if err.is_validation() => {
                self.notify("Build Error", err.to_string());
                return;
            }
            Err(err) => {
                self.notify("Output Error", err.to_string());
                return;
            }
        };

        self.preview = built.display.clone();
        self.log.clear();
        self.scroll_bottom();
        self.push_log("Starting render…");

        let mut job = Job::new(self.next_job_id);
        self.next_job_id += 1;
        job.start();
        self.job = Some(job);
        self.events = Some(core::start(&built));
    }

    fn drain_events(&mut self) {
        let Some(events) = self.events.take() else {
            return;
        };

        loop {
            match events.try_recv() {
                Ok(RunEvent::Output(line)) => self.push_log(line),
                Ok(RunEvent::Finished(code)) => {
                    self.finish_job(code);
                    return;
                }
                Err(TryRecvError::Empty) => {
                    self.events = Some(events);
                    return;
                }
                Err(TryRecvError::Disconnected) => {
                    self.finish_job(core::runner::LAUNCH_FAILURE_CODE);
                    return;
                }
            }
        }
    }

    fn finish_job(&mut self, code: i32) {
        if let Some(job) = self.job.as_mut() {
            job.finish(code);
        }
        self.push_log("");
        if code == 0 {
            self.push_log("Render completed successfully.");
        } else {
            self.push_log(format!("Render FAILED with exit code {code}."));
        }
    }

    fn open_prompt(&mut self, action: PromptAction) {
        let input = match action {
            PromptAction::SavePreset => {
                let current = self.form.to_config().unwrap_or_else(|_| self.cfg.clone());
                preset::suggested_file_name(&current)
            }
            PromptAction::LoadPreset => String::new(),
        };
        self.mode = Mode::Prompt { action, input };
    }

    fn save_preset(&mut self, path: PathBuf) {
        if let Err(err) = self.sync() {
            self.notify("Save Error", err.to_string());
            return;
        }
        match preset::save(&path, &self.cfg) {
            Ok(()) => self.notify("Preset Saved", format!("Saved:\n{}", path.display())),
            Err(err) => self.notify("Save Error", err.to_string()),
        }
    }

    fn load_preset(&mut self, path: PathBuf) {
        match preset::load(&path) {
            Ok(cfg) => {
                self.form = FormState::from_config(&cfg);
                self.cfg = cfg;
                self.notify("Preset Loaded", format!("Loaded:\n{}", path.display()));
            }
            Err(err) => self.notify("Load Error", err.to_string()),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        if self.notice.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                self.notice = None;
            }
            return;
        }

        if let Mode::Prompt { action, input } = &mut self.mode {
            match key.code {
                KeyCode::Char(ch) => input.push(ch),
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Esc => self.mode = Mode::Form,
                KeyCode::Enter => {
                    let action = *action;
                    let path = PathBuf::from(input.trim());
                    self.mode = Mode::Form;
                    if path.as_os_str().is_empty() {
                        return;
                    }
                    match action {
                        PromptAction::SavePreset => self.save_preset(path),
                        PromptAction::LoadPreset => self.load_preset(path),
                    }
                }
                _ => {}
            }
            return;
        }

        let field = self.selected_field();
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Up | KeyCode::BackTab => {
                self.selected = self.selected.checked_sub(1).unwrap_or(FieldId::ALL.len() - 1);
            }
            KeyCode::Down | KeyCode::Tab | KeyCode::Enter => {
                self.selected = (self.selected + 1) % FieldId::ALL.len();
            }
            KeyCode::F(2) => self.preview(),
            KeyCode::F(5) => self.start_run(),
            KeyCode::F(6) => self.open_prompt(PromptAction::SavePreset),
            KeyCode::F(7) => self.open_prompt(PromptAction::LoadPreset),
            KeyCode::PageUp => {
                let step = self.view_lines.saturating_sub(1).max(1);
                self.scroll_up(step);
            }
            KeyCode::PageDown => {
                let step = self.view_lines.saturating_sub(1).max(1);
                self.scroll_down(step);
            }
            KeyCode::Home => self.scroll_top(),
            KeyCode::End => self.scroll_bottom(),
            KeyCode::Left | KeyCode::Right if field.kind() != FieldKind::Text => self.form.toggle(field),
            KeyCode::Char(' ') if field.kind() != FieldKind::Text => self.form.toggle(field),
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if let Some(text) = self.form.text_mut(field) {
                    text.clear();
                }
            }
            KeyCode::Char(ch) => {
                if let Some(text) = self.form.text_mut(field) {
                    text.push(ch);
                }
            }
            KeyCode::Backspace => {
                if let Some(text) = self.form.text_mut(field) {
                    text.pop();
                }
            }
            _ => {}
        }
    }

    fn push_log(&mut self, line: impl Into<String>) {
        if self.log.len() >= MAX_LOG_LINES {
            let drain_count = self.log.len().saturating_sub(MAX_LOG_LINES - 1);
            self.log.drain(0..drain_count);
        }
        self.log.push(line.into());
        self.clamp_scroll();
    }

    fn set_view_lines(&mut self, lines: usize) {
        self.view_lines = lines.max(1);
        self.clamp_scroll();
    }

    fn scroll_up(&mut self, lines: usize) {
        let max_scroll = self.max_scroll();
        self.scroll_offset = (self.scroll_offset + lines).min(max_scroll);
    }

    fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    fn scroll_top(&mut self) {
        self.scroll_offset = self.max_scroll();
    }

    fn scroll_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    fn max_scroll(&self) -> usize {
        self.log.len().saturating_sub(self.view_lines)
    }

    fn clamp_scroll(&mut self) {
        let max_scroll = self.max_scroll();
        if self.scroll_offset > max_scroll {
            self.scroll_offset = max_scroll;
        }
    }
}

pub fn run(cfg: RenderConfig) -> Result<(), RenderError> {
    let _guard = TerminalGuard::enter()?;
    let stdout = io::stdout();
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(RenderError::terminal)?;

    let mut app = AppState::new(cfg);

    loop {
        app.drain_events();

        terminal
            .draw(|frame| draw(frame, &mut app))
            .map_err(RenderError::terminal)?;

        if event::poll(Duration::from_millis(50)).map_err(RenderError::terminal)? {
            if let Event::Key(key) = event::read().map_err(RenderError::terminal)? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn draw(frame: &mut ratatui::Frame, app: &mut AppState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(frame.size());

    frame.render_widget(render_header(app), rows[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(rows[1]);

    frame.render_widget(render_form(app, columns[0].height as usize), columns[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(3)])
        .split(columns[1]);

    let preview = Paragraph::new(app.preview.as_str())
        .block(Block::default().title("Command").borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    frame.render_widget(preview, right[0]);

    app.set_view_lines((right[1].height as usize).saturating_sub(2));
    frame.render_widget(render_log(app, right[1].height as usize), right[1]);

    let (title, text) = match &app.mode {
        Mode::Prompt { action, input } => (action.title(), input.as_str()),
        Mode::Form => ("Keys", "↑↓ select · type to edit · Space toggle · F2 preview · F5 run · F6 save · F7 load · Esc quit"),
    };
    let footer = Paragraph::new(text).block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(footer, rows[2]);
    if let Mode::Prompt { input, .. } = &app.mode {
        frame.set_cursor(rows[2].x + 1 + input.chars().count() as u16, rows[2].y + 1);
    }

    if let Some(notice) = &app.notice {
        let area = centered(frame.size(), 60, 7);
        let body = format!("{}\n\n[Enter] OK", notice.message);
        let popup = Paragraph::new(body)
            .block(Block::default().title(notice.title.as_str()).borders(Borders::ALL))
            .wrap(Wrap { trim: false });
        frame.render_widget(Clear, area);
        frame.render_widget(popup, area);
    }
}

fn render_header(app: &AppState) -> Paragraph<'static> {
    let status = match &app.job {
        None => "Idle".to_string(),
        Some(job) => {
            let elapsed = job
                .elapsed()
                .map(format_elapsed)
                .unwrap_or_default();
            let status = match job.status {
                JobStatus::Pending => "Pending".to_string(),
                JobStatus::Running => format!("Rendering… {elapsed}"),
                JobStatus::Finished => format!("Finished in {elapsed}"),
                JobStatus::Failed => format!(
                    "Failed (exit code {}) after {elapsed}",
                    job.exit_code.unwrap_or(core::runner::LAUNCH_FAILURE_CODE)
                ),
            };
            format!("job #{} · {status}", job.id)
        }
    };

    Paragraph::new(Line::from(vec![Span::raw("Status: "), Span::raw(status)]))
        .block(Block::default().title("rsflow · Cinema 4D / Redshift").borders(Borders::ALL))
}

fn render_form(app: &AppState, height: usize) -> Paragraph<'static> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let selected = Style::default().add_modifier(Modifier::REVERSED);

    let mut lines = Vec::new();
    let mut selected_line = 0;
    for (idx, field) in FieldId::ALL.into_iter().enumerate() {
        if let Some(section) = field.section() {
            if !lines.is_empty() {
                lines.push(Line::from(""));
            }
            lines.push(Line::from(Span::styled(section, bold)));
        }
        let label = format!(" {:<20} ", field.label());
        let value = app.form.value(field);
        if idx == app.selected {
            selected_line = lines.len();
            lines.push(Line::from(vec![
                Span::styled(label, selected),
                Span::raw(" "),
                Span::raw(value),
            ]));
        } else {
            lines.push(Line::from(vec![Span::raw(label), Span::raw(" "), Span::raw(value)]));
        }
    }

    let visible = height.saturating_sub(2).max(1);
    let scroll = selected_line.saturating_sub(visible - 1);

    Paragraph::new(lines)
        .block(Block::default().title("Settings").borders(Borders::ALL))
        .scroll((scroll as u16, 0))
}

fn render_log(app: &AppState, height: usize) -> Paragraph<'static> {
    let max_lines = height.saturating_sub(2).max(1);
    let end = app.log.len().saturating_sub(app.scroll_offset);
    let start = end.saturating_sub(max_lines);
    let lines: Vec<Line> = app.log[start..end]
        .iter()
        .map(|line| Line::from(line.clone()))
        .collect();

    Paragraph::new(lines)
        .block(Block::default().title("Output / Log").borders(Borders::ALL))
        .wrap(Wrap { trim: false })
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn format_elapsed(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut AppState, text: &str) {
        for ch in text.chars() {
            app.handle_key(key(KeyCode::Char(ch)));
        }
    }

    fn select(app: &mut AppState, field: FieldId) {
        app.selected = FieldId::ALL.iter().position(|f| *f == field).unwrap();
    }

    fn valid_app(output_dir: &str) -> AppState {
        AppState::new(RenderConfig {
            scene_path: "/s.c4d".to_string(),
            output_dir: output_dir.to_string(),
            ..RenderConfig::default()
        })
    }

    fn wait_for_job(app: &mut AppState) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while app.job_running() && Instant::now() < deadline {
            app.drain_events();
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn form_round_trips_config() {
        let cfg = RenderConfig {
            scene_path: "/s.c4d".to_string(),
            duration_seconds: 2.5,
            start_frame: -3,
            extra_args: "-v".to_string(),
            ..RenderConfig::default()
        };
        assert_eq!(FormState::from_config(&cfg).to_config().unwrap(), cfg);
    }

    #[test]
    fn invalid_number_names_the_field() {
        let mut form = FormState::from_config(&RenderConfig::default());
        form.threads = "many".to_string();
        let err = form.to_config().unwrap_err();
        assert!(matches!(err, RenderError::InvalidField { field: "Threads (0=all)", .. }));

        let mut form = FormState::from_config(&RenderConfig::default());
        form.width = "0".to_string();
        assert!(form.to_config().is_err());
    }

    #[test]
    fn typing_edits_selected_text_field() {
        let mut app = valid_app("/out");
        select(&mut app, FieldId::BaseName);
        app.handle_key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        type_text(&mut app, "beauty_");
        app.handle_key(key(KeyCode::Backspace));
        assert_eq!(app.form.base_name, "beauty");
    }

    #[test]
    fn space_toggles_and_cycles() {
        let mut app = valid_app("/out");
        select(&mut app, FieldId::OverrideResolution);
        app.handle_key(key(KeyCode::Char(' ')));
        assert!(app.form.override_resolution);

        select(&mut app, FieldId::Format);
        app.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(app.form.format, OutputFormat::Exr);
    }

    #[test]
    fn preview_shows_command_without_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("not-yet");
        let mut app = valid_app(out.to_str().unwrap());

        app.handle_key(key(KeyCode::F(2)));
        assert!(app.notice.is_none());
        assert!(app.preview.contains("-render /s.c4d"));
        assert!(!out.exists());
    }

    #[test]
    fn build_errors_open_a_notice() {
        let mut app = AppState::new(RenderConfig::default());
        app.handle_key(key(KeyCode::F(5)));
        let notice = app.notice.clone().unwrap();
        assert_eq!(notice.title, "Build Error");
        assert!(app.job.is_none());

        app.handle_key(key(KeyCode::Char('x')));
        assert!(app.notice.is_some());
        app.handle_key(key(KeyCode::Enter));
        assert!(app.notice.is_none());
    }

    #[test]
    fn run_with_missing_executable_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("frames");
        let mut app = valid_app(out.to_str().unwrap());
        app.form.executable = "/definitely/missing/Commandline".to_string();

        app.handle_key(key(KeyCode::F(5)));
        assert!(out.is_dir());
        wait_for_job(&mut app);

        let job = app.job.as_ref().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(app.log.first().map(String::as_str), Some("Starting render…"));
        assert!(app.log.iter().any(|l| l == core::runner::NOT_FOUND_MESSAGE));
        assert_eq!(app.log.last().map(String::as_str), Some("Render FAILED with exit code 1."));
    }

    #[test]
    fn presets_save_and_load_through_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.c4drs.json");
        let mut app = valid_app("/out");
        app.form.threads = "6".to_string();

        app.handle_key(key(KeyCode::F(6)));
        assert_eq!(
            app.mode,
            Mode::Prompt {
                action: PromptAction::SavePreset,
                input: "s.c4drs.json".to_string()
            }
        );
        if let Mode::Prompt { input, .. } = &mut app.mode {
            *input = path.to_string_lossy().into_owned();
        }
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.notice.as_ref().unwrap().title, "Preset Saved");
        app.handle_key(key(KeyCode::Esc));

        let mut other = AppState::new(RenderConfig::default());
        other.handle_key(key(KeyCode::F(7)));
        type_text(&mut other, path.to_str().unwrap());
        other.handle_key(key(KeyCode::Enter));
        assert_eq!(other.notice.as_ref().unwrap().title, "Preset Loaded");
        assert_eq!(other.form.threads, "6");
        assert_eq!(other.cfg.scene_path, "/s.c4d");
    }

    #[test]
    fn log_is_capped() {
        let mut app = valid_app("/out");
        for idx in 0..MAX_LOG_LINES + 10 {
            app.push_log(format!("line {idx}"));
        }
        assert_eq!(app.log.len(), MAX_LOG_LINES);
        assert_eq!(app.log.last().unwrap(), &format!("line {}", MAX_LOG_LINES + 9));
    }
}
