use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use ratatui_image::{picker::Picker, protocol::StatefulProtocol, Resize, StatefulImage};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::cache::clamp_capacity;
use crate::backend::clipboard::CopyError;
use crate::backend::navigator::{NavState, Navigator, Notice};
use crate::backend::record::SharedRecord;
use crate::backend::settings::{Settings, Theme};

const MAX_PLACEHOLDER_CHARS: usize = 150;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Viewer,
    Settings,
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Endpoint,
    Capacity,
    DownloadDir,
}

/// Text fields of the settings overlay, edited in place before being applied.
pub struct SettingsForm {
    pub endpoint: String,
    pub capacity: String,
    pub download_dir: String,
    pub field: FormField,
}

impl SettingsForm {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            capacity: settings.capacity.to_string(),
            download_dir: settings.download_dir.display().to_string(),
            field: FormField::Endpoint,
        }
    }

    pub fn toggle_field(&mut self) {
        self.field = match self.field {
            FormField::Endpoint => FormField::Capacity,
            FormField::Capacity => FormField::DownloadDir,
            FormField::DownloadDir => FormField::Endpoint,
        };
    }

    pub fn push(&mut self, c: char) {
        match self.field {
            FormField::Endpoint => self.endpoint.push(c),
            FormField::Capacity => {
                if c.is_ascii_digit() && self.capacity.len() < 2 {
                    self.capacity.push(c);
                }
            }
            FormField::DownloadDir => self.download_dir.push(c),
        }
    }

    pub fn pop(&mut self) {
        match self.field {
            FormField::Endpoint => self.endpoint.pop(),
            FormField::Capacity => self.capacity.pop(),
            FormField::DownloadDir => self.download_dir.pop(),
        };
    }

    /// Returns `base` with the edited fields applied. Blank or unparsable
    /// input keeps the old value, as does a download directory that cannot be
    /// created.
    pub fn apply(&self, base: &Settings) -> Settings {
        let mut settings = base.clone();
        let endpoint = self.endpoint.trim();
        if !endpoint.is_empty() {
            settings.endpoint = endpoint.to_string();
        }
        if let Ok(capacity) = self.capacity.trim().parse::<usize>() {
            settings.capacity = clamp_capacity(capacity);
        }
        let download_dir = self.download_dir.trim();
        if !download_dir.is_empty() && Path::new(download_dir) != base.download_dir {
            let dir = PathBuf::from(download_dir);
            match fs::create_dir_all(&dir) {
                Ok(()) => settings.download_dir = dir,
                Err(e) => log::warn!("keeping download dir, {} is unusable: {}", dir.display(), e),
            }
        }
        settings
    }
}

#[derive(Clone, Copy, Default)]
pub struct Status {
    pub cache_depth: usize,
    pub capacity: usize,
    pub live: usize,
    pub history: Option<(usize, usize)>,
    pub state: NavState,
}

pub struct App {
    pub view: View,
    pub settings: Settings,
    pub form: SettingsForm,
    pub picker: Option<Picker>,
    pub current: Option<SharedRecord>,
    pub image_state: Option<StatefulProtocol>,
    pub loading: bool,
    pub placeholder: Option<String>,
    pub message: String,
    pub status: Status,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        Self::with_picker(settings, Picker::from_query_stdio().ok())
    }

    pub fn with_picker(settings: Settings, picker: Option<Picker>) -> Self {
        Self {
            view: View::Viewer,
            form: SettingsForm::from_settings(&settings),
            settings,
            picker,
            current: None,
            image_state: None,
            loading: false,
            placeholder: None,
            message: "Ready".to_string(),
            status: Status::default(),
        }
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn report_copy(&mut self, result: Result<(), CopyError>) {
        match result {
            Ok(()) => self.set_message("Image copied to clipboard."),
            Err(CopyError::NothingToCopy) => self.set_message("No image to copy."),
            Err(e) => {
                log::warn!("copy failed: {}", e);
                self.set_message(format!("Copy failed: {}", e));
            }
        }
    }

    pub fn open_settings(&mut self) {
        self.form = SettingsForm::from_settings(&self.settings);
        self.view = View::Settings;
    }

    pub fn close_settings(&mut self) {
        self.view = View::Viewer;
    }

    pub fn toggle_theme(&mut self) {
        self.settings.theme = self.settings.theme.toggled();
    }

    /// Forgets the shown image after the core dropped its history.
    pub fn clear_image(&mut self) {
        self.current = None;
        self.image_state = None;
    }

    pub fn sync(&mut self, navigator: &Navigator) {
        self.status = Status {
            cache_depth: navigator.cache_depth(),
            capacity: navigator.capacity(),
            live: navigator.live_fetches(),
            history: navigator.history_position(),
            state: navigator.state(),
        };
    }

    pub fn apply_notices(&mut self, notices: Vec<Notice>) {
        for notice in notices {
            match notice {
                Notice::Display(record) => self.show_record(record),
                Notice::Loading => {
                    self.loading = true;
                    self.placeholder = None;
                    self.set_message("Cache empty, fetching a new image...");
                }
                Notice::Error(message) => {
                    self.set_message(format!("Error: {}", message));
                }
                Notice::LoadFailed(message) => {
                    self.loading = false;
                    self.placeholder = Some(format!(
                        "Failed to fetch image:\n{}",
                        truncate_text(&message, MAX_PLACEHOLDER_CHARS)
                    ));
                }
                Notice::Exhausted => {
                    self.loading = false;
                    self.placeholder = Some("No images available.".to_string());
                    self.set_message("Every source attempt failed. Check the network and the API URL.");
                }
                Notice::AtFirst => self.set_message("Already at the first image in history."),
                Notice::NoHistory => self.set_message("No more history."),
            }
        }
    }

    fn show_record(&mut self, record: SharedRecord) {
        self.loading = false;
        self.placeholder = None;
        if let Some(ref picker) = self.picker {
            self.image_state = Some(picker.new_resize_protocol(record.image.clone()));
        }
        self.set_message(record.source_url.clone());
        self.current = Some(record);
    }
}

struct Palette {
    accent: Color,
    text: Color,
    muted: Color,
    highlight: Color,
    error: Color,
}

fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Dark => Palette {
            accent: Color::Cyan,
            text: Color::White,
            muted: Color::DarkGray,
            highlight: Color::Yellow,
            error: Color::LightRed,
        },
        Theme::Light => Palette {
            accent: Color::Blue,
            text: Color::Black,
            muted: Color::Gray,
            highlight: Color::Magenta,
            error: Color::Red,
        },
    }
}

pub fn ui(f: &mut Frame, app: &mut App) {
    let colors = palette(app.settings.theme);
    let area = f.area();

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),   // image
            Constraint::Length(3), // status
            Constraint::Length(3), // footer
        ])
        .split(area);

    draw_image_pane(f, root[0], app, &colors);
    draw_status(f, root[1], app, &colors);
    draw_footer(f, root[2], &colors);

    if app.view == View::Settings {
        draw_settings(f, area, app, &colors);
    }
}

fn draw_image_pane(f: &mut Frame, area: Rect, app: &mut App, colors: &Palette) {
    let title = match app.current {
        Some(ref record) => {
            let (w, h) = record.dimensions();
            format!("acy viewer ({}x{})", w, h)
        }
        None => "acy viewer".to_string(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(colors.accent));

    let inner = block.inner(area);
    f.render_widget(block, area);

    if app.loading {
        draw_spinner(f, inner, colors);
        return;
    }

    if let Some(ref text) = app.placeholder {
        let paragraph = Paragraph::new(text.as_str())
            .style(Style::default().fg(colors.error))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, centered_rows(inner, 4));
        return;
    }

    match app.image_state {
        Some(ref mut state) => {
            let image_widget = StatefulImage::new().resize(Resize::Scale(None));
            f.render_stateful_widget(image_widget, inner, state);
        }
        None => {
            let text = if app.current.is_some() {
                "Image loaded (this terminal cannot draw images)"
            } else {
                "No image"
            };
            let paragraph = Paragraph::new(text)
                .style(Style::default().fg(colors.muted))
                .alignment(Alignment::Center);
            f.render_widget(paragraph, centered_rows(inner, 1));
        }
    }
}

fn draw_spinner(f: &mut Frame, area: Rect, colors: &Palette) {
    let spinner_frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let spinner = spinner_frames[(millis / 100) as usize % spinner_frames.len()];

    let loading_text = Line::from(vec![
        Span::styled(
            format!(" {} ", spinner),
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "Loading image...",
            Style::default()
                .fg(colors.text)
                .add_modifier(Modifier::BOLD),
        ),
    ]);

    let paragraph = Paragraph::new(loading_text).alignment(Alignment::Center);
    f.render_widget(paragraph, centered_rows(area, 1));
}

fn draw_status(f: &mut Frame, area: Rect, app: &App, colors: &Palette) {
    let status = &app.status;
    let history = match status.history {
        Some((pos, len)) => format!("{}/{}", pos, len),
        None => "-".to_string(),
    };

    let line = Line::from(vec![
        Span::styled("Cache ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("{}/{}", status.cache_depth, status.capacity),
            Style::default().fg(colors.highlight),
        ),
        Span::styled("  Fetching ", Style::default().fg(colors.muted)),
        Span::styled(status.live.to_string(), Style::default().fg(colors.highlight)),
        Span::styled("  History ", Style::default().fg(colors.muted)),
        Span::styled(history, Style::default().fg(colors.highlight)),
        Span::styled(
            format!("  [{}]  ", state_label(status.state)),
            Style::default().fg(colors.muted),
        ),
        Span::styled(
            truncate_text(&app.message, area.width.saturating_sub(52) as usize),
            Style::default().fg(colors.text),
        ),
    ]);

    let p = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.muted)),
    );
    f.render_widget(p, area);
}

fn state_label(state: NavState) -> &'static str {
    match state {
        NavState::Idle => "idle",
        NavState::LoadingFirst => "waiting",
        NavState::Displaying => "showing",
    }
}

fn draw_footer(f: &mut Frame, area: Rect, colors: &Palette) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(colors.highlight));
    let text = Line::from(vec![
        key("Space/d"),
        Span::raw(": next  "),
        key("a"),
        Span::raw(": previous  "),
        key("f"),
        Span::raw(": fresh  "),
        key("s"),
        Span::raw(": save  "),
        key("y"),
        Span::raw(": copy  "),
        key("o"),
        Span::raw(": open  "),
        key("c"),
        Span::raw(": settings  "),
        key("t"),
        Span::raw(": theme  "),
        key("q"),
        Span::raw(": quit"),
    ]);

    let p = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(colors.accent)),
        )
        .alignment(Alignment::Center);
    f.render_widget(p, area);
}

fn draw_settings(f: &mut Frame, area: Rect, app: &App, colors: &Palette) {
    let width = area.width.min(70);
    let height = 9.min(area.height);
    let popup = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Settings")
        .border_style(Style::default().fg(colors.highlight));
    let inner = block.inner(popup);
    f.render_widget(Clear, popup);
    f.render_widget(block, popup);

    let field_style = |field: FormField| {
        if app.form.field == field {
            Style::default()
                .fg(colors.highlight)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(colors.text)
        }
    };

    let lines = vec![
        Line::from(vec![
            Span::styled("API URL:  ", Style::default().fg(colors.muted)),
            Span::styled(app.form.endpoint.as_str(), field_style(FormField::Endpoint)),
        ]),
        Line::from(vec![
            Span::styled("Cache:    ", Style::default().fg(colors.muted)),
            Span::styled(app.form.capacity.as_str(), field_style(FormField::Capacity)),
            Span::styled("  (1-20)", Style::default().fg(colors.muted)),
        ]),
        Line::from(vec![
            Span::styled("Save to:  ", Style::default().fg(colors.muted)),
            Span::styled(
                app.form.download_dir.as_str(),
                field_style(FormField::DownloadDir),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "Tab: switch field  Enter: apply  Esc: cancel",
            Style::default().fg(colors.muted),
        )),
    ];

    let p = Paragraph::new(lines).wrap(Wrap { trim: false });
    f.render_widget(p, inner);
}

fn centered_rows(area: Rect, rows: u16) -> Rect {
    let rows = rows.min(area.height);
    Rect::new(area.x, area.y + (area.height - rows) / 2, area.width, rows)
}

fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        format!(
            "{}...",
            text.chars()
                .take(max_len.saturating_sub(3))
                .collect::<String>()
        )
    }
}
