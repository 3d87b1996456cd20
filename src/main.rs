mod backend;
mod ui;

use backend::{clipboard, download};
use backend::fetcher::{HttpSource, ImageSource};
use backend::navigator::Navigator;
use backend::pool::FetchEvent;
use backend::settings::Settings;
use ui::ui::{App, View, ui};

use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use env_logger::{Builder, Target};
use futures::StreamExt;
use log::LevelFilter;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{error::Error, fs, io, sync::Arc};
use tokio::sync::mpsc;

fn log_target() -> Target {
    let Some(dir) = dirs::cache_dir().map(|d| d.join("acy-viewer")) else {
        return Target::Pipe(Box::new(io::sink()));
    };
    fs::create_dir_all(&dir).ok();

    match fs::File::create(dir.join("acy-viewer.log")) {
        Ok(file) => Target::Pipe(Box::new(file)),
        Err(_) => Target::Pipe(Box::new(io::sink())),
    }
}

// The terminal belongs to the UI, so logs go to a file.
fn init_logger() {
    if std::env::var("RUST_LOG").is_ok() {
        Builder::from_default_env().target(log_target()).init();
    } else {
        Builder::new()
            .target(log_target())
            .filter_level(LevelFilter::Warn)
            .filter_module("acy_viewer", LevelFilter::Debug)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logger();
    let settings = Settings::load();
    log::info!(
        "starting with endpoint {} and capacity {}",
        settings.endpoint,
        settings.capacity
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(settings.clone());

    // Fetch units report here; only the loop below consumes it.
    let (fetch_tx, mut fetch_rx) = mpsc::unbounded_channel::<FetchEvent>();
    let source: Arc<dyn ImageSource> = Arc::new(HttpSource::new());
    let mut navigator = Navigator::new(settings.core(), source, fetch_tx);
    navigator.start();

    let res = run_app(&mut terminal, &mut app, &mut navigator, &mut fetch_rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("{err}");
    }
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    navigator: &mut Navigator,
    fetch_rx: &mut mpsc::UnboundedReceiver<FetchEvent>,
) -> io::Result<()> {
    let mut event_stream = EventStream::new();

    loop {
        app.apply_notices(navigator.drain_notices());
        app.sync(navigator);
        terminal.draw(|f| ui(f, app))?;

        tokio::select! {
            // Keeps the spinner moving
            _ = tokio::time::sleep(tokio::time::Duration::from_millis(100)) => {}

            Some(Ok(event)) = event_stream.next() => {
                if let Event::Key(key) = event {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    let quit = match app.view {
                        View::Viewer => handle_viewer_input(app, navigator, key),
                        View::Settings => handle_settings_input(app, navigator, key),
                    };
                    if quit {
                        return Ok(());
                    }
                }
            }

            Some(event) = fetch_rx.recv() => {
                navigator.handle_fetch(event);
            }
        }
    }
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
}

fn handle_viewer_input(app: &mut App, navigator: &mut Navigator, key: KeyEvent) -> bool {
    if is_ctrl_c(&key) {
        return true;
    }

    match key.code {
        KeyCode::Char(' ') | KeyCode::Char('d') | KeyCode::Right => navigator.show_next(),
        KeyCode::Char('a') | KeyCode::Left => navigator.show_previous(),
        KeyCode::Char('f') => navigator.show_fresh(),
        KeyCode::Char('s') => save_current(app, navigator),
        KeyCode::Char('y') => {
            let record = navigator.current_record();
            app.report_copy(clipboard::copy_record(record.as_deref()));
        }
        KeyCode::Char('o') => open_current(app, navigator),
        KeyCode::Char('c') => app.open_settings(),
        KeyCode::Char('t') => {
            app.toggle_theme();
            persist_settings(app);
        }
        KeyCode::Char('q') | KeyCode::Esc => return true,
        _ => {}
    }
    false
}

fn handle_settings_input(app: &mut App, navigator: &mut Navigator, key: KeyEvent) -> bool {
    if is_ctrl_c(&key) {
        return true;
    }

    match key.code {
        KeyCode::Esc => app.close_settings(),
        KeyCode::Tab | KeyCode::Up | KeyCode::Down => app.form.toggle_field(),
        KeyCode::Backspace => app.form.pop(),
        KeyCode::Char(c) => app.form.push(c),
        KeyCode::Enter => {
            app.settings = app.form.apply(&app.settings);
            app.close_settings();
            persist_settings(app);

            if navigator.update_config(app.settings.core()) {
                app.clear_image();
                app.set_message("Settings updated, reloading cache...");
            } else {
                app.set_message("Settings saved.");
            }
        }
        _ => {}
    }
    false
}

fn persist_settings(app: &mut App) {
    if let Err(e) = app.settings.save() {
        log::warn!("failed to save settings: {}", e);
        app.set_message(format!("Failed to save settings: {}", e));
    }
}

fn save_current(app: &mut App, navigator: &Navigator) {
    let record = navigator.current_record();
    match download::save_record(record.as_deref(), &app.settings.download_dir) {
        Ok(path) => app.set_message(format!("Saved to {}", path.display())),
        Err(e) => {
            log::warn!("save failed: {}", e);
            app.set_message(format!("Save failed: {}", e));
        }
    }
}

fn open_current(app: &mut App, navigator: &Navigator) {
    let Some(record) = navigator.current_record() else {
        app.set_message("No image to open.");
        return;
    };
    if let Err(e) = webbrowser::open(&record.source_url) {
        log::warn!("could not open {}: {}", record.source_url, e);
        app.set_message(format!("Could not open browser: {}", e));
    }
}
