use crate::config::{self, Settings};
use crate::links;
use crate::model::View;
use crate::scanner::{CommandScanner, DeviceEvent, NullScanner, ScannerDevice};
use crate::session::SessionController;
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::stdout;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Command,
}

/// Text the user is typing: the `:` command line, or the link field in the
/// card factory.
#[derive(Debug, Default)]
pub struct InputState {
    pub mode: InputMode,
    pub buffer: String,
}

#[derive(Debug, Default)]
pub struct AppStartupOptions {
    pub settings: Settings,
}

pub fn run() -> Result<()> {
    let settings = config::load_settings()?;
    run_with_startup(AppStartupOptions { settings })
}

pub fn run_with_startup(options: AppStartupOptions) -> Result<()> {
    let (event_tx, event_rx) = mpsc::channel();
    let device = build_scanner(&options.settings, event_tx);
    let mut controller = SessionController::new(device, &options.settings);
    info!(device = controller.device_name(), "session started");

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut input = InputState::default();
    let mut last_tick = Instant::now();

    let result: Result<()> = loop {
        pump_device_events(&mut controller, &event_rx);

        if controller.dirty || last_tick.elapsed() > Duration::from_millis(250) {
            if let Err(err) = terminal.draw(|frame| crate::ui::draw(frame, &controller, &input)) {
                break Err(err.into());
            }
            controller.dirty = false;
            last_tick = Instant::now();
        }

        match event::poll(Duration::from_millis(33)) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(err) => break Err(err.into()),
        }

        let event = match event::read() {
            Ok(event) => event,
            Err(err) => break Err(err.into()),
        };
        let Event::Key(key) = event else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if handle_key(&mut controller, &mut input, key) {
            break Ok(());
        }
    };

    controller.shutdown();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn build_scanner(settings: &Settings, events: Sender<DeviceEvent>) -> Box<dyn ScannerDevice> {
    if settings.scanner_command.is_empty() {
        return Box::new(NullScanner::new(events));
    }
    match CommandScanner::new(&settings.scanner_command, events.clone()) {
        Ok(scanner) => Box::new(scanner),
        Err(err) => {
            let error = format!("{err:#}");
            warn!(%error, "scanner command unusable, camera disabled");
            Box::new(NullScanner::new(events))
        }
    }
}

fn pump_device_events(controller: &mut SessionController, events: &Receiver<DeviceEvent>) {
    loop {
        match events.try_recv() {
            Ok(event) => controller.handle_device_event(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
}

/// Returns `true` when the app should quit.
fn handle_key(controller: &mut SessionController, input: &mut InputState, key: KeyEvent) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if input.mode == InputMode::Command {
        match key.code {
            KeyCode::Esc => {
                input.mode = InputMode::Normal;
                input.buffer.clear();
            }
            KeyCode::Enter => {
                let raw = std::mem::take(&mut input.buffer);
                input.mode = InputMode::Normal;
                return run_command(controller, &raw);
            }
            KeyCode::Backspace => {
                input.buffer.pop();
            }
            KeyCode::Char(ch) => input.buffer.push(ch),
            _ => {}
        }
        controller.dirty = true;
        return false;
    }

    match controller.state().view {
        View::Home => match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('g') | KeyCode::Enter => controller.navigate(View::Game),
            KeyCode::Char('c') => {
                input.buffer.clear();
                controller.navigate(View::Creator);
            }
            KeyCode::Char('l') => copy_with_status(controller, links::LOGIN_URL, "Login link"),
            KeyCode::Char(':') => open_command_line(controller, input),
            _ => {}
        },
        View::Game => handle_game_key(controller, input, key),
        View::Creator => handle_creator_key(controller, input, key),
    }
    false
}

fn handle_game_key(controller: &mut SessionController, input: &mut InputState, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            if controller.is_scanning() {
                controller.stop_scan();
            } else {
                controller.navigate(View::Home);
            }
        }
        KeyCode::Char('s') => controller.start_scan(),
        KeyCode::Char('x') => controller.stop_scan(),
        KeyCode::Char('v') | KeyCode::Char(' ') => controller.reveal(),
        KeyCode::Char('n') => controller.draw_next_card(),
        KeyCode::Char('a') => controller.rescan(),
        KeyCode::Char('y') => {
            if let Some(url) = controller.embed_url() {
                copy_with_status(controller, &url, "Player link");
            }
        }
        KeyCode::Char(':') => open_command_line(controller, input),
        _ => {}
    }
}

fn handle_creator_key(controller: &mut SessionController, input: &mut InputState, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            input.buffer.clear();
            controller.navigate(View::Home);
        }
        KeyCode::Enter => {
            let link = input.buffer.clone();
            controller.create_card(&link);
        }
        KeyCode::Char('y') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if let Some(url) = controller.state().generated_card_image.clone() {
                copy_with_status(controller, &url, "Card image link");
            }
        }
        KeyCode::Backspace => {
            input.buffer.pop();
            controller.dirty = true;
        }
        KeyCode::Char(ch) => {
            input.buffer.push(ch);
            controller.dirty = true;
        }
        _ => {}
    }
}

fn open_command_line(controller: &mut SessionController, input: &mut InputState) {
    input.mode = InputMode::Command;
    input.buffer.clear();
    controller.dirty = true;
}

/// Returns `true` when the command asks to quit.
fn run_command(controller: &mut SessionController, raw: &str) -> bool {
    let input = raw.trim();
    if input.is_empty() {
        controller.status = String::from("No command");
        controller.dirty = true;
        return false;
    }

    let mut split = input.splitn(2, char::is_whitespace);
    let command = split.next().unwrap_or_default();
    let rest = split.next().unwrap_or("").trim();

    match command {
        "help" => {
            controller.status = String::from(
                "Commands: track <link> | card <link> | scan | stop | reveal | next | rescan | home | game | creator | quit",
            );
            controller.dirty = true;
        }
        "track" => {
            if rest.is_empty() {
                controller.status = String::from("Usage: track <link>");
                controller.dirty = true;
            } else {
                controller.navigate(View::Game);
                controller.enter_track(rest);
            }
        }
        "card" => {
            if rest.is_empty() {
                controller.status = String::from("Usage: card <link>");
                controller.dirty = true;
            } else {
                controller.navigate(View::Creator);
                controller.create_card(rest);
            }
        }
        "scan" => controller.start_scan(),
        "stop" => controller.stop_scan(),
        "reveal" => controller.reveal(),
        "next" => controller.draw_next_card(),
        "rescan" => controller.rescan(),
        "home" => controller.navigate(View::Home),
        "game" => controller.navigate(View::Game),
        "creator" => controller.navigate(View::Creator),
        "quit" | "q" => return true,
        _ => {
            controller.status = String::from("Unknown command. Use :help");
            controller.dirty = true;
        }
    }
    false
}

fn copy_with_status(controller: &mut SessionController, text: &str, what: &str) {
    controller.status = match copy_to_clipboard(text) {
        Ok(()) => format!("{what} copied to clipboard"),
        Err(err) => format!("{what}: {text} (clipboard error: {err:#})"),
    };
    controller.dirty = true;
}

fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new().context("clipboard unavailable")?;
    clipboard
        .set_text(text.to_string())
        .context("failed to set clipboard text")?;
    Ok(())
}
