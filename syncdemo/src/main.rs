//! `SyncDemo`: digest-sync group chat in the terminal.
//!
//! Launches the TUI on an in-process loopback sync group. Configuration via
//! CLI flags, environment variables, or config file
//! (`~/.config/syncdemo/config.toml`).
//!
//! ```bash
//! # Join room "lobby" as alice, with a local echo peer to talk to
//! cargo run --bin syncdemo -- --nick alice --chatroom lobby \
//!     --prefix /ndn/alice --bot bob
//!
//! # Or via environment variables
//! SYNCDEMO_NICK=alice SYNCDEMO_CHATROOM=lobby SYNCDEMO_PREFIX=/ndn/alice cargo run
//! ```

use std::io;
use std::path::Path;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use syncdemo::app::App;
use syncdemo::config::{CliArgs, ClientConfig, Settings, SyncConfig};
use syncdemo::controller::ViewEvent;
use syncdemo::net::{self, ControllerHandle, NetCommand};
use syncdemo::sync::loopback::LoopbackHub;
use syncdemo::ui;

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    // Load and resolve configuration (CLI args > env > config file > defaults).
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Initialize logging before terminal setup (logs go to file, not stdout).
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!("syncdemo starting");

    let hub = LoopbackHub::new();
    let mut handle =
        net::spawn_controller(hub.clone(), config.sync.clone(), config.settings.clone())
            .map_err(io::Error::other)?;

    let bot = match (cli.bot.as_deref(), config.settings.chatroom()) {
        (Some(nick), Some(room)) => Some(spawn_bot(&hub, config.sync.clone(), nick, room)?),
        (Some(_), None) => {
            eprintln!("Warning: --bot needs a chatroom, not starting it");
            None
        }
        _ => None,
    };

    // Set up terminal.
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app.
    let result = run_app(&mut terminal, &mut handle, &config);

    // Restore terminal.
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    handle.shutdown().await;
    if let Some(bot) = bot {
        bot.shutdown().await;
    }

    tracing::info!("syncdemo exiting");
    result
}

/// Initialize file-based logging.
///
/// Logs are written to a file (never stdout, since ratatui owns the terminal).
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("syncdemo.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Main application loop.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    handle: &mut ControllerHandle,
    client_config: &ClientConfig,
) -> io::Result<()> {
    let mut app = App::new()
        .with_timestamp_format(client_config.ui.timestamp_format.clone())
        .with_settings(client_config.settings.clone());
    if !client_config.settings.is_complete() {
        app.push_system_message("Set /nick, /room and /prefix to join a room".to_string());
    }

    loop {
        // Step 1: Draw the UI frame.
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Step 2: Drain all pending view events (non-blocking).
        drain_view_events(&mut app, &mut handle.views);

        // Step 3: Poll for terminal input events.
        if event::poll(client_config.ui.poll_timeout)? {
            let command = match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key_event(key),
                Event::Resize(..) | Event::FocusGained => Some(NetCommand::Refit),
                _ => None,
            };
            if let Some(command) = command {
                send_command(&mut app, &handle.commands, command);
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn send_command(app: &mut App, tx: &mpsc::Sender<NetCommand>, command: NetCommand) {
    match tx.try_send(command) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            app.push_system_message("Controller busy, input dropped".to_string());
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            app.push_system_message("Controller stopped".to_string());
        }
    }
}

/// Drain all pending `ViewEvent`s from the receiver and apply them to the app.
fn drain_view_events(app: &mut App, rx: &mut mpsc::UnboundedReceiver<ViewEvent>) {
    while let Ok(event) = rx.try_recv() {
        app.apply(event);
    }
}

/// Run a second member in the same room that answers every message it
/// fetches from someone else.
fn spawn_bot(
    hub: &LoopbackHub,
    config: SyncConfig,
    nick: &str,
    room: &str,
) -> io::Result<ControllerHandle> {
    let settings = Settings::new(nick.to_string(), room.to_string(), format!("/ndn/{nick}"));
    let mut handle =
        net::spawn_controller(hub.clone(), config, settings).map_err(io::Error::other)?;

    tracing::info!(nick, room, "echo peer started");
    let commands = handle.commands.clone();
    let mut views = std::mem::replace(&mut handle.views, mpsc::unbounded_channel().1);
    let nick = nick.to_string();
    tokio::spawn(async move {
        while let Some(event) = views.recv().await {
            if let ViewEvent::Message(message) = event
                && message.from != nick
            {
                let text = format!("{} said: {}", message.from, message.data);
                if commands.send(NetCommand::Publish { text }).await.is_err() {
                    break;
                }
            }
        }
    });

    Ok(handle)
}
