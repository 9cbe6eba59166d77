mod app;
mod config;
mod crypto;
mod db;
mod error;
mod instance;
mod logging;
mod network;
mod settings;
mod task;
mod ui;
mod vim;

use anyhow::{Context, Result};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::sync::Arc;
use tracing::{error, info};

use crate::app::App;
use crate::config::Settings;
use crate::instance::Acquire;
use crate::network::WebNetworkManager;

const SOCKET_NAME: &str = "tui-rss.sock";

fn main() -> Result<()> {
    let _log_guard = logging::init()?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting");

    let socket = Settings::data_dir()?.join(SOCKET_NAME);
    let listener = match instance::acquire(&socket)? {
        Acquire::Primary(listener) => listener,
        Acquire::AlreadyRunning => {
            info!("another instance is running, handing over");
            println!("TUI-RSS is already running.");
            return Ok(());
        }
    };

    let settings = Settings::load_or_default()?;
    info!(path = ?settings.path(), "settings ready");
    let network = Arc::new(WebNetworkManager::new());
    let mut app = App::new(settings, network, Some(listener))?;

    let mut terminal = setup_terminal()?;
    let result = run(&mut terminal, &mut app);

    app.cleanup_resources();
    restore_terminal(&mut terminal)?;

    if let Err(e) = &result {
        error!(error = %e, "main loop failed");
    }
    info!("exiting");
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    while !app.should_quit {
        if app.redraw_requested {
            terminal.clear()?;
            app.redraw_requested = false;
        }
        terminal.draw(|frame| ui::render(frame, app))?;
        app.handle_events()?;
    }
    Ok(())
}
