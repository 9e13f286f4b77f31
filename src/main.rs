use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::prelude::*;
use std::io;

mod config;
mod logging;
mod service;
mod storage;
mod tui;

use config::AppConfig;
use tui::app::App;

fn main() -> Result<()> {
    let config = AppConfig::from_env();
    logging::init_logging(&config)?;

    // Load notes before touching the terminal so storage errors print normally
    let mut app = App::new(&config)?;

    // Setup terminal
    enable_raw_mode().map_err(|e| anyhow::anyhow!("Failed to enable raw mode: {}. Make sure you're running in a terminal.", e))?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(|e| anyhow::anyhow!("Failed to enter alternate screen: {}. Make sure you're running in a terminal.", e))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(|e| anyhow::anyhow!("Failed to create terminal: {}. Make sure you're running in a terminal.", e))?;

    let outcome = run(&mut terminal, &mut app);

    // Restore terminal, even when the loop failed
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(ref e) = outcome {
        log::error!("exiting after error: {:#}", e);
    }
    outcome
}

fn run<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|f| app.render(f))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                app.handle_key(key.code, key.modifiers)?;
            }
        }
    }
    Ok(())
}
