use anyhow::Result;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use promptmidi::{app::ViewerState, config::AppConfig, setup_tracing, store::CompositionStore, ui};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use tracing::info;

fn main() -> Result<()> {
    setup_tracing()?;

    let config = AppConfig::load()?;
    let store = match CompositionStore::open_existing(config.database_path()) {
        Ok(store) => store,
        Err(err) => {
            println!("{err}");
            return Ok(());
        }
    };
    let mut state = ViewerState::new(store.list()?);
    info!(records = state.records.len(), "opened composition viewer");

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    enable_raw_mode()?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let ui_result = ui::run(&mut terminal, &mut state, &store);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    ui_result
}
