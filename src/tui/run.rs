//! TUI entry point and terminal setup.

use std::io;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::CrosstermBackend, Terminal};
use tracing::info;

use crate::context::AppContext;
use crate::tui::app::App;

/// Initialise and run the terminal user interface.
///
/// Must be called with a tokio runtime entered: the task list is fetched and
/// mutations run as tasks on that runtime while this thread draws.
pub fn run_tui(ctx: &AppContext) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    info!(api_url = %ctx.config.api_url, "starting ui");
    let mut app = App::new(ctx.cache.clone(), ctx.mutations.clone());
    app.request_refresh();
    let result = app.run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}
