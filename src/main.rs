use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod app;
mod chat;
mod config;
mod error;
mod handler;
mod session;
mod stream;
mod tui;
mod ui;

use app::App;
use config::Config;
use session::{SessionHandle, SessionUpdate};
use tui::AppEvent;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config = Config::load().unwrap_or_else(|_| Config::new());
    let mut app = App::new(&config);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    result
}

/// The terminal owns stderr, so logs go to a file. `RUST_LOG` filters as
/// usual.
fn init_logging() -> Result<()> {
    let path = Config::log_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

enum Step {
    Input(Option<AppEvent>),
    Session(Option<SessionUpdate>),
}

/// Resolves to the next update of the in-flight turn, or never if there is
/// no turn running (terminal events still wake the loop).
async fn next_session_update(session: &mut Option<SessionHandle>) -> Option<SessionUpdate> {
    match session.as_mut() {
        Some(live) => live.recv().await,
        None => std::future::pending().await,
    }
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let step = {
            let session = &mut app.session;
            tokio::select! {
                event = events.next() => Step::Input(event),
                update = next_session_update(session) => Step::Session(update),
            }
        };

        match step {
            Step::Input(Some(event)) => handler::handle_event(app, event),
            Step::Input(None) => break,
            Step::Session(Some(update)) => app.apply_update(update),
            // Channel gone without a terminal event: clean up anyway.
            Step::Session(None) => app.finish_turn(None),
        }
    }

    Ok(())
}
