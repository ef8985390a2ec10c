use anyhow::Result;
use clap::Parser;

mod api;
mod app;
mod config;
mod handler;
mod session;
mod transcript;
mod tui;
mod ui;

use api::ChatApi;
use app::App;
use config::Config;
use session::SessionStore;

#[derive(Parser)]
#[command(name = "wikichat")]
#[command(about = "Terminal client for the WikiGPT conversational assistant")]
struct Cli {
    /// Backend API base URL (overrides the config file)
    #[arg(long, env = "WIKICHAT_API_URL")]
    api_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging();

    let config = Config::load().unwrap_or_else(|_| Config::new());
    let base_url = cli
        .api_url
        .unwrap_or_else(|| config.api_base_url().to_string());

    let api = ChatApi::new(&base_url);
    let store = SessionStore::new();

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let mut app = App::new(api, store, events.sender());
    app.start();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;
        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event)?,
            None => break,
        }
    }

    tui::restore()?;
    Ok(())
}

/// Diagnostics go to a file under the data directory; the terminal belongs
/// to the TUI. Best-effort: without a usable log file the client runs
/// unlogged.
fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let Some(data_dir) = dirs::data_dir() else {
        return;
    };
    let log_dir = data_dir.join("wikichat");
    if std::fs::create_dir_all(&log_dir).is_err() {
        return;
    }
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("wikichat.log"))
    else {
        return;
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wikichat=info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false),
        )
        .init();
}
