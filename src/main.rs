mod app;
mod charts;
mod coin;
mod config;
mod error;
mod poller;
mod prefs;
mod registry;
mod selection;
mod server;
mod source;
mod tabs;
mod trade;
mod tui;
mod ui;
mod watchlist;

use app::App;
use clap::Parser;
use config::Settings;
use prefs::FileStore;
use source::HttpCoinSource;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "CoinWatch-TUI: live crypto market dashboard with simulated trading",
    after_help = "EXAMPLES:
    # Start the mock coin API
    cargo run --release -- --serve --port 3000

    # Launch the dashboard against it
    cargo run --release -- --api-url http://127.0.0.1:3000

    # Poll every 30 seconds and keep preferences elsewhere
    cargo run --release -- --poll-secs 30 --state-dir /tmp/coinwatch"
)]
struct Args {
    /// Run the mock coin API instead of the dashboard
    #[arg(long)]
    serve: bool,

    /// Mock API port (default: 3000). Ignored unless --serve is set.
    #[arg(long, default_value_t = config::DEFAULT_SERVER_PORT)]
    port: u16,

    /// Base URL of the coin API (default: COINWATCH_API_URL or http://127.0.0.1:3000)
    #[arg(long)]
    api_url: Option<String>,

    /// Directory for preferences and the log file (default: COINWATCH_STATE_DIR or ~/.coinwatch)
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Seconds between polls (default: 10)
    #[arg(long)]
    poll_secs: Option<u64>,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("coinwatch_tui=info"))
}

/// The dashboard owns the terminal, so its logs go to a file in the state dir.
fn init_file_logging(settings: &Settings) -> io::Result<()> {
    fs::create_dir_all(&settings.state_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(settings.log_path())?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if args.serve {
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
        match server::run_mock_api_server(args.port).await {
            Ok(_) => info!("Mock API exited."),
            Err(e) => error!("Mock API failed: {}", e),
        }
        return Ok(());
    }

    let settings = Settings::resolve(args.api_url, args.state_dir, args.poll_secs);
    init_file_logging(&settings)?;
    info!(
        "Starting dashboard: api_url={} state_dir={} poll={}s timeout={}s",
        settings.api_url,
        settings.state_dir.display(),
        settings.poll_interval.as_secs(),
        settings.http_timeout.as_secs()
    );

    let store = FileStore::open(settings.prefs_path());
    let source = HttpCoinSource::new(settings.api_url.clone(), settings.http_timeout);

    let mut terminal = tui::init()?;
    let mut app = App::new(source, Box::new(store), settings.poll_interval);
    let res = app.run(&mut terminal).await;

    tui::restore()?;

    if let Err(e) = res {
        error!("Error: {:?}", e);
    }

    Ok(())
}
