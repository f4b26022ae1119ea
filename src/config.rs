use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;

static HTTP_TIMEOUT: OnceLock<Duration> = OnceLock::new();

pub const POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_SERVER_PORT: u16 = 3000;
pub const COINS_PATH: &str = "/api/coins";

pub const DEFAULT_GRID_ROWS: u16 = 2;
pub const DEFAULT_GRID_COLS: u16 = 2;
pub const MAX_GRID_DIM: u16 = 6;

pub const DEFAULT_TRACKED_COINS: &[&str] = &["bitcoin", "ethereum", "cardano"];

pub const PREFS_FILE_NAME: &str = "prefs.json";
pub const LOG_FILE_NAME: &str = "coinwatch.log";

/// Runtime settings resolved from CLI flags, then environment, then defaults.
#[derive(Clone, Debug)]
pub struct Settings {
    pub api_url: String,
    pub state_dir: PathBuf,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
}

impl Settings {
    pub fn resolve(
        api_url: Option<String>,
        state_dir: Option<PathBuf>,
        poll_secs: Option<u64>,
    ) -> Self {
        let api_url = api_url
            .or_else(|| env_non_empty("COINWATCH_API_URL"))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let state_dir = state_dir
            .or_else(|| env_non_empty("COINWATCH_STATE_DIR").map(PathBuf::from))
            .unwrap_or_else(default_state_dir);
        let poll_secs = match poll_secs {
            Some(0) => {
                warn!("--poll-secs 0 is not allowed; using {}", POLL_INTERVAL_SECS);
                POLL_INTERVAL_SECS
            }
            Some(secs) => secs,
            None => POLL_INTERVAL_SECS,
        };

        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            state_dir,
            poll_interval: Duration::from_secs(poll_secs),
            http_timeout: configured_http_timeout(),
        }
    }

    pub fn prefs_path(&self) -> PathBuf {
        self.state_dir.join(PREFS_FILE_NAME)
    }

    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join(LOG_FILE_NAME)
    }
}

pub fn configured_http_timeout() -> Duration {
    *HTTP_TIMEOUT.get_or_init(|| {
        let Some(raw) = env_non_empty("COINWATCH_HTTP_TIMEOUT_SECS") else {
            return Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS);
        };
        match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                warn!(
                    "Invalid COINWATCH_HTTP_TIMEOUT_SECS={} ; defaulting to {}s",
                    raw, DEFAULT_HTTP_TIMEOUT_SECS
                );
                Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)
            }
        }
    })
}

pub fn default_state_dir() -> PathBuf {
    std::env::var("HOME")
        .ok()
        .filter(|home| !home.trim().is_empty())
        .map(|home| PathBuf::from(home).join(".coinwatch"))
        .unwrap_or_else(|| PathBuf::from(".coinwatch"))
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
