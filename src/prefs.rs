//! Small persisted key-value store for user preferences (watchlist, theme).

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const WATCHLIST_KEY: &str = "watchlist";
pub const THEME_KEY: &str = "theme";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError>;
}

/// String map persisted as a JSON object; every `set` rewrites the file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Loads `path` if it exists. A missing file is an empty store; a corrupt
    /// one is logged and treated as empty so startup never fails on it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match read_values(&path) {
            Ok(values) => values,
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("Ignoring preferences at {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };
        info!("Loaded {} preference keys from {}", values.len(), path.display());
        Self { path, values }
    }
}

fn read_values(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }
}

/// Theme stored under `theme`; absent or unknown values mean dark.
pub fn load_theme(store: &dyn KeyValueStore) -> Theme {
    match store.get(THEME_KEY).as_deref() {
        None => Theme::Dark,
        Some("dark") => Theme::Dark,
        Some("light") => Theme::Light,
        Some(other) => {
            warn!("Unknown theme {:?} in preferences; using dark", other);
            Theme::Dark
        }
    }
}

pub fn save_theme(store: &mut dyn KeyValueStore, theme: Theme) -> Result<(), StoreError> {
    store.set(THEME_KEY, theme.as_str().to_string())
}

/// Watchlist stored under `watchlist` as a JSON array of coin ids.
pub fn load_watchlist_ids(store: &dyn KeyValueStore) -> Vec<String> {
    let Some(raw) = store.get(WATCHLIST_KEY) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(ids) => ids,
        Err(e) => {
            warn!("Watchlist preference is not a JSON string array ({}); starting empty", e);
            Vec::new()
        }
    }
}

pub fn save_watchlist_ids(store: &mut dyn KeyValueStore, ids: &[String]) -> Result<(), StoreError> {
    store.set(WATCHLIST_KEY, serde_json::to_string(ids)?)
}

#[cfg(test)]
pub(crate) fn scratch_path(tag: &str) -> PathBuf {
    use rand::Rng;
    let suffix: u64 = rand::thread_rng().gen_range(0..u64::MAX);
    std::env::temp_dir()
        .join(format!("coinwatch-{}-{}-{:x}", tag, std::process::id(), suffix))
        .join(crate::config::PREFS_FILE_NAME)
}
