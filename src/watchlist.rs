use crate::prefs::{self, KeyValueStore};
use tracing::{info, warn};

/// User-curated coin ids in insertion order, without duplicates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Watchlist {
    ids: Vec<String>,
}

impl Watchlist {
    /// Reads the persisted list once. Duplicates in storage are collapsed.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let mut ids: Vec<String> = Vec::new();
        for id in prefs::load_watchlist_ids(store) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        info!("Watchlist loaded with {} coins", ids.len());
        Self { ids }
    }

    #[cfg(test)]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|w| w == id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Adds or removes `id` and writes the whole list back. Returns whether
    /// the coin is watched afterwards. A failed write keeps the in-memory
    /// change and is only logged.
    pub fn toggle(&mut self, id: &str, store: &mut dyn KeyValueStore) -> bool {
        let watched = if let Some(pos) = self.ids.iter().position(|w| w == id) {
            self.ids.remove(pos);
            false
        } else {
            self.ids.push(id.to_string());
            true
        };

        if let Err(e) = prefs::save_watchlist_ids(store, &self.ids) {
            warn!("Failed to persist watchlist: {}", e);
        }
        watched
    }
}
