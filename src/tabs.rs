use crate::coin::{CoinRecord, SortKey};
use crate::prefs::KeyValueStore;
use crate::selection::SelectionContext;
use crate::watchlist::Watchlist;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Tab {
    #[default]
    MarketCap,
    Volume,
    Gainers,
    New,
    Watchlist,
}

impl Tab {
    pub const ALL: [Tab; 5] = [Tab::MarketCap, Tab::Volume, Tab::Gainers, Tab::New, Tab::Watchlist];

    /// Server-side sort for this tab. The watchlist tab filters the
    /// default-ordered list on the client.
    pub fn sort_key(self) -> Option<SortKey> {
        match self {
            Tab::MarketCap => Some(SortKey::MarketCap),
            Tab::Volume => Some(SortKey::Volume),
            Tab::Gainers => Some(SortKey::Gainers),
            Tab::New => Some(SortKey::New),
            Tab::Watchlist => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tab::MarketCap => "MarketCap",
            Tab::Volume => "Volume",
            Tab::Gainers => "Gainers",
            Tab::New => "New",
            Tab::Watchlist => "Watchlist",
        }
    }

    pub fn index(self) -> usize {
        Tab::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }
}

/// Projection of the registry for the active tab. Search only applies
/// outside watchlist mode.
pub fn filter_coins<'a>(
    coins: &'a [CoinRecord],
    tab: Tab,
    search: &str,
    watchlist: &Watchlist,
) -> Vec<&'a CoinRecord> {
    if tab == Tab::Watchlist {
        return coins.iter().filter(|c| watchlist.contains(&c.id)).collect();
    }
    let needle = search.to_lowercase();
    coins.iter().filter(|c| c.matches_search(&needle)).collect()
}

/// State of the tabbed coin list: active tab, search text and cursor.
#[derive(Debug, Default)]
pub struct CoinTabs {
    active: Tab,
    search: String,
    cursor: usize,
}

impl CoinTabs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Tab {
        self.active
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns true when the tab changed, i.e. the owner must restart its
    /// poller with the new sort key.
    pub fn set_tab(&mut self, tab: Tab) -> bool {
        if tab == self.active {
            return false;
        }
        debug!("Switching coin tab {:?} -> {:?}", self.active, tab);
        self.active = tab;
        self.cursor = 0;
        true
    }

    pub fn push_search_char(&mut self, c: char) {
        self.search.push(c);
        self.cursor = 0;
    }

    pub fn pop_search_char(&mut self) {
        self.search.pop();
        self.cursor = 0;
    }

    pub fn clear_search(&mut self) {
        self.search.clear();
        self.cursor = 0;
    }

    pub fn visible<'a>(&self, coins: &'a [CoinRecord], watchlist: &Watchlist) -> Vec<&'a CoinRecord> {
        filter_coins(coins, self.active, &self.search, watchlist)
    }

    pub fn empty_message(&self) -> &'static str {
        if self.active == Tab::Watchlist {
            "Your watchlist is empty."
        } else {
            "No coins found."
        }
    }

    pub fn move_cursor(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.cursor = 0;
            return;
        }
        let last = len as isize - 1;
        self.cursor = (self.cursor as isize + delta).clamp(0, last) as usize;
    }

    /// Keeps the cursor inside the list after the list shrank.
    pub fn clamp_cursor(&mut self, len: usize) {
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    /// Selects the card at `index` of the visible list.
    pub fn select_card(
        &self,
        index: usize,
        coins: &[CoinRecord],
        watchlist: &Watchlist,
        selection: &SelectionContext,
    ) -> Option<String> {
        let coin = self.visible(coins, watchlist).get(index).map(|c| (*c).clone())?;
        let id = coin.id.clone();
        selection.set(Some(coin));
        Some(id)
    }

    /// Toggles the watchlist star of the card at `index`. Never touches the
    /// selection.
    pub fn toggle_card_watch(
        &self,
        index: usize,
        coins: &[CoinRecord],
        watchlist: &mut Watchlist,
        store: &mut dyn KeyValueStore,
    ) -> Option<(String, bool)> {
        let id = self.visible(coins, watchlist).get(index)?.id.clone();
        let watched = watchlist.toggle(&id, store);
        Some((id, watched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin::test_coin;
    use crate::prefs::{MemoryStore, WATCHLIST_KEY};

    fn market() -> Vec<CoinRecord> {
        vec![
            test_coin("bitcoin", "Bitcoin", "BTC", 60_000.0),
            test_coin("ethereum", "Ethereum", "ETH", 2_500.0),
            test_coin("cardano", "Cardano", "ADA", 0.35),
        ]
    }

    fn watchlist_of(ids: &[&str]) -> (MemoryStore, Watchlist) {
        let mut store = MemoryStore::default();
        store
            .set(WATCHLIST_KEY, serde_json::to_string(ids).unwrap())
            .unwrap();
        let watchlist = Watchlist::load(&store);
        (store, watchlist)
    }

    fn visible_ids(tabs: &CoinTabs, coins: &[CoinRecord], watchlist: &Watchlist) -> Vec<String> {
        tabs.visible(coins, watchlist).iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn test_watchlist_tab_shows_only_watched() {
        let coins = market();
        let (_store, watchlist) = watchlist_of(&["ethereum"]);
        let mut tabs = CoinTabs::new();
        assert_eq!(tabs.active(), Tab::MarketCap);

        assert!(tabs.set_tab(Tab::Watchlist));
        assert_eq!(visible_ids(&tabs, &coins, &watchlist), vec!["ethereum"]);
    }

    #[test]
    fn test_search_is_case_insensitive_on_name_or_symbol() {
        let coins = market();
        let (_store, watchlist) = watchlist_of(&[]);
        let mut tabs = CoinTabs::new();

        for c in "eth".chars() {
            tabs.push_search_char(c);
        }
        assert_eq!(visible_ids(&tabs, &coins, &watchlist), vec!["ethereum"]);

        tabs.clear_search();
        for c in "AdA".chars() {
            tabs.push_search_char(c);
        }
        assert_eq!(visible_ids(&tabs, &coins, &watchlist), vec!["cardano"]);

        tabs.clear_search();
        tabs.push_search_char('z');
        assert!(tabs.visible(&coins, &watchlist).is_empty());
        assert_eq!(tabs.empty_message(), "No coins found.");
    }

    #[test]
    fn test_search_ignored_in_watchlist_mode() {
        let coins = market();
        let (_store, watchlist) = watchlist_of(&["bitcoin", "cardano"]);
        let mut tabs = CoinTabs::new();
        tabs.push_search_char('x');
        tabs.set_tab(Tab::Watchlist);
        assert_eq!(visible_ids(&tabs, &coins, &watchlist), vec!["bitcoin", "cardano"]);
    }

    #[test]
    fn test_empty_watchlist_message() {
        let coins = market();
        let (_store, watchlist) = watchlist_of(&[]);
        let mut tabs = CoinTabs::new();
        tabs.set_tab(Tab::Watchlist);
        assert!(tabs.visible(&coins, &watchlist).is_empty());
        assert_eq!(tabs.empty_message(), "Your watchlist is empty.");
    }

    #[test]
    fn test_select_then_toggle_keeps_selection() {
        let coins = vec![test_coin("bitcoin", "Bitcoin", "BTC", 60_000.0)];
        let (mut store, mut watchlist) = watchlist_of(&[]);
        let selection = SelectionContext::new();
        let tabs = CoinTabs::new();

        assert_eq!(
            tabs.select_card(0, &coins, &watchlist, &selection).as_deref(),
            Some("bitcoin")
        );
        let generation = selection.generation();
        assert_eq!(selection.get().map(|c| c.id).as_deref(), Some("bitcoin"));

        let toggled = tabs.toggle_card_watch(0, &coins, &mut watchlist, &mut store);
        assert_eq!(toggled, Some(("bitcoin".to_string(), true)));
        assert_eq!(watchlist.ids(), &["bitcoin".to_string()]);
        assert_eq!(selection.selected_id().as_deref(), Some("bitcoin"));
        assert_eq!(selection.generation(), generation);
    }

    #[test]
    fn test_tab_sort_keys() {
        assert_eq!(Tab::MarketCap.sort_key(), Some(SortKey::MarketCap));
        assert_eq!(Tab::Watchlist.sort_key(), None);
        assert_eq!(Tab::New.index(), 3);

        let mut tabs = CoinTabs::new();
        assert!(!tabs.set_tab(Tab::MarketCap));
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let mut tabs = CoinTabs::new();
        tabs.move_cursor(5, 3);
        assert_eq!(tabs.cursor(), 2);
        tabs.move_cursor(-10, 3);
        assert_eq!(tabs.cursor(), 0);
        tabs.move_cursor(1, 0);
        assert_eq!(tabs.cursor(), 0);

        tabs.move_cursor(2, 3);
        tabs.clamp_cursor(1);
        assert_eq!(tabs.cursor(), 0);
    }
}
