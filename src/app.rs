use crate::charts::{ChartGrid, ChartSurfaceManager, Container, TerminalSurfaceFactory};
use crate::coin::SortKey;
use crate::config;
use crate::poller::{self, PollEvent, PollerConfig, PollerHandle, PollerId};
use crate::prefs::{self, KeyValueStore, Theme};
use crate::registry::{CoinRegistry, FailurePolicy};
use crate::selection::SelectionContext;
use crate::source::CoinSource;
use crate::tabs::{CoinTabs, Tab};
use crate::trade::{TradePanel, TradeSide};
use crate::watchlist::Watchlist;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::layout::Rect;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

const GRID_FAILURE_MESSAGE: &str = "Failed to load chart data.";
const TABS_FAILURE_MESSAGE: &str = "Failed to fetch coins. Showing fallback data.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    List,
    Charts,
    Detail,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::List => Focus::Charts,
            Focus::Charts => Focus::Detail,
            Focus::Detail => Focus::List,
        }
    }
}

pub struct App<S: CoinSource> {
    pub should_quit: bool,
    pub focus: Focus,
    pub editing_search: bool,
    pub theme: Theme,
    pub grid_registry: CoinRegistry,
    pub tabs_registry: CoinRegistry,
    pub charts: ChartGrid<TerminalSurfaceFactory>,
    pub tabs: CoinTabs,
    pub watchlist: Watchlist,
    pub selection: SelectionContext,
    pub panel: TradePanel,
    source: Arc<S>,
    store: Box<dyn KeyValueStore>,
    poll_interval: Duration,
    event_tx: UnboundedSender<PollEvent>,
    event_rx: UnboundedReceiver<PollEvent>,
    grid_poller: Option<PollerHandle>,
    tabs_poller: Option<PollerHandle>,
    next_generation: u64,
    chart_area: Rect,
}

impl<S: CoinSource> App<S> {
    pub fn new(source: S, store: Box<dyn KeyValueStore>, poll_interval: Duration) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let watchlist = Watchlist::load(store.as_ref());
        let theme = prefs::load_theme(store.as_ref());
        let tracked = config::DEFAULT_TRACKED_COINS
            .iter()
            .map(|id| id.to_string())
            .collect();

        Self {
            should_quit: false,
            focus: Focus::List,
            editing_search: false,
            theme,
            grid_registry: CoinRegistry::new(FailurePolicy::RetainStale, GRID_FAILURE_MESSAGE),
            tabs_registry: CoinRegistry::new(FailurePolicy::SubstituteFallback, TABS_FAILURE_MESSAGE),
            charts: ChartGrid::new(tracked, ChartSurfaceManager::new(TerminalSurfaceFactory, None)),
            tabs: CoinTabs::new(),
            watchlist,
            selection: SelectionContext::new(),
            panel: TradePanel::new(),
            source: Arc::new(source),
            store,
            poll_interval,
            event_tx,
            event_rx,
            grid_poller: None,
            tabs_poller: None,
            next_generation: 0,
            chart_area: Rect::default(),
        }
    }

    fn spawn(&mut self, id: PollerId, sort: Option<SortKey>) -> PollerHandle {
        self.next_generation += 1;
        let generation = self.next_generation;
        match id {
            PollerId::Grid => self.grid_registry.begin_generation(generation),
            PollerId::Tabs => self.tabs_registry.begin_generation(generation),
        }
        poller::spawn_poller(
            self.source.clone(),
            PollerConfig {
                id,
                generation,
                sort,
                interval: self.poll_interval,
            },
            self.event_tx.clone(),
        )
    }

    /// Starts both views' pollers. Must run inside a tokio runtime.
    pub fn start(&mut self) {
        let grid = self.spawn(PollerId::Grid, None);
        self.grid_poller = Some(grid);
        self.restart_tabs_poller();
    }

    fn restart_tabs_poller(&mut self) {
        if let Some(old) = self.tabs_poller.take() {
            old.cancel();
        }
        let sort = self.tabs.active().sort_key();
        let handle = self.spawn(PollerId::Tabs, sort);
        self.tabs_poller = Some(handle);
    }

    pub fn shutdown(&mut self) {
        if let Some(p) = self.grid_poller.take() {
            p.cancel();
        }
        if let Some(p) = self.tabs_poller.take() {
            p.cancel();
        }
        self.charts.teardown();
        info!("Dashboard shut down");
    }

    pub fn handle_poll_event(&mut self, event: PollEvent) {
        let outcome = match event.poller {
            PollerId::Grid => self.grid_registry.apply(event),
            PollerId::Tabs => {
                let outcome = self.tabs_registry.apply(event);
                let len = self.visible_len();
                self.tabs.clamp_cursor(len);
                outcome
            }
        };
        debug!("Applied poll event: {:?}", outcome);
    }

    pub fn drain_poll_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_poll_event(event);
        }
    }

    fn visible_len(&self) -> usize {
        self.tabs
            .visible(self.tabs_registry.coins(), &self.watchlist)
            .len()
    }

    pub fn chart_containers(&self) -> Vec<Option<Container>> {
        let slots = crate::ui::chart_slots(self.chart_area, self.charts.grid());
        (0..self.charts.tracked().len())
            .map(|i| slots.get(i).copied().map(crate::ui::container_of))
            .collect()
    }

    pub fn show_chart_error(&self) -> bool {
        self.grid_registry.error().is_some() || self.charts.manager().error().is_some()
    }

    /// Lays the dashboard out for a terminal of `size` and brings chart
    /// surfaces and the detail panel up to date.
    pub fn prepare_frame(&mut self, size: Rect) {
        let areas = crate::ui::layout_areas(size, self.show_chart_error());
        let grid_area = crate::ui::chart_grid_area(areas.charts);
        let resized = grid_area != self.chart_area;
        self.chart_area = grid_area;

        let containers = self.chart_containers();
        if resized {
            self.charts.resize(&containers);
        }
        self.charts.sync(self.grid_registry.coins(), &containers);
        self.panel.sync(&self.selection);
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if self.editing_search {
            match key.code {
                KeyCode::Enter => self.editing_search = false,
                KeyCode::Esc => {
                    self.tabs.clear_search();
                    self.editing_search = false;
                }
                KeyCode::Backspace => self.tabs.pop_search_char(),
                KeyCode::Char(c) => self.tabs.push_search_char(c),
                _ => {}
            }
            return;
        }

        if self.focus == Focus::Detail {
            match key.code {
                KeyCode::Char(c) if c.is_ascii_digit() || c == '.' || c == '-' => {
                    self.panel.push_amount_char(c);
                    return;
                }
                KeyCode::Backspace => {
                    self.panel.pop_amount_char();
                    return;
                }
                KeyCode::Char('b') => {
                    self.submit_trade(TradeSide::Buy);
                    return;
                }
                KeyCode::Char('s') => {
                    self.submit_trade(TradeSide::Sell);
                    return;
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::Char(c @ '1'..='5') => {
                let index = c as usize - '1' as usize;
                self.switch_tab(Tab::ALL[index]);
            }
            KeyCode::Char('/') => {
                self.focus = Focus::List;
                self.editing_search = true;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                let len = self.visible_len();
                self.tabs.move_cursor(-1, len);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self.visible_len();
                self.tabs.move_cursor(1, len);
            }
            KeyCode::Enter => self.select_current(),
            KeyCode::Char('w') => self.toggle_current_watch(),
            KeyCode::Char('x') => self.selection.set(None),
            KeyCode::Char('a') => {
                if self.charts.add_chart(self.grid_registry.coins()).is_none() {
                    debug!("Add chart ignored: every known coin is already charted");
                }
            }
            KeyCode::Char('+') => {
                let g = self.charts.grid();
                self.charts.set_grid(g.rows.saturating_add(1), g.cols);
            }
            KeyCode::Char('-') => {
                let g = self.charts.grid();
                self.charts.set_grid(g.rows.saturating_sub(1), g.cols);
            }
            KeyCode::Char(']') => {
                let g = self.charts.grid();
                self.charts.set_grid(g.rows, g.cols.saturating_add(1));
            }
            KeyCode::Char('[') => {
                let g = self.charts.grid();
                self.charts.set_grid(g.rows, g.cols.saturating_sub(1));
            }
            KeyCode::Char('t') => self.toggle_theme(),
            KeyCode::Char('e') => {
                self.grid_registry.dismiss_error();
                self.tabs_registry.dismiss_error();
                self.charts.manager_mut().dismiss_error();
            }
            _ => {}
        }
    }

    pub fn switch_tab(&mut self, tab: Tab) {
        if self.tabs.set_tab(tab) {
            self.restart_tabs_poller();
        }
    }

    pub fn select_current(&mut self) {
        let cursor = self.tabs.cursor();
        if let Some(id) = self.tabs.select_card(
            cursor,
            self.tabs_registry.coins(),
            &self.watchlist,
            &self.selection,
        ) {
            info!("Selected {}", id);
            self.panel.sync(&self.selection);
        }
    }

    pub fn toggle_current_watch(&mut self) {
        let cursor = self.tabs.cursor();
        if let Some((id, watched)) = self.tabs.toggle_card_watch(
            cursor,
            self.tabs_registry.coins(),
            &mut self.watchlist,
            self.store.as_mut(),
        ) {
            info!("Watchlist {} {}", if watched { "added" } else { "removed" }, id);
        }
        let len = self.visible_len();
        self.tabs.clamp_cursor(len);
    }

    fn submit_trade(&mut self, side: TradeSide) {
        self.panel.sync(&self.selection);
        if let Err(e) = self.panel.submit(side) {
            debug!("Trade rejected: {}", e);
        }
    }

    fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        if let Err(e) = prefs::save_theme(self.store.as_mut(), self.theme) {
            warn!("Failed to persist theme: {}", e);
        }
    }

    pub fn can_add_chart(&self) -> bool {
        self.charts.can_add_chart(self.grid_registry.coins())
    }

    pub async fn run(&mut self, terminal: &mut crate::tui::Tui) -> io::Result<()> {
        self.start();

        while !self.should_quit {
            self.drain_poll_events();
            let size = terminal.size()?;
            self.prepare_frame(Rect::new(0, 0, size.width, size.height));
            terminal.draw(|f| crate::ui::render(f, self))?;

            if event::poll(Duration::from_millis(16))? {
                match event::read()? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(width, height) => {
                        debug!("Terminal resized to {}x{}", width, height);
                    }
                    _ => {}
                }
            } else {
                tokio::task::yield_now().await;
            }
        }

        self.shutdown();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin::{CoinRecord, test_coin};
    use crate::poller::PollEventKind;
    use crate::poller::tests::ScriptedSource;
    use crate::prefs::{MemoryStore, WATCHLIST_KEY};

    fn app_with(store: MemoryStore) -> App<ScriptedSource> {
        App::new(ScriptedSource::new(Vec::new()), Box::new(store), Duration::from_secs(60))
    }

    fn loaded(app: &App<ScriptedSource>, poller: PollerId, seq: u64, coins: Vec<CoinRecord>) -> PollEvent {
        let generation = match poller {
            PollerId::Grid => app.grid_registry.generation(),
            PollerId::Tabs => app.tabs_registry.generation(),
        };
        PollEvent {
            poller,
            generation,
            seq,
            kind: PollEventKind::Loaded(coins),
        }
    }

    fn press(app: &mut App<ScriptedSource>, code: KeyCode) {
        app.handle_key(KeyEvent::from(code));
    }

    #[tokio::test]
    async fn test_select_then_star_keeps_selection() {
        let mut app = app_with(MemoryStore::default());
        app.start();
        let event = loaded(&app, PollerId::Tabs, 1, vec![test_coin("bitcoin", "Bitcoin", "BTC", 60_000.0)]);
        app.handle_poll_event(event);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.selection.selected_id().as_deref(), Some("bitcoin"));
        assert_eq!(app.panel.coin().map(|c| c.id.as_str()), Some("bitcoin"));

        press(&mut app, KeyCode::Char('w'));
        assert_eq!(app.watchlist.ids(), &["bitcoin".to_string()]);
        assert_eq!(app.selection.selected_id().as_deref(), Some("bitcoin"));
        assert_eq!(app.store.get(WATCHLIST_KEY).as_deref(), Some(r#"["bitcoin"]"#));
        app.shutdown();
    }

    fn requested_sorts(app: &App<ScriptedSource>) -> Vec<Option<SortKey>> {
        app.source.sorts.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_tab_switch_restarts_poller_and_ignores_old_generation() {
        let mut store = MemoryStore::default();
        store.set(WATCHLIST_KEY, r#"["ethereum"]"#.to_string()).unwrap();
        let mut app = app_with(store);
        app.start();
        // One request per poller; the grid asks for natural order.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let sorts = requested_sorts(&app);
        assert_eq!(sorts.len(), 2);
        assert_eq!(sorts.iter().filter(|s| s.is_none()).count(), 1);
        assert!(sorts.contains(&Some(SortKey::MarketCap)));

        let old = loaded(
            &app,
            PollerId::Tabs,
            1,
            vec![test_coin("bitcoin", "Bitcoin", "BTC", 1.0)],
        );
        let old_generation = app.tabs_registry.generation();

        press(&mut app, KeyCode::Char('5'));
        assert_eq!(app.tabs.active(), Tab::Watchlist);
        assert_ne!(app.tabs_registry.generation(), old_generation);

        app.handle_poll_event(old);
        assert!(app.tabs_registry.coins().is_empty());

        let market = vec![
            test_coin("bitcoin", "Bitcoin", "BTC", 60_000.0),
            test_coin("ethereum", "Ethereum", "ETH", 2_500.0),
            test_coin("cardano", "Cardano", "ADA", 0.35),
        ];
        let fresh = loaded(&app, PollerId::Tabs, 1, market);
        app.handle_poll_event(fresh);

        let visible: Vec<&str> = app
            .tabs
            .visible(app.tabs_registry.coins(), &app.watchlist)
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(visible, vec!["ethereum"]);

        // The restarted tabs poller re-requests right away with the new sort.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let sorts = requested_sorts(&app);
        assert_eq!(sorts.len(), 3);
        assert_eq!(sorts.last(), Some(&None));

        press(&mut app, KeyCode::Char('2'));
        assert_eq!(app.tabs.active(), Tab::Volume);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let sorts = requested_sorts(&app);
        assert_eq!(sorts.len(), 4);
        assert_eq!(sorts.last(), Some(&Some(SortKey::Volume)));
        app.shutdown();
    }

    #[tokio::test]
    async fn test_trade_keys_in_detail_focus() {
        let mut app = app_with(MemoryStore::default());
        app.start();
        let event = loaded(&app, PollerId::Tabs, 1, vec![test_coin("bitcoin", "Bitcoin", "BTC", 60_000.0)]);
        app.handle_poll_event(event);
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, Focus::Detail);

        press(&mut app, KeyCode::Char('0'));
        press(&mut app, KeyCode::Char('b'));
        assert!(app.panel.ledger().is_empty());
        assert_eq!(app.panel.error(), Some("Please enter a valid amount."));

        press(&mut app, KeyCode::Backspace);
        for c in "1.5".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.panel.ledger().len(), 1);
        assert_eq!(app.panel.ledger()[0].quantity, 1.5);
        assert_eq!(app.panel.ledger()[0].price, 60_000.0);
        app.shutdown();
    }

    #[tokio::test]
    async fn test_add_chart_and_frame_sync() {
        let mut app = app_with(MemoryStore::default());
        app.start();
        let market = vec![
            test_coin("bitcoin", "Bitcoin", "BTC", 60_000.0),
            test_coin("ethereum", "Ethereum", "ETH", 2_500.0),
            test_coin("cardano", "Cardano", "ADA", 0.35),
            test_coin("solana", "Solana", "SOL", 150.0),
        ];
        let event = loaded(&app, PollerId::Grid, 1, market);
        app.handle_poll_event(event);

        app.prepare_frame(Rect::new(0, 0, 160, 60));
        assert_eq!(app.charts.manager().len(), 3);

        assert!(app.can_add_chart());
        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.charts.tracked().last().map(String::as_str), Some("solana"));
        assert!(!app.can_add_chart());
        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.charts.tracked().len(), 4);

        app.prepare_frame(Rect::new(0, 0, 160, 60));
        assert_eq!(app.charts.manager().len(), 4);
        app.shutdown();
        assert!(app.charts.manager().is_empty());
    }

    #[tokio::test]
    async fn test_search_mode_captures_keys() {
        let mut app = app_with(MemoryStore::default());
        press(&mut app, KeyCode::Char('/'));
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.should_quit);
        assert_eq!(app.tabs.search(), "q");
        press(&mut app, KeyCode::Enter);
        assert!(!app.editing_search);
        assert_eq!(app.tabs.search(), "q");
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_escape_in_search_clears_text() {
        let mut app = app_with(MemoryStore::default());
        press(&mut app, KeyCode::Char('/'));
        for c in "eth".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Esc);
        assert!(!app.editing_search);
        assert_eq!(app.tabs.search(), "");
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn test_theme_toggle_is_persisted() {
        let mut app = app_with(MemoryStore::default());
        assert_eq!(app.theme, Theme::Dark);
        press(&mut app, KeyCode::Char('t'));
        assert_eq!(app.theme, Theme::Light);
        assert_eq!(app.store.get(prefs::THEME_KEY).as_deref(), Some("light"));
    }
}
