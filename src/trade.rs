use crate::coin::CoinRecord;
use crate::error::TradeError;
use crate::selection::SelectionContext;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

const TX_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const TX_ID_LEN: usize = 11;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn label(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

/// A locally simulated fill. Never sent anywhere, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulatedTrade {
    pub side: TradeSide,
    pub quantity: f64,
    pub price: f64,
    pub timestamp: String,
    pub status: &'static str,
    pub id: String,
}

/// Detail panel for the selected coin plus its in-memory trade ledger.
#[derive(Debug, Default)]
pub struct TradePanel {
    coin: Option<CoinRecord>,
    seen_generation: u64,
    amount_input: String,
    ledger: Vec<SimulatedTrade>,
    error: Option<String>,
}

impl TradePanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follows the selection. Picking a different coin, or clearing the
    /// selection, unmounts the panel and drops its ledger and input.
    pub fn sync(&mut self, selection: &SelectionContext) {
        let generation = selection.generation();
        if generation == self.seen_generation {
            return;
        }
        self.seen_generation = generation;

        let next = selection.get();
        let same_coin = match (&self.coin, &next) {
            (Some(current), Some(next)) => current.id == next.id,
            _ => false,
        };
        if same_coin {
            self.coin = next;
            return;
        }

        if let Some(coin) = &next {
            debug!("Mounting detail panel for {}", coin.id);
        }
        self.coin = next;
        self.amount_input.clear();
        self.ledger.clear();
        self.error = None;
    }

    pub fn coin(&self) -> Option<&CoinRecord> {
        self.coin.as_ref()
    }

    pub fn amount_input(&self) -> &str {
        &self.amount_input
    }

    #[cfg(test)]
    pub fn set_amount(&mut self, raw: &str) {
        self.amount_input = raw.to_string();
    }

    pub fn push_amount_char(&mut self, c: char) {
        if c.is_ascii_digit() || matches!(c, '.' | '-') {
            self.amount_input.push(c);
        }
    }

    pub fn pop_amount_char(&mut self) {
        self.amount_input.pop();
    }

    /// Newest first.
    pub fn ledger(&self) -> &[SimulatedTrade] {
        &self.ledger
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Validates the typed amount and records a trade at the displayed price.
    /// On failure the ledger and the input are left untouched.
    pub fn submit(&mut self, side: TradeSide) -> Result<&SimulatedTrade, TradeError> {
        let result = self.try_submit(side);
        match &result {
            Ok(()) => self.error = None,
            Err(e) => self.error = Some(e.to_string()),
        }
        result?;
        Ok(&self.ledger[0])
    }

    fn try_submit(&mut self, side: TradeSide) -> Result<(), TradeError> {
        let coin = self.coin.as_ref().ok_or(TradeError::NoSelection)?;
        let quantity = parse_quantity(&self.amount_input)?;

        let trade = SimulatedTrade {
            side,
            quantity,
            price: coin.price,
            timestamp: Utc::now().to_rfc3339(),
            status: "completed",
            id: mock_tx_id(&mut rand::thread_rng()),
        };
        info!(
            "Simulated {} {} {} at {:.2} ({})",
            side.label(),
            trade.quantity,
            coin.symbol,
            trade.price,
            trade.id
        );
        self.ledger.insert(0, trade);
        self.amount_input.clear();
        Ok(())
    }
}

/// Strictly positive, finite number.
pub fn parse_quantity(raw: &str) -> Result<f64, TradeError> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(TradeError::InvalidAmount),
    }
}

fn mock_tx_id(rng: &mut impl Rng) -> String {
    let suffix: String = (0..TX_ID_LEN)
        .map(|_| TX_ID_ALPHABET[rng.gen_range(0..TX_ID_ALPHABET.len())] as char)
        .collect();
    format!("mock-tx-{}", suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin::test_coin;

    fn panel_for(price: f64) -> (SelectionContext, TradePanel) {
        let selection = SelectionContext::new();
        selection.set(Some(test_coin("bitcoin", "Bitcoin", "BTC", price)));
        let mut panel = TradePanel::new();
        panel.sync(&selection);
        (selection, panel)
    }

    #[test]
    fn test_invalid_amounts_leave_ledger_unchanged() {
        let (_selection, mut panel) = panel_for(60_000.0);

        for raw in ["0", "-5", "abc", "", "NaN", "inf"] {
            panel.set_amount(raw);
            assert_eq!(panel.submit(TradeSide::Buy), Err(TradeError::InvalidAmount), "{}", raw);
            assert!(panel.ledger().is_empty());
            assert_eq!(panel.error(), Some("Please enter a valid amount."));
            assert_eq!(panel.amount_input(), raw);
        }
    }

    #[test]
    fn test_valid_trade_is_prepended_at_displayed_price() {
        let (_selection, mut panel) = panel_for(60_000.0);

        panel.set_amount("2");
        panel.submit(TradeSide::Sell).unwrap();
        panel.set_amount("1.5");
        let trade = panel.submit(TradeSide::Buy).unwrap().clone();

        assert_eq!(trade.quantity, 1.5);
        assert_eq!(trade.price, 60_000.0);
        assert_eq!(trade.status, "completed");
        assert!(trade.id.starts_with("mock-tx-"));
        assert_eq!(trade.id.len(), "mock-tx-".len() + TX_ID_LEN);

        assert_eq!(panel.ledger().len(), 2);
        assert_eq!(panel.ledger()[0], trade);
        assert_eq!(panel.ledger()[1].side, TradeSide::Sell);
        assert_eq!(panel.amount_input(), "");
        assert_eq!(panel.error(), None);
    }

    #[test]
    fn test_submit_without_selection() {
        let mut panel = TradePanel::new();
        panel.set_amount("1");
        assert_eq!(panel.submit(TradeSide::Buy), Err(TradeError::NoSelection));
        assert!(panel.ledger().is_empty());
    }

    #[test]
    fn test_ledger_resets_on_remount() {
        let (selection, mut panel) = panel_for(60_000.0);
        panel.set_amount("1");
        panel.submit(TradeSide::Buy).unwrap();

        // Re-selecting the same coin keeps the panel mounted.
        selection.set(Some(test_coin("bitcoin", "Bitcoin", "BTC", 61_000.0)));
        panel.sync(&selection);
        assert_eq!(panel.ledger().len(), 1);
        assert_eq!(panel.coin().map(|c| c.price), Some(61_000.0));

        selection.set(None);
        panel.sync(&selection);
        assert!(panel.coin().is_none());

        selection.set(Some(test_coin("bitcoin", "Bitcoin", "BTC", 60_000.0)));
        panel.sync(&selection);
        assert!(panel.ledger().is_empty());
    }

    #[test]
    fn test_amount_input_filters_characters() {
        let mut panel = TradePanel::new();
        for c in "1x.e5E!".chars() {
            panel.push_amount_char(c);
        }
        assert_eq!(panel.amount_input(), "1.5");
        panel.pop_amount_char();
        assert_eq!(panel.amount_input(), "1.");
    }
}
