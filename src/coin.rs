use chrono::{Duration, Utc};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One point of a coin's price history. `time` is unix seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time: i64,
    pub price: f64,
}

/// One market entry as served by `/api/coins`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinRecord {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub price: f64,
    pub market_cap: f64,
    pub volume: f64,
    pub change24h: f64,
    #[serde(default)]
    pub price_history: Vec<PricePoint>,
}

impl CoinRecord {
    pub fn has_history(&self) -> bool {
        !self.price_history.is_empty()
    }

    /// History as `(time, price)` pairs in ascending time order.
    pub fn series(&self) -> Vec<(f64, f64)> {
        let mut points: Vec<(f64, f64)> = self
            .price_history
            .iter()
            .map(|p| (p.time as f64, p.price))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        points
    }

    pub fn matches_search(&self, needle_lower: &str) -> bool {
        self.name.to_lowercase().contains(needle_lower)
            || self.symbol.to_lowercase().contains(needle_lower)
    }
}

/// Server-side ordering selector for the coin list endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortKey {
    #[serde(rename = "marketCap")]
    MarketCap,
    #[serde(rename = "volume")]
    Volume,
    #[serde(rename = "gainers")]
    Gainers,
    #[serde(rename = "new")]
    New,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MarketCap => "marketCap",
            Self::Volume => "volume",
            Self::Gainers => "gainers",
            Self::New => "new",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "marketCap" => Ok(Self::MarketCap),
            "volume" => Ok(Self::Volume),
            "gainers" => Ok(Self::Gainers),
            "new" => Ok(Self::New),
            other => Err(format!("unknown sort key: {}", other)),
        }
    }
}

/// Synthetic record shown by the tab view when a poll fails.
pub fn fallback_coin() -> CoinRecord {
    let now = Utc::now().timestamp();
    CoinRecord {
        id: "fallback".to_string(),
        name: "Fallback Coin".to_string(),
        symbol: "FBC".to_string(),
        price: 100.0,
        market_cap: 1_000_000.0,
        volume: 50_000.0,
        change24h: 0.0,
        price_history: vec![
            PricePoint { time: now - 86_400, price: 100.0 },
            PricePoint { time: now, price: 105.0 },
        ],
    }
}

struct MockSpec {
    id: &'static str,
    name: &'static str,
    symbol: &'static str,
    base_price: f64,
    price_jitter: f64,
    market_cap: f64,
    volume: f64,
    base_change: f64,
    change_jitter: f64,
}

const MOCK_COINS: &[MockSpec] = &[
    MockSpec {
        id: "bitcoin",
        name: "Bitcoin",
        symbol: "BTC",
        base_price: 60_000.0,
        price_jitter: 1_000.0,
        market_cap: 1_200_000_000_000.0,
        volume: 40_000_000_000.0,
        base_change: 2.5,
        change_jitter: 2.0,
    },
    MockSpec {
        id: "ethereum",
        name: "Ethereum",
        symbol: "ETH",
        base_price: 2_500.0,
        price_jitter: 100.0,
        market_cap: 300_000_000_000.0,
        volume: 15_000_000_000.0,
        base_change: -1.2,
        change_jitter: 2.0,
    },
    MockSpec {
        id: "cardano",
        name: "Cardano",
        symbol: "ADA",
        base_price: 0.35,
        price_jitter: 0.05,
        market_cap: 12_500_000_000.0,
        volume: 300_000_000.0,
        base_change: 1.5,
        change_jitter: 1.0,
    },
];

pub const MOCK_HISTORY_DAYS: usize = 10;

/// Generates the mock market: natural order bitcoin, ethereum, cardano, with
/// jittered prices and ten daily history points ending one day ago.
pub fn mock_coins() -> Vec<CoinRecord> {
    let mut rng = rand::thread_rng();
    let now = Utc::now();

    MOCK_COINS
        .iter()
        .map(|spec| {
            let price_history = (0..MOCK_HISTORY_DAYS)
                .map(|i| {
                    let days_back = (MOCK_HISTORY_DAYS - i) as i64;
                    PricePoint {
                        time: (now - Duration::days(days_back)).timestamp(),
                        price: spec.base_price + rng.gen_range(0.0..spec.price_jitter)
                            - spec.price_jitter / 2.0,
                    }
                })
                .collect();

            CoinRecord {
                id: spec.id.to_string(),
                name: spec.name.to_string(),
                symbol: spec.symbol.to_string(),
                price: spec.base_price + rng.gen_range(0.0..spec.price_jitter),
                market_cap: spec.market_cap,
                volume: spec.volume,
                change24h: spec.base_change + rng.gen_range(0.0..spec.change_jitter),
                price_history,
            }
        })
        .collect()
}

/// Applies the endpoint's ordering rules. `New` keeps only the first two
/// coins of the natural order.
pub fn apply_sort(mut coins: Vec<CoinRecord>, sort: Option<SortKey>) -> Vec<CoinRecord> {
    match sort {
        Some(SortKey::MarketCap) => coins.sort_by(|a, b| b.market_cap.total_cmp(&a.market_cap)),
        Some(SortKey::Volume) => coins.sort_by(|a, b| b.volume.total_cmp(&a.volume)),
        Some(SortKey::Gainers) => coins.sort_by(|a, b| b.change24h.total_cmp(&a.change24h)),
        Some(SortKey::New) => coins.truncate(2),
        None => {}
    }
    coins
}

#[cfg(test)]
pub(crate) fn test_coin(id: &str, name: &str, symbol: &str, price: f64) -> CoinRecord {
    CoinRecord {
        id: id.to_string(),
        name: name.to_string(),
        symbol: symbol.to_string(),
        price,
        market_cap: price * 1_000.0,
        volume: price * 10.0,
        change24h: 0.0,
        price_history: vec![
            PricePoint { time: 1_700_000_000, price },
            PricePoint { time: 1_700_086_400, price: price * 1.01 },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_record_uses_camel_case_wire_names() {
        let json = r#"{
            "id": "bitcoin", "name": "Bitcoin", "symbol": "BTC",
            "price": 60000.5, "marketCap": 1.2e12, "volume": 4e10,
            "change24h": -1.25,
            "priceHistory": [{"time": 2, "price": 2.0}, {"time": 1, "price": 1.0}]
        }"#;
        let coin: CoinRecord = serde_json::from_str(json).unwrap();
        assert_eq!(coin.market_cap, 1.2e12);
        assert_eq!(coin.change24h, -1.25);
        assert_eq!(coin.series(), vec![(1.0, 1.0), (2.0, 2.0)]);

        let value = serde_json::to_value(&coin).unwrap();
        assert!(value.get("marketCap").is_some());
        assert!(value.get("priceHistory").is_some());
    }

    #[test]
    fn test_missing_history_defaults_to_empty() {
        let json = r#"{"id":"x","name":"X","symbol":"X","price":1,"marketCap":1,"volume":1,"change24h":0}"#;
        let coin: CoinRecord = serde_json::from_str(json).unwrap();
        assert!(!coin.has_history());
    }

    #[test]
    fn test_mock_market_shape() {
        let coins = mock_coins();
        let ids: Vec<&str> = coins.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["bitcoin", "ethereum", "cardano"]);

        let btc = &coins[0];
        assert!(btc.price >= 60_000.0 && btc.price < 61_000.0);
        assert_eq!(btc.price_history.len(), MOCK_HISTORY_DAYS);
        assert!(btc.price_history.windows(2).all(|w| w[0].time < w[1].time));
        assert!(btc.price_history.last().unwrap().time < Utc::now().timestamp());
    }

    #[test]
    fn test_sort_rules() {
        let mut coins = mock_coins();
        coins[2].change24h = 50.0;

        let by_cap = apply_sort(coins.clone(), Some(SortKey::MarketCap));
        assert_eq!(by_cap[0].id, "bitcoin");
        assert_eq!(by_cap[2].id, "cardano");

        let gainers = apply_sort(coins.clone(), Some(SortKey::Gainers));
        assert_eq!(gainers[0].id, "cardano");

        let newest = apply_sort(coins.clone(), Some(SortKey::New));
        assert_eq!(newest.len(), 2);

        let natural = apply_sort(coins, None);
        assert_eq!(natural.len(), 3);
    }

    #[test]
    fn test_sort_key_wire_names() {
        for key in [SortKey::MarketCap, SortKey::Volume, SortKey::Gainers, SortKey::New] {
            assert_eq!(key.as_str().parse::<SortKey>(), Ok(key));
        }
        assert!("watchlist".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_fallback_coin() {
        let coin = fallback_coin();
        assert_eq!(coin.id, "fallback");
        assert_eq!(coin.price_history.len(), 2);
        assert_eq!(coin.price_history[1].time - coin.price_history[0].time, 86_400);
    }
}
