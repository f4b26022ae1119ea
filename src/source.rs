use crate::coin::{CoinRecord, SortKey};
use crate::config;
use crate::error::FetchError;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Anything that can produce a full coin list snapshot.
pub trait CoinSource: Send + Sync + 'static {
    fn fetch_coins(
        &self,
        sort: Option<SortKey>,
    ) -> impl Future<Output = Result<Vec<CoinRecord>, FetchError>> + Send;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// `GET {base_url}/api/coins[?sort=...]` over reqwest.
#[derive(Clone, Debug)]
pub struct HttpCoinSource {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpCoinSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn coins_url(&self) -> String {
        format!("{}{}", self.base_url, config::COINS_PATH)
    }
}

impl CoinSource for HttpCoinSource {
    async fn fetch_coins(&self, sort: Option<SortKey>) -> Result<Vec<CoinRecord>, FetchError> {
        let url = self.coins_url();
        let mut request = self.client.get(&url).timeout(self.timeout);
        if let Some(sort) = sort {
            request = request.query(&[("sort", sort.as_str())]);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("error").to_string());
            warn!("Coin list request {} returned {}: {}", url, status, message);
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let coins = resp
            .json::<Vec<CoinRecord>>()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, e))?;
        debug!("Fetched {} coins from {} (sort={:?})", coins.len(), url, sort);
        Ok(coins)
    }
}
