use crate::coin::{self, CoinRecord, SortKey};
use crate::config;
use anyhow::Result;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Clone, Debug, Serialize)]
struct ApiError {
    error: String,
}

#[derive(Debug, Deserialize)]
struct CoinsQuery {
    sort: Option<String>,
}

pub fn router() -> Router {
    Router::new()
        .route(config::COINS_PATH, get(coins))
        .route("/api/health", get(health))
        .fallback(not_found)
}

pub async fn run_mock_api_server(port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    info!("Mock coin API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router()).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// Unknown sort keys (the dashboard's `watchlist` tab among them) fall back
/// to natural order.
async fn coins(Query(query): Query<CoinsQuery>) -> Json<Vec<CoinRecord>> {
    let sort = match query.sort.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match raw.parse::<SortKey>() {
            Ok(key) => Some(key),
            Err(e) => {
                warn!("{}; serving natural order", e);
                None
            }
        },
    };

    Json(coin::apply_sort(coin::mock_coins(), sort))
}

async fn not_found() -> (StatusCode, Json<ApiError>) {
    api_err(StatusCode::NOT_FOUND, "not found")
}

fn api_err(status: StatusCode, message: &str) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: message.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    fn query(sort: Option<&str>) -> Query<CoinsQuery> {
        Query(CoinsQuery {
            sort: sort.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_coins_default_order() {
        let Json(list) = coins(query(None)).await;
        let ids: Vec<&str> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["bitcoin", "ethereum", "cardano"]);
    }

    #[tokio::test]
    async fn test_coins_sorted_by_volume() {
        let Json(list) = coins(query(Some("volume"))).await;
        assert!(list.windows(2).all(|w| w[0].volume >= w[1].volume));
    }

    #[tokio::test]
    async fn test_unknown_sort_keeps_natural_order() {
        let Json(list) = coins(query(Some("watchlist"))).await;
        let ids: Vec<&str> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["bitcoin", "ethereum", "cardano"]);
    }

    #[tokio::test]
    async fn test_new_keeps_first_two() {
        let Json(list) = coins(query(Some("new"))).await;
        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_json() {
        let response = not_found().await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
