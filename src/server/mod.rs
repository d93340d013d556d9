//! HTTP API
//!
//! Thin route handlers over the store, the market-data clients, and the
//! aggregation engine — the same surface the original tracker exposed.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::{AppError, Result};
use crate::market::{MarketData, RateQuote};
use crate::portfolio::{aggregate, CoinAggregate};
use crate::storage::Database;
use crate::types::{NewTransaction, TransactionFilter, TransactionPage, TransactionPatch};

/// Shared handler state.
pub struct AppState {
    pub db: Database,
    pub market: MarketData,
}

/// `GET /api/portfolio` response body.
#[derive(Debug, Serialize)]
pub struct PortfolioResponse {
    /// `ALL` total first, then per-symbol aggregates.
    pub coins: Vec<CoinAggregate>,
    pub usd_krw: Decimal,
    /// True when the default exchange rate was substituted.
    pub rate_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RateQuery {
    date: Option<NaiveDate>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/portfolio", get(get_portfolio))
        .route(
            "/api/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route(
            "/api/transactions/{id}",
            axum::routing::patch(update_transaction).delete(delete_transaction),
        )
        .route("/api/rate", get(get_rate))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: Arc<AppState>, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| AppError::InvalidInput(format!("cannot bind {bind}: {e}")))?;
    info!("listening on {bind}");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| AppError::Api(format!("server error: {e}")))?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn get_portfolio(State(state): State<Arc<AppState>>) -> Result<Json<PortfolioResponse>> {
    let transactions = state.db.all().await?;
    let (snapshot, quote) = state.market.snapshot().await;
    let coins = aggregate(&transactions, &snapshot);
    Ok(Json(PortfolioResponse {
        coins,
        usd_krw: quote.rate,
        rate_fallback: quote.fallback,
        warning: quote.warning,
    }))
}

async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<TransactionPage>> {
    Ok(Json(state.db.page(&filter).await?))
}

async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Json(tx): Json<NewTransaction>,
) -> Result<Json<serde_json::Value>> {
    if tx.symbol.is_empty() {
        return Err(AppError::InvalidInput("symbol must not be empty".to_string()));
    }
    let id = state.db.insert(&tx).await?;
    Ok(Json(json!({ "ok": true, "id": id })))
}

async fn update_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(patch): Json<TransactionPatch>,
) -> Result<Json<serde_json::Value>> {
    state.db.update(id, &patch).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    state.db.delete(id).await?;
    Ok(Json(json!({ "ok": true })))
}

/// Dated rate with the business-day fallback; defaults to today.
async fn get_rate(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RateQuery>,
) -> Json<RateQuote> {
    let quote = match query.date {
        Some(date) => state.market.rate.for_date(date).await,
        None => state.market.rate.current().await,
    };
    Json(quote)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Http(_) | AppError::Api(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarketConfig;
    use crate::portfolio::PriceSnapshot;
    use crate::types::TradeType;
    use axum::body::to_bytes;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    async fn test_state() -> (TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::connect(path.to_str().unwrap()).await.unwrap();
        let market = MarketData::new(&MarketConfig::default()).unwrap();
        (dir, Arc::new(AppState { db, market }))
    }

    fn new_tx(symbol: &str) -> NewTransaction {
        NewTransaction {
            symbol: symbol.to_string(),
            kr_name: String::new(),
            trade_date: "2024-03-01".parse().unwrap(),
            trade_type: TradeType::Buy,
            quantity: dec!(1),
            invested_krw: dec!(1400000),
            invested_usd: dec!(1000),
            trade_rate: dec!(1400),
        }
    }

    async fn error_response(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_maps_to_404_json_error() {
        let (status, body) = error_response(AppError::NotFound(7)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains('7'));
    }

    #[tokio::test]
    async fn test_invalid_input_maps_to_400() {
        let (status, body) = error_response(AppError::InvalidInput("bad".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("bad"));
    }

    #[tokio::test]
    async fn test_upstream_error_maps_to_502() {
        let (status, _) = error_response(AppError::Api("down".into())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_symbol() {
        let (_dir, state) = test_state().await;
        let err = create_transaction(State(state), Json(new_tx("")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_create_list_delete_roundtrip() {
        let (_dir, state) = test_state().await;

        let Json(created) = create_transaction(State(state.clone()), Json(new_tx("BTC")))
            .await
            .unwrap();
        assert_eq!(created["ok"], true);
        let id = created["id"].as_i64().unwrap();

        let Json(page) =
            list_transactions(State(state.clone()), Query(TransactionFilter::default()))
                .await
                .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.rows[0].symbol, "BTC");

        delete_transaction(State(state.clone()), Path(id)).await.unwrap();
        let err = delete_transaction(State(state), Path(id)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let (_dir, state) = test_state().await;
        let err = update_transaction(State(state), Path(99), Json(TransactionPatch::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(99)));
    }

    #[test]
    fn test_portfolio_envelope_shape() {
        let coins = aggregate(&[], &PriceSnapshot::new(dec!(1450)));
        let resp = PortfolioResponse {
            coins,
            usd_krw: dec!(1450),
            rate_fallback: true,
            warning: None,
        };

        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["coins"][0]["symbol"], "ALL");
        assert_eq!(value["coins"][0]["kr_name"], "전체");
        assert_eq!(value["rate_fallback"], true);
        assert!(value.get("usd_krw").is_some());
        // Absent warnings are omitted, not null
        assert!(value.get("warning").is_none());
    }
}
