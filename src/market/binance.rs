//! Binance public ticker client
//!
//! One endpoint: `/api/v3/ticker/price`, returning every traded pair with
//! its last price as a decimal string.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::error::Result;

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

/// Binance market-data client.
#[derive(Clone)]
pub struct BinanceClient {
    http: reqwest::Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Full price table keyed by pair symbol (`BTCUSDT`). Pairs whose price
    /// string does not parse are dropped rather than failing the table.
    pub async fn price_table(&self) -> Result<HashMap<String, Decimal>> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let tickers: Vec<TickerPrice> = self.http.get(&url).send().await?.json().await?;

        let table: HashMap<String, Decimal> = tickers
            .into_iter()
            .filter_map(|t| t.price.parse::<Decimal>().ok().map(|p| (t.symbol, p)))
            .collect();

        debug!("fetched {} binance tickers", table.len());
        Ok(table)
    }
}
