//! Market-data collaborators: Binance prices and the USD/KRW rate
//!
//! The aggregator itself never fetches; these clients produce the
//! [`PriceSnapshot`](crate::portfolio::PriceSnapshot) it consumes, with the
//! fallback policies (default rate, empty price table) applied here.

pub mod binance;
pub mod rate;

pub use binance::BinanceClient;
pub use rate::{DatedRateSource, RateClient, RateQuote, DEFAULT_USD_KRW};

use tracing::warn;

use crate::config::MarketConfig;
use crate::error::Result;
use crate::portfolio::PriceSnapshot;

/// Bundles both upstream clients behind one handle.
#[derive(Clone)]
pub struct MarketData {
    pub binance: BinanceClient,
    pub rate: RateClient,
}

impl MarketData {
    pub fn new(config: &MarketConfig) -> Result<Self> {
        Ok(Self {
            binance: BinanceClient::new(&config.binance_url, config.timeout_secs)?,
            rate: RateClient::new(&config.rate_url, config.timeout_secs)?,
        })
    }

    /// Build the snapshot the aggregator consumes.
    ///
    /// A failed price fetch degrades to an empty table (every symbol then
    /// values at zero); the rate always resolves via the fallback policy.
    /// Returns the snapshot plus the rate quote for surfacing the fallback
    /// flag.
    pub async fn snapshot(&self) -> (PriceSnapshot, RateQuote) {
        let quote = self.rate.current().await;
        let table = match self.binance.price_table().await {
            Ok(table) => table,
            Err(e) => {
                warn!("binance price fetch failed, valuing against empty table: {e}");
                Default::default()
            }
        };
        (PriceSnapshot::with_prices(quote.rate, table), quote)
    }
}
