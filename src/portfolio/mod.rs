//! # Portfolio Aggregation Engine
//!
//! Folds the flat list of buy/sell transactions into one summary per held
//! symbol plus a synthetic `ALL` total, valued against a live price snapshot.
//!
//! ```rust,ignore
//! use coinfolio::portfolio::{aggregate, PriceSnapshot};
//!
//! let snapshot = PriceSnapshot::with_prices(usd_krw, price_table);
//! let coins = aggregate(&transactions, &snapshot);
//! ```
//!
//! The engine is pure and synchronous: no I/O, no shared state, and it never
//! fails — missing prices value at zero and zero cost bases yield a zero
//! profit rate instead of dividing.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Transaction;

/// Symbols pinned to exactly 1.0 USD regardless of the price table.
pub const STABLECOINS: &[&str] = &["USDT", "USDC", "BUSD", "DAI", "TUSD", "USDP"];

/// Symbol label of the synthetic total row.
pub const TOTAL_SYMBOL: &str = "ALL";

/// Display name of the synthetic total row.
pub const TOTAL_KR_NAME: &str = "전체";

/// Point-in-time market data consumed by [`aggregate`].
///
/// The price table is keyed by Binance pair symbol (`BTCUSDT`). Callers are
/// responsible for substituting the fallback exchange rate before building
/// the snapshot; the aggregator applies no rate policy of its own.
#[derive(Debug, Clone)]
pub struct PriceSnapshot {
    usd_krw: Decimal,
    prices: HashMap<String, Decimal>,
}

impl PriceSnapshot {
    pub fn new(usd_krw: Decimal) -> Self {
        Self {
            usd_krw,
            prices: HashMap::new(),
        }
    }

    pub fn with_prices(usd_krw: Decimal, prices: HashMap<String, Decimal>) -> Self {
        Self { usd_krw, prices }
    }

    pub fn insert(&mut self, pair: impl Into<String>, price: Decimal) {
        self.prices.insert(pair.into(), price);
    }

    pub fn usd_krw(&self) -> Decimal {
        self.usd_krw
    }

    /// Current USD unit price for a ticker.
    ///
    /// Stablecoins are pinned to 1.0 before any lookup; everything else
    /// resolves `SYMBOL + "USDT"` in the table. Unknown tickers price at
    /// zero so an unresolvable position shows as a full unrealized loss
    /// rather than an error.
    pub fn price_usd(&self, symbol: &str) -> Decimal {
        let upper = symbol.to_uppercase();
        if STABLECOINS.contains(&upper.as_str()) {
            return Decimal::ONE;
        }
        self.prices
            .get(&format!("{upper}USDT"))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

/// Aggregated position for one symbol, or the `ALL` total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinAggregate {
    pub symbol: String,
    pub kr_name: String,
    pub quantity: Decimal,
    pub invested_usd: Decimal,
    pub invested_krw: Decimal,
    /// Settlement day of the most recent transaction; `None` on the total.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_date: Option<NaiveDate>,
    /// USD/KRW rate recorded on the most recent transaction.
    pub latest_rate: Decimal,
    pub valuation_usd: Decimal,
    pub valuation_krw: Decimal,
    pub profit_usd: Decimal,
    pub profit_krw: Decimal,
    /// Percent profit on the USD cost basis; 0 when nothing was invested.
    pub profit_rate: Decimal,
    pub profit_rate_krw: Decimal,
}

/// Running per-symbol sums before valuation.
struct Group {
    symbol: String,
    kr_name: String,
    quantity: Decimal,
    invested_usd: Decimal,
    invested_krw: Decimal,
    latest_date: Option<NaiveDate>,
    latest_rate: Decimal,
}

/// Aggregate transactions into per-symbol summaries plus the `ALL` total.
///
/// Output is ordered: the total first, then symbols descending by
/// `invested_krw` with ties keeping first-seen order. Rows with an empty
/// symbol are skipped silently. Quantity sums across buys and sells without
/// netting, preserving the observed behavior of the original tracker.
pub fn aggregate(transactions: &[Transaction], snapshot: &PriceSnapshot) -> Vec<CoinAggregate> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for tx in transactions {
        if tx.symbol.is_empty() {
            continue;
        }
        let idx = *index.entry(tx.symbol.clone()).or_insert_with(|| {
            groups.push(Group {
                symbol: tx.symbol.clone(),
                kr_name: tx.kr_name.clone(),
                quantity: Decimal::ZERO,
                invested_usd: Decimal::ZERO,
                invested_krw: Decimal::ZERO,
                latest_date: None,
                latest_rate: Decimal::ZERO,
            });
            groups.len() - 1
        });

        let group = &mut groups[idx];
        group.quantity += tx.quantity;
        group.invested_usd += tx.invested_usd;
        group.invested_krw += tx.invested_krw;
        // Strictly-greater comparison: among same-date rows the earliest
        // iterated keeps the "latest" slot.
        if group.latest_date.is_none_or(|d| tx.trade_date > d) {
            group.latest_date = Some(tx.trade_date);
            group.latest_rate = tx.trade_rate;
        }
    }

    let mut coins: Vec<CoinAggregate> = groups
        .into_iter()
        .map(|g| {
            let price = snapshot.price_usd(&g.symbol);
            let valuation_usd = price * g.quantity;
            let valuation_krw = valuation_usd * snapshot.usd_krw();
            let profit_usd = valuation_usd - g.invested_usd;
            let profit_krw = valuation_krw - g.invested_krw;
            CoinAggregate {
                symbol: g.symbol,
                kr_name: g.kr_name,
                quantity: g.quantity,
                invested_usd: g.invested_usd,
                invested_krw: g.invested_krw,
                latest_date: g.latest_date,
                latest_rate: g.latest_rate,
                valuation_usd,
                valuation_krw,
                profit_usd,
                profit_krw,
                profit_rate: profit_rate(profit_usd, g.invested_usd),
                profit_rate_krw: profit_rate(profit_krw, g.invested_krw),
            }
        })
        .collect();

    // Stable sort keeps encounter order for equal cost bases.
    coins.sort_by(|a, b| b.invested_krw.cmp(&a.invested_krw));

    let mut result = Vec::with_capacity(coins.len() + 1);
    result.push(total_of(&coins));
    result.extend(coins);
    result
}

/// Percent profit on a cost basis; zero denominators yield zero.
fn profit_rate(profit: Decimal, invested: Decimal) -> Decimal {
    if invested > Decimal::ZERO {
        profit / invested * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    }
}

/// Element-wise fold over the per-symbol aggregates. The two profit rates
/// are recomputed from the summed figures, not averaged across symbols —
/// averaging would bias toward small positions.
fn total_of(coins: &[CoinAggregate]) -> CoinAggregate {
    let mut total = CoinAggregate {
        symbol: TOTAL_SYMBOL.to_string(),
        kr_name: TOTAL_KR_NAME.to_string(),
        quantity: Decimal::ZERO,
        invested_usd: Decimal::ZERO,
        invested_krw: Decimal::ZERO,
        latest_date: None,
        latest_rate: Decimal::ZERO,
        valuation_usd: Decimal::ZERO,
        valuation_krw: Decimal::ZERO,
        profit_usd: Decimal::ZERO,
        profit_krw: Decimal::ZERO,
        profit_rate: Decimal::ZERO,
        profit_rate_krw: Decimal::ZERO,
    };

    for coin in coins {
        total.quantity += coin.quantity;
        total.invested_usd += coin.invested_usd;
        total.invested_krw += coin.invested_krw;
        total.valuation_usd += coin.valuation_usd;
        total.valuation_krw += coin.valuation_krw;
        total.profit_usd += coin.profit_usd;
        total.profit_krw += coin.profit_krw;
    }

    total.profit_rate = profit_rate(total.profit_usd, total.invested_usd);
    total.profit_rate_krw = profit_rate(total.profit_krw, total.invested_krw);
    total
}
