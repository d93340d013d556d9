//! Core data types shared across the tracker

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trade direction, stored with the original Korean short codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TradeType {
    #[default]
    #[serde(rename = "매수")]
    Buy,
    #[serde(rename = "매도")]
    Sell,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "매수",
            TradeType::Sell => "매도",
        }
    }

    /// Parse the stored code. Unknown codes default to Buy, matching the
    /// original table where the column defaulted to 매수.
    pub fn from_code(code: &str) -> Self {
        match code {
            "매도" => TradeType::Sell,
            _ => TradeType::Buy,
        }
    }
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted buy/sell record from the `coin` table.
///
/// Immutable input to the aggregator; numeric fields are already parsed at
/// the storage boundary (unparseable values coerce to zero there).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    /// Uppercase ticker, e.g. BTC. May be empty for malformed rows, which
    /// the aggregator skips.
    pub symbol: String,
    /// Korean display name, may be empty.
    #[serde(default)]
    pub kr_name: String,
    /// Settlement day (ISO date).
    pub trade_date: NaiveDate,
    #[serde(default)]
    pub trade_type: TradeType,
    pub quantity: Decimal,
    pub invested_krw: Decimal,
    pub invested_usd: Decimal,
    /// USD/KRW rate at transaction time, informational.
    pub trade_rate: Decimal,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert payload for a new transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub symbol: String,
    #[serde(default)]
    pub kr_name: String,
    pub trade_date: NaiveDate,
    #[serde(default)]
    pub trade_type: TradeType,
    pub quantity: Decimal,
    pub invested_krw: Decimal,
    pub invested_usd: Decimal,
    pub trade_rate: Decimal,
}

/// Partial update for an existing transaction; `None` fields keep the
/// stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionPatch {
    pub symbol: Option<String>,
    pub kr_name: Option<String>,
    pub trade_date: Option<NaiveDate>,
    pub trade_type: Option<TradeType>,
    pub quantity: Option<Decimal>,
    pub invested_krw: Option<Decimal>,
    pub invested_usd: Option<Decimal>,
    pub trade_rate: Option<Decimal>,
}

/// Filter for the detail listing, mirroring the original query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    pub symbol: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub trade_type: Option<TradeType>,
    /// 1-based page number.
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl TransactionFilter {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(10).max(1)
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1) * self.limit()
    }
}

/// One page of transactions plus the unpaginated total.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    pub rows: Vec<Transaction>,
    pub total: i64,
}
