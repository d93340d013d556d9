//! USD/KRW exchange-rate client (manana.kr) and business-day fallback
//!
//! The upstream publishes one rate per business day; weekends and holidays
//! have no data. [`resolve_rate`] walks backward from a weekend date to the
//! prior business day, and substitutes the fixed fallback when no usable
//! rate can be found — the aggregator is then invoked with that value as if
//! it came from upstream.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AppError, Result};

/// Fixed rate substituted when upstream data is unavailable or implausible.
pub const DEFAULT_USD_KRW: Decimal = dec!(1450);

/// Plausible band for a USD/KRW quote; anything outside is treated as bad
/// upstream data.
pub const RATE_MIN: Decimal = dec!(1000);
pub const RATE_MAX: Decimal = dec!(2000);

/// Step budget for the backward walk in [`resolve_rate`].
const MAX_LOOKBACK_STEPS: u32 = 1000;

/// A resolved exchange rate plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateQuote {
    pub rate: Decimal,
    /// Date the rate was actually found on (may be earlier than requested
    /// after weekend adjustment).
    pub date: NaiveDate,
    /// True when [`DEFAULT_USD_KRW`] was substituted.
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl RateQuote {
    fn fallback_for(date: NaiveDate) -> Self {
        Self {
            rate: DEFAULT_USD_KRW,
            date,
            fallback: true,
            warning: Some("환율 데이터 없음. 기본값 사용".to_string()),
        }
    }
}

/// Dated rate lookup, kept behind a trait so the business-day walk is
/// testable without the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatedRateSource: Send + Sync {
    /// Rate published on the given calendar day; `Ok(None)` when the day has
    /// no data (weekend/holiday).
    async fn rate_on(&self, date: NaiveDate) -> Result<Option<Decimal>>;
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn plausible(rate: Decimal) -> bool {
    rate > RATE_MIN && rate < RATE_MAX
}

/// Resolve a usable rate for the requested date.
///
/// Tries the exact date first. When a date has no data (404 or a failed
/// fetch) and falls on a weekend, steps backward one calendar day at a time
/// (bounded) until a weekday is reached, retrying the lookup at each step.
/// A successful fetch carrying an implausible value falls back immediately
/// without walking. A weekday miss or an exhausted budget also yields the
/// fixed fallback, flagged so callers can surface a warning.
pub async fn resolve_rate(source: &dyn DatedRateSource, requested: NaiveDate) -> RateQuote {
    let mut date = requested;
    for _ in 0..MAX_LOOKBACK_STEPS {
        match source.rate_on(date).await {
            Ok(Some(rate)) if plausible(rate) => {
                return RateQuote {
                    rate,
                    date,
                    fallback: false,
                    warning: None,
                };
            }
            Ok(Some(rate)) => {
                warn!(%date, %rate, "implausible USD/KRW rate from upstream");
                break;
            }
            Ok(None) => {}
            Err(e) => {
                debug!(%date, "dated rate lookup failed: {e}");
            }
        }

        if is_weekend(date) {
            match date.pred_opt() {
                Some(prev) => {
                    date = prev;
                    continue;
                }
                None => break,
            }
        }
        // Weekday with no data: give up and fall back.
        break;
    }
    RateQuote::fallback_for(requested)
}

#[derive(Debug, Deserialize)]
struct MananaRate {
    rate: Option<f64>,
}

/// HTTP client for the manana.kr exchange-rate API.
#[derive(Clone)]
pub struct RateClient {
    http: reqwest::Client,
    base_url: String,
}

impl RateClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Current USD/KRW rate with the fallback policy already applied: an
    /// unreachable upstream or an implausible value yields the fixed
    /// default, flagged on the quote. Never fails.
    pub async fn current(&self) -> RateQuote {
        let today = chrono::Utc::now().date_naive();
        let url = format!("{}/exchange/rate/KRW/USD.json", self.base_url);

        let fetched: Result<Option<Decimal>> = async {
            let rows: Vec<MananaRate> = self.http.get(&url).send().await?.json().await?;
            Ok(rows
                .first()
                .and_then(|r| r.rate)
                .and_then(|r| Decimal::try_from(r).ok()))
        }
        .await;

        match fetched {
            Ok(Some(rate)) if plausible(rate) => RateQuote {
                rate,
                date: today,
                fallback: false,
                warning: None,
            },
            Ok(other) => {
                warn!(?other, "current rate missing or implausible, using default");
                RateQuote::fallback_for(today)
            }
            Err(e) => {
                warn!("current rate fetch failed, using default: {e}");
                RateQuote::fallback_for(today)
            }
        }
    }

    /// Dated rate with the business-day fallback applied.
    pub async fn for_date(&self, date: NaiveDate) -> RateQuote {
        resolve_rate(self, date).await
    }
}

#[async_trait]
impl DatedRateSource for RateClient {
    async fn rate_on(&self, date: NaiveDate) -> Result<Option<Decimal>> {
        let url = format!(
            "{}/exchange/rate/KRW/USD/{}.json",
            self.base_url,
            date.format("%Y-%m-%d")
        );
        let resp = self.http.get(&url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(AppError::Api(format!(
                "rate endpoint returned {}",
                resp.status()
            )));
        }
        let rows: Vec<MananaRate> = resp.json().await?;
        Ok(rows
            .first()
            .and_then(|r| r.rate)
            .and_then(|r| Decimal::try_from(r).ok()))
    }
}
