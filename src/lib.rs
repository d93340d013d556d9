//! Coinfolio — personal crypto portfolio tracker
//!
//! Records buy/sell transactions, fetches a USD/KRW exchange rate and live
//! Binance prices, and reports unrealized profit/loss per held symbol.
//!
//! ## Architecture
//!
//! ```text
//! Storage (coin table) ──┐
//!                        ├─→ Portfolio Aggregator ─→ API / CLI
//! Market (Binance, rate) ┘        (pure)
//! ```

pub mod config;
pub mod error;
pub mod market;
pub mod portfolio;
pub mod server;
pub mod storage;
pub mod types;

#[cfg(test)]
mod types_tests;
