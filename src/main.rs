//! Coinfolio CLI
//!
//! Serve the HTTP API or work with the portfolio directly from the terminal.

use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use coinfolio::{
    config::Config,
    market::MarketData,
    portfolio::aggregate,
    server::{self, AppState},
    storage::Database,
    types::{NewTransaction, TradeType},
};
use rust_decimal::Decimal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "coinfolio")]
#[command(about = "Personal crypto portfolio tracker (KRW/USD)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve,
    /// Print the aggregated portfolio
    Portfolio,
    /// Record a buy; the USD amount is derived from the dated exchange rate
    Add {
        /// Ticker, e.g. BTC
        symbol: String,
        /// Korean display name
        #[arg(long, default_value = "")]
        kr_name: String,
        /// Settlement date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Units bought
        #[arg(long)]
        quantity: Decimal,
        /// Amount paid in KRW
        #[arg(long)]
        invested_krw: Decimal,
    },
    /// Show the USD/KRW rate for a date (business-day fallback applied)
    Rate {
        /// YYYY-MM-DD, defaults to today
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Serve => run_server(config).await,
        Commands::Portfolio => show_portfolio(config).await,
        Commands::Add {
            symbol,
            kr_name,
            date,
            quantity,
            invested_krw,
        } => add_transaction(config, symbol, kr_name, date, quantity, invested_krw).await,
        Commands::Rate { date } => show_rate(config, date).await,
    }
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let db = Database::connect(&config.database.path).await?;
    let market = MarketData::new(&config.market)?;
    let state = Arc::new(AppState { db, market });
    server::serve(state, &config.server.bind).await?;
    Ok(())
}

async fn show_portfolio(config: Config) -> anyhow::Result<()> {
    let db = Database::connect(&config.database.path).await?;
    let market = MarketData::new(&config.market)?;

    let transactions = db.all().await?;
    let (snapshot, quote) = market.snapshot().await;
    let coins = aggregate(&transactions, &snapshot);

    println!("\nUSD/KRW: {}{}", quote.rate, if quote.fallback { " (기본값)" } else { "" });
    println!(
        "{:<8} {:>14} {:>16} {:>16} {:>14} {:>9}",
        "Symbol", "Quantity", "Invested(KRW)", "Value(KRW)", "Profit(USD)", "Rate%"
    );
    println!("{}", "-".repeat(82));
    for coin in &coins {
        println!(
            "{:<8} {:>14} {:>16.0} {:>16.0} {:>14.2} {:>8.2}%",
            coin.symbol,
            coin.quantity,
            coin.invested_krw,
            coin.valuation_krw,
            coin.profit_usd,
            coin.profit_rate
        );
    }

    Ok(())
}

async fn add_transaction(
    config: Config,
    symbol: String,
    kr_name: String,
    date: Option<NaiveDate>,
    quantity: Decimal,
    invested_krw: Decimal,
) -> anyhow::Result<()> {
    let db = Database::connect(&config.database.path).await?;
    let market = MarketData::new(&config.market)?;

    let trade_date = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
    let quote = market.rate.for_date(trade_date).await;
    if let Some(warning) = &quote.warning {
        eprintln!("⚠ {warning}");
    }

    let invested_usd = invested_krw / quote.rate;
    let id = db
        .insert(&NewTransaction {
            symbol: symbol.to_uppercase(),
            kr_name,
            trade_date,
            trade_type: TradeType::Buy,
            quantity,
            invested_krw,
            invested_usd,
            trade_rate: quote.rate,
        })
        .await?;

    println!(
        "✅ #{id} {} {} @ {} (₩{} / ${:.4})",
        symbol.to_uppercase(),
        quantity,
        trade_date,
        invested_krw,
        invested_usd
    );
    Ok(())
}

async fn show_rate(config: Config, date: Option<NaiveDate>) -> anyhow::Result<()> {
    let market = MarketData::new(&config.market)?;
    let quote = match date {
        Some(date) => market.rate.for_date(date).await,
        None => market.rate.current().await,
    };

    println!("USD/KRW on {}: {}", quote.date, quote.rate);
    if let Some(warning) = &quote.warning {
        println!("⚠ {warning}");
    }
    Ok(())
}
