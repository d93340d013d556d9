//! SQLite persistence for the `coin` transaction table
//!
//! Monetary columns are stored as text and parsed into `Decimal` on read;
//! values that fail to parse coerce to zero at this boundary so the
//! aggregator only ever sees well-formed numbers.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, SqlitePool};
use tracing::info;

use crate::error::{AppError, Result};
use crate::types::{NewTransaction, TradeType, Transaction, TransactionFilter, TransactionPage, TransactionPatch};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS coin (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    kr_name TEXT NOT NULL DEFAULT '',
    trade_date TEXT NOT NULL,
    trade_type TEXT NOT NULL DEFAULT '매수',
    quantity TEXT NOT NULL DEFAULT '0',
    invested_krw TEXT NOT NULL DEFAULT '0',
    invested_usd TEXT NOT NULL DEFAULT '0',
    trade_rate TEXT NOT NULL DEFAULT '0',
    created_at TEXT NOT NULL,
    updated_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_coin_symbol ON coin(symbol);
CREATE INDEX IF NOT EXISTS idx_coin_trade_date ON coin(trade_date);
"#;

/// Handle to the transaction store.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the SQLite file and ensure the schema.
    pub async fn connect(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AppError::InvalidInput(format!("cannot create {parent:?}: {e}")))?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .map_err(sqlx::Error::from)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        info!("database ready at {path}");
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a new transaction, returning its row id.
    pub async fn insert(&self, tx: &NewTransaction) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO coin \
             (symbol, kr_name, trade_date, trade_type, quantity, invested_krw, invested_usd, trade_rate, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&tx.symbol)
        .bind(&tx.kr_name)
        .bind(tx.trade_date)
        .bind(tx.trade_type.as_str())
        .bind(tx.quantity.to_string())
        .bind(tx.invested_krw.to_string())
        .bind(tx.invested_usd.to_string())
        .bind(tx.trade_rate.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Transaction> {
        let row = sqlx::query("SELECT * FROM coin WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound(id))?;
        Ok(from_row(&row))
    }

    /// Apply a partial update; untouched fields keep their stored values.
    pub async fn update(&self, id: i64, patch: &TransactionPatch) -> Result<()> {
        let current = self.get(id).await?;

        let symbol = patch.symbol.clone().unwrap_or(current.symbol);
        let kr_name = patch.kr_name.clone().unwrap_or(current.kr_name);
        let trade_date = patch.trade_date.unwrap_or(current.trade_date);
        let trade_type = patch.trade_type.unwrap_or(current.trade_type);
        let quantity = patch.quantity.unwrap_or(current.quantity);
        let invested_krw = patch.invested_krw.unwrap_or(current.invested_krw);
        let invested_usd = patch.invested_usd.unwrap_or(current.invested_usd);
        let trade_rate = patch.trade_rate.unwrap_or(current.trade_rate);

        sqlx::query(
            "UPDATE coin SET symbol = ?, kr_name = ?, trade_date = ?, trade_type = ?, \
             quantity = ?, invested_krw = ?, invested_usd = ?, trade_rate = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&symbol)
        .bind(&kr_name)
        .bind(trade_date)
        .bind(trade_type.as_str())
        .bind(quantity.to_string())
        .bind(invested_krw.to_string())
        .bind(invested_usd.to_string())
        .bind(trade_rate.to_string())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM coin WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(id));
        }
        Ok(())
    }

    /// Every stored transaction in insertion order, the aggregator's input.
    pub async fn all(&self) -> Result<Vec<Transaction>> {
        let rows = sqlx::query("SELECT * FROM coin ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(from_row).collect())
    }

    /// Filtered, paginated listing ordered by trade date descending, plus
    /// the unpaginated match count.
    pub async fn page(&self, filter: &TransactionFilter) -> Result<TransactionPage> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) AS n FROM coin");
        push_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build().fetch_one(&self.pool).await?.get("n");

        let mut qb = QueryBuilder::new("SELECT * FROM coin");
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY trade_date DESC, id DESC LIMIT ");
        qb.push_bind(filter.limit() as i64);
        qb.push(" OFFSET ");
        qb.push_bind(filter.offset() as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(TransactionPage {
            rows: rows.iter().map(from_row).collect(),
            total,
        })
    }
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, sqlx::Sqlite>, filter: &'a TransactionFilter) {
    let mut prefix = " WHERE ";
    let mut push = |qb: &mut QueryBuilder<'a, sqlx::Sqlite>| {
        qb.push(prefix);
        prefix = " AND ";
    };
    if let Some(symbol) = &filter.symbol {
        push(qb);
        qb.push("symbol = ").push_bind(symbol.as_str());
    }
    if let Some(start) = filter.start_date {
        push(qb);
        qb.push("trade_date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        push(qb);
        qb.push("trade_date <= ").push_bind(end);
    }
    if let Some(trade_type) = filter.trade_type {
        push(qb);
        qb.push("trade_type = ").push_bind(trade_type.as_str());
    }
}

/// Parse a stored text number, coercing anything unparseable to zero.
fn decimal_column(row: &SqliteRow, column: &str) -> Decimal {
    let raw: String = row.get(column);
    Decimal::from_str(&raw).unwrap_or_default()
}

fn from_row(row: &SqliteRow) -> Transaction {
    let trade_type: String = row.get("trade_type");
    let trade_date: NaiveDate = row.get("trade_date");
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: Option<DateTime<Utc>> = row.get("updated_at");
    Transaction {
        id: row.get("id"),
        symbol: row.get("symbol"),
        kr_name: row.get("kr_name"),
        trade_date,
        trade_type: TradeType::from_code(&trade_type),
        quantity: decimal_column(row, "quantity"),
        invested_krw: decimal_column(row, "invested_krw"),
        invested_usd: decimal_column(row, "invested_usd"),
        trade_rate: decimal_column(row, "trade_rate"),
        created_at,
        updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    async fn test_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::connect(path.to_str().unwrap()).await.unwrap();
        (dir, db)
    }

    fn new_tx(symbol: &str, trade_date: &str, krw: Decimal) -> NewTransaction {
        NewTransaction {
            symbol: symbol.to_string(),
            kr_name: String::new(),
            trade_date: trade_date.parse().unwrap(),
            trade_type: TradeType::Buy,
            quantity: dec!(1),
            invested_krw: krw,
            invested_usd: krw / dec!(1400),
            trade_rate: dec!(1400),
        }
    }

    #[tokio::test]
    async fn test_insert_and_all_roundtrip() {
        let (_dir, db) = test_db().await;
        let id = db.insert(&new_tx("BTC", "2024-03-01", dec!(1400000))).await.unwrap();
        assert!(id > 0);

        let rows = db.all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "BTC");
        assert_eq!(rows[0].quantity, dec!(1));
        assert_eq!(rows[0].invested_krw, dec!(1400000));
        assert_eq!(rows[0].trade_type, TradeType::Buy);
        assert!(rows[0].updated_at.is_none());
    }

    #[tokio::test]
    async fn test_page_filters_by_symbol_and_date() {
        let (_dir, db) = test_db().await;
        db.insert(&new_tx("BTC", "2024-01-10", dec!(100))).await.unwrap();
        db.insert(&new_tx("BTC", "2024-02-10", dec!(200))).await.unwrap();
        db.insert(&new_tx("ETH", "2024-02-10", dec!(300))).await.unwrap();

        let filter = TransactionFilter {
            symbol: Some("BTC".to_string()),
            start_date: Some("2024-02-01".parse().unwrap()),
            ..Default::default()
        };
        let page = db.page(&filter).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.rows[0].invested_krw, dec!(200));
    }

    #[tokio::test]
    async fn test_page_orders_by_trade_date_descending() {
        let (_dir, db) = test_db().await;
        db.insert(&new_tx("BTC", "2024-01-10", dec!(100))).await.unwrap();
        db.insert(&new_tx("BTC", "2024-03-10", dec!(300))).await.unwrap();
        db.insert(&new_tx("BTC", "2024-02-10", dec!(200))).await.unwrap();

        let page = db.page(&TransactionFilter::default()).await.unwrap();
        let dates: Vec<String> = page.rows.iter().map(|r| r.trade_date.to_string()).collect();
        assert_eq!(dates, vec!["2024-03-10", "2024-02-10", "2024-01-10"]);
    }

    #[tokio::test]
    async fn test_page_limit_and_total() {
        let (_dir, db) = test_db().await;
        for day in 1..=5 {
            db.insert(&new_tx("BTC", &format!("2024-03-0{day}"), dec!(100)))
                .await
                .unwrap();
        }

        let filter = TransactionFilter {
            page: Some(2),
            limit: Some(2),
            ..Default::default()
        };
        let page = db.page(&filter).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[0].trade_date.to_string(), "2024-03-03");
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let (_dir, db) = test_db().await;
        let id = db.insert(&new_tx("BTC", "2024-03-01", dec!(1400000))).await.unwrap();

        let patch = TransactionPatch {
            quantity: Some(dec!(2.5)),
            ..Default::default()
        };
        db.update(id, &patch).await.unwrap();

        let row = db.get(id).await.unwrap();
        assert_eq!(row.quantity, dec!(2.5));
        assert_eq!(row.symbol, "BTC");
        assert_eq!(row.invested_krw, dec!(1400000));
        assert!(row.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_delete_missing_row_is_not_found() {
        let (_dir, db) = test_db().await;
        let err = db.delete(42).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(42)));
    }

    #[tokio::test]
    async fn test_unparseable_number_coerces_to_zero() {
        let (_dir, db) = test_db().await;
        sqlx::query(
            "INSERT INTO coin (symbol, kr_name, trade_date, trade_type, quantity, \
             invested_krw, invested_usd, trade_rate, created_at) \
             VALUES ('BTC', '', '2024-03-01', '매수', 'not-a-number', '0', '0', '0', ?)",
        )
        .bind(Utc::now())
        .execute(&db.pool)
        .await
        .unwrap();

        let rows = db.all().await.unwrap();
        assert_eq!(rows[0].quantity, Decimal::ZERO);
    }
}
