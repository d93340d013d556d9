//! Tests for core data types

#[cfg(test)]
mod tests {
    use super::super::types::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_trade_type_serde_uses_korean_codes() {
        assert_eq!(serde_json::to_string(&TradeType::Buy).unwrap(), "\"매수\"");
        assert_eq!(serde_json::to_string(&TradeType::Sell).unwrap(), "\"매도\"");
        let parsed: TradeType = serde_json::from_str("\"매도\"").unwrap();
        assert_eq!(parsed, TradeType::Sell);
    }

    #[test]
    fn test_trade_type_from_code_unknown_defaults_to_buy() {
        assert_eq!(TradeType::from_code("매도"), TradeType::Sell);
        assert_eq!(TradeType::from_code("매수"), TradeType::Buy);
        assert_eq!(TradeType::from_code(""), TradeType::Buy);
        assert_eq!(TradeType::from_code("garbage"), TradeType::Buy);
    }

    #[test]
    fn test_trade_type_display_matches_stored_code() {
        assert_eq!(TradeType::Buy.to_string(), "매수");
        assert_eq!(TradeType::Sell.to_string(), "매도");
    }

    #[test]
    fn test_new_transaction_deserializes_without_optional_fields() {
        let body = r#"{
            "symbol": "BTC",
            "trade_date": "2024-03-15",
            "quantity": "0.5",
            "invested_krw": "14000000",
            "invested_usd": "10000",
            "trade_rate": "1400"
        }"#;
        let tx: NewTransaction = serde_json::from_str(body).unwrap();
        assert_eq!(tx.symbol, "BTC");
        assert_eq!(tx.kr_name, "");
        assert_eq!(tx.trade_type, TradeType::Buy);
        assert_eq!(tx.trade_date, date("2024-03-15"));
        assert_eq!(tx.quantity, dec!(0.5));
    }

    #[test]
    fn test_transaction_patch_defaults_to_all_none() {
        let patch: TransactionPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.symbol.is_none());
        assert!(patch.quantity.is_none());
        assert!(patch.trade_type.is_none());
    }

    #[test]
    fn test_filter_defaults() {
        let filter = TransactionFilter::default();
        assert_eq!(filter.page(), 1);
        assert_eq!(filter.limit(), 10);
        assert_eq!(filter.offset(), 0);
    }

    #[test]
    fn test_filter_offset_is_page_minus_one_times_limit() {
        let filter = TransactionFilter {
            page: Some(3),
            limit: Some(25),
            ..Default::default()
        };
        assert_eq!(filter.offset(), 50);
    }

    #[test]
    fn test_filter_clamps_zero_page_and_limit() {
        let filter = TransactionFilter {
            page: Some(0),
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(filter.page(), 1);
        assert_eq!(filter.limit(), 1);
        assert_eq!(filter.offset(), 0);
    }

    #[test]
    fn test_filter_parses_from_query_style_json() {
        let body = r#"{
            "symbol": "ETH",
            "start_date": "2024-01-01",
            "end_date": "2024-06-30",
            "trade_type": "매도",
            "page": 2,
            "limit": 5
        }"#;
        let filter: TransactionFilter = serde_json::from_str(body).unwrap();
        assert_eq!(filter.symbol.as_deref(), Some("ETH"));
        assert_eq!(filter.trade_type, Some(TradeType::Sell));
        assert_eq!(filter.offset(), 5);
    }
}
