use super::*;
use crate::StatsDb;

#[test]
fn timestamp_round_trips_through_duckdb() {
    let db = StatsDb::open_memory().unwrap();
    let ts = now_utc();
    let text: String = db
        .conn()
        .query_row(
            "SELECT CAST(CAST(? AS TIMESTAMP) AS VARCHAR)",
            duckdb::params![format_timestamp(&ts)],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(parse_timestamp(&text).unwrap(), ts);
}

#[test]
fn parse_timestamp_without_fraction() {
    let ts = parse_timestamp("2024-03-01 12:30:00").unwrap();
    assert_eq!(format_timestamp(&ts), "2024-03-01 12:30:00.000000");
}

#[test]
fn decimal_round_trips_through_duckdb() {
    let db = StatsDb::open_memory().unwrap();
    let text: String = db
        .conn()
        .query_row(
            "SELECT CAST(CAST(? AS DECIMAL(18, 2)) AS VARCHAR)",
            duckdb::params!["1234.5"],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(text, "1234.50");
    assert_eq!(parse_decimal(&text).unwrap(), Decimal::new(12345, 1));
}

#[test]
fn invalid_values_are_reported() {
    assert!(matches!(
        parse_decimal("abc"),
        Err(StoreError::InvalidData(_))
    ));
    assert!(parse_timestamp("yesterday").is_err());
}
