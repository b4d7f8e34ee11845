//! Clipboard table decoding tests.

use crate::table::{decode, TableRecord};

#[test]
fn decodes_rows_in_order_with_all_headers() {
    let raw = "代码\t名称\t数量\n600000\t浦发银行\t100\n000001\t平安银行\t200";
    let records = decode(raw);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("代码"), Some("600000"));
    assert_eq!(records[0].get("名称"), Some("浦发银行"));
    assert_eq!(records[0].get("数量"), Some("100"));
    assert_eq!(records[1].get("代码"), Some("000001"));

    // Every record carries every header.
    for record in &records {
        assert_eq!(record.len(), 3);
    }
}

#[test]
fn drops_rows_with_mismatched_field_count() {
    let raw = "A\tB\n1\t2\nx";
    let records = decode(raw);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("A"), Some("1"));
    assert_eq!(records[0].get("B"), Some("2"));
}

#[test]
fn empty_input_yields_no_records() {
    assert!(decode("").is_empty());
}

#[test]
fn header_only_input_yields_no_records() {
    assert!(decode("OnlyHeaderLine").is_empty());
}

#[test]
fn tolerates_windows_line_endings() {
    let raw = "A\tB\r\n1\t2\r\n";
    let records = decode(raw);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("B"), Some("2"));
}

#[test]
fn record_preserves_column_order_in_json() {
    let raw = "z\ta\tm\n1\t2\t3";
    let records = decode(raw);
    let json = serde_json::to_string(&records[0]).unwrap();
    assert_eq!(json, r#"{"z":"1","a":"2","m":"3"}"#);
}

#[test]
fn record_lookup_misses_are_none() {
    let mut record = TableRecord::new();
    record.push("总资产", "10000.00");
    assert_eq!(record.get("总资产"), Some("10000.00"));
    assert_eq!(record.get("可用金额"), None);
    assert!(!record.is_empty());
}
