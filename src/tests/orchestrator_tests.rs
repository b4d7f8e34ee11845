//! Orchestrator sequencing tests: event order, balances, commands and the
//! session-lock interleaving guarantee.

use std::sync::Arc;

use super::mock::{test_desk, FakeOcr, MockBackend};
use crate::controls::CancelScope;

const CLIPBOARD: &str = "代码\t数量\n600000\t100";

#[tokio::test(start_paused = true)]
async fn positions_query_drives_the_exact_input_sequence() {
    super::init_tracing();
    let backend = MockBackend::with_clipboard(CLIPBOARD);
    let (desk, _dir) = test_desk(backend.clone(), FakeOcr::new(""));

    desk.positions().await.unwrap();

    assert_eq!(
        backend.events(),
        vec![
            "activate:xiadan.exe",
            "click_window",
            // F5 refresh
            "key:down:0074",
            "key:up:0074",
            // F4 view switch
            "key:down:0073",
            "key:up:0073",
            // content pane, then copy chord
            "click:1047",
            "key:down:0011",
            "key:down:0043",
            "key:up:0043",
            "key:up:0011",
            "clipboard",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn today_trades_walks_the_navigation_tree() {
    let backend = MockBackend::with_clipboard(CLIPBOARD);
    let (desk, _dir) = test_desk(backend.clone(), FakeOcr::new(""));

    let records = desk.today_trades().await.unwrap();
    assert_eq!(records.len(), 1);

    let events = backend.events();
    let nav = events
        .iter()
        .position(|e| e == "nav:200/查询[F4]/当日成交")
        .expect("navigation walk missing");
    assert_eq!(events[nav + 1], "click:当日成交");
    // Extraction still happens after the navigation detour.
    assert!(events.iter().any(|e| e == "click:1047"));
    assert_eq!(events.last().map(String::as_str), Some("clipboard"));
}

#[tokio::test(start_paused = true)]
async fn balances_reads_labeled_controls_in_contract_order() {
    let backend = MockBackend::new();
    let (desk, _dir) = test_desk(backend.clone(), FakeOcr::new(""));

    let record = desk.balances().await.unwrap();

    assert_eq!(record.len(), crate::controls::BALANCE_FIELDS.len());
    assert_eq!(record.get("资金余额"), Some("text-1012"));
    assert_eq!(record.get("总资产"), Some("text-1015"));
    // Column order follows the contract table, not lookup order.
    assert_eq!(
        record.iter().next(),
        Some(("资金余额", Some("text-1012")))
    );
    // Scalar path never touches clipboard or captcha machinery.
    assert!(!backend.events().iter().any(|e| e == "clipboard"));
}

#[tokio::test(start_paused = true)]
async fn missing_balance_control_is_null_not_fatal() {
    let backend = MockBackend::without_controls(&[1013]);
    let (desk, _dir) = test_desk(backend.clone(), FakeOcr::new(""));

    let record = desk.balances().await.unwrap();

    // The column is kept with no value, not dropped from the record.
    assert_eq!(record.len(), crate::controls::BALANCE_FIELDS.len());
    assert_eq!(record.get("冻结金额"), None);
    assert_eq!(record.get("可用金额"), Some("text-1016"));
    let json = serde_json::to_string(&record).unwrap();
    assert!(json.contains(r#""冻结金额":null"#), "json: {json}");
}

#[tokio::test(start_paused = true)]
async fn unreachable_window_fails_after_bounded_retries() {
    let backend = MockBackend::window_never_found();
    let (desk, _dir) = test_desk(backend.clone(), FakeOcr::new(""));

    let err = desk.positions().await.unwrap_err();

    assert!(matches!(err, crate::AutomationError::ElementNotFound(_)));
    assert_eq!(backend.window_attempts(), 3);
    // The failed query never reached the extraction stage.
    assert!(!backend.events().iter().any(|e| e == "clipboard"));
}

#[tokio::test(start_paused = true)]
async fn cancel_scope_selects_the_category_control() {
    let backend = MockBackend::new();
    let (desk, _dir) = test_desk(backend.clone(), FakeOcr::new(""));

    desk.cancel_orders(CancelScope::Buy).await.unwrap();

    assert_eq!(
        backend.events().last().map(String::as_str),
        Some("click:30002")
    );
}

#[test]
fn unknown_cancel_category_falls_back_to_all() {
    assert_eq!(CancelScope::from_param(Some("X")), CancelScope::Buy);
    assert_eq!(CancelScope::from_param(Some("C")), CancelScope::Sell);
    assert_eq!(CancelScope::from_param(Some("A")), CancelScope::All);
    assert_eq!(CancelScope::from_param(Some("Z")), CancelScope::All);
    assert_eq!(CancelScope::from_param(None), CancelScope::All);
}

/// Per-command side-effect template for the cancel sequence.
fn cancel_events(control: u32) -> Vec<String> {
    vec![
        "activate:xiadan.exe".to_string(),
        "click_window".to_string(),
        "key:down:0074".to_string(),
        "key:up:0074".to_string(),
        "key:down:0072".to_string(),
        "key:up:0072".to_string(),
        format!("click:{control}"),
    ]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_commands_never_interleave_input() {
    let backend = MockBackend::new();
    let (desk, _dir) = test_desk(backend.clone(), FakeOcr::new(""));
    let desk = Arc::new(desk);

    let a = {
        let desk = desk.clone();
        tokio::spawn(async move { desk.cancel_orders(CancelScope::Buy).await })
    };
    let b = {
        let desk = desk.clone();
        tokio::spawn(async move { desk.cancel_orders(CancelScope::Sell).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let events = backend.events();
    let buy = cancel_events(30002);
    let sell = cancel_events(30003);
    let buy_first: Vec<String> = buy.iter().chain(sell.iter()).cloned().collect();
    let sell_first: Vec<String> = sell.iter().chain(buy.iter()).cloned().collect();

    // Whichever command won the session lock, the other's first side effect
    // is ordered strictly after the winner's last one.
    assert!(
        events == buy_first || events == sell_first,
        "interleaved event log: {events:?}"
    );
}
