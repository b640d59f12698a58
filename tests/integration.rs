
use appruns::app::{AuthorizeCard, AuthorizeDecision, RunPage, RunStatus};
use appruns::events::AppEvent;
use appruns::fetch::FetchTasks;
use appruns::history::{FetchOutcome, HistoryOptions, PageRequest, RunHistory};
use appruns::input::{self, Action, InputContext, OverlayMode};
use appruns::om::parser;
use appruns::traits::RunSource;
use fixtures::*;

use async_trait::async_trait;
use color_eyre::eyre::{eyre, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn press(code: KeyCode) -> KeyEvent {
    KeyEvent {
        code,
        modifiers: KeyModifiers::NONE,
        kind: KeyEventKind::Press,
        state: KeyEventState::NONE,
    }
}

fn paged_ctx() -> InputContext {
    InputContext {
        pagination: true,
        ..Default::default()
    }
}

// ========== Data flow tests ==========

#[test]
fn full_flow_json_to_parse_to_history_to_state() {
    let json = r#"{
        "data": [
            {
                "appId": "7c3e1a52-2b9f-4d0e-9b6a-1f2e3d4c5b6a",
                "timestamp": 1700000100000,
                "runType": "OnDemand",
                "status": "running",
                "startTime": 1700000100000
            },
            {
                "appId": "7c3e1a52-2b9f-4d0e-9b6a-1f2e3d4c5b6a",
                "timestamp": 1700000000000,
                "runType": "Scheduled",
                "status": "success",
                "successContext": null
            },
            {
                "appId": "7c3e1a52-2b9f-4d0e-9b6a-1f2e3d4c5b6a",
                "timestamp": 1699990000000,
                "runType": "Scheduled",
                "status": "failed",
                "failureContext": {"failure": "Connection reset"}
            },
            {
                "timestamp": null,
                "runType": null
            }
        ],
        "paging": {"offset": 0, "limit": 10, "total": 4}
    }"#;

    let page = parser::parse_run_page(json).expect("parse should succeed");
    assert_eq!(page.total, 4);

    let mut state = make_state("sales_report");
    let req = state.history.fetch_page(None).expect("request issued");
    assert!(state.is_loading());
    let reporter = RecordingReporter::default();
    let outcome = state.history.complete(req.seq, Ok(page), &reporter);
    assert_eq!(outcome, FetchOutcome::Applied { records: 4 });
    assert!(!state.is_loading());

    let statuses: Vec<RunStatus> = state.history.records().iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            RunStatus::Running,
            RunStatus::Success,
            RunStatus::Failed,
            RunStatus::Failed,
        ]
    );
    let last = &state.history.records()[3];
    assert_eq!(last.id, "--0");

    // Running row: logs toggle open and closed
    let running_id = state.history.records()[0].id.clone();
    state.toggle_selected_logs();
    assert!(state.history.is_expanded(&running_id));
    state.toggle_selected_logs();
    assert!(!state.history.is_expanded(&running_id));

    // Success with null context: available
    state.move_cursor_down();
    state.toggle_selected_logs();
    assert_eq!(state.history.expanded_ids().len(), 1);

    // Failed row: disabled, surfaces an error instead
    state.move_cursor_down();
    state.toggle_selected_logs();
    assert_eq!(state.history.expanded_ids().len(), 1);
    assert_eq!(state.error_message(), Some("No logs available for this run"));
    assert!(reporter.messages().is_empty());
}

#[test]
fn paging_through_sales_report_with_keys() {
    let mut state = make_state("sales_report");
    let reporter = RecordingReporter::default();

    let first = state.history.fetch_page(None).unwrap();
    state
        .history
        .complete(first.seq, Ok(page(1_700_000_000_000, 10, 25)), &reporter);
    assert!(state.history.pagination_visible());

    let ctx = paged_ctx();
    assert_eq!(input::map_key(press(KeyCode::Char('n')), &ctx), Action::NextPage);
    let second = state.next_page().unwrap();
    assert_eq!((second.offset, second.limit), (10, 10));
    assert_eq!(state.history.current_page(), 1);
    state
        .history
        .complete(second.seq, Ok(page(1_699_000_000_000, 10, 25)), &reporter);

    let third = state.next_page().unwrap();
    assert_eq!((third.offset, third.limit), (20, 10));
    state.cursor = 9;
    state
        .history
        .complete(third.seq, Ok(page(1_698_000_000_000, 5, 25)), &reporter);
    state.clamp_cursor();

    assert_eq!(state.history.records().len(), 5);
    assert_eq!(state.cursor, 4);
    assert!(state.history.pagination_visible());
    assert!(!state.history.has_next_page());
    assert!(state.next_page().is_none());

    let back = state.prev_page().unwrap();
    assert_eq!(back.offset, 10);
}

#[test]
fn out_of_order_completion_keeps_latest_request() {
    let mut history = RunHistory::new("sales_report".to_string(), HistoryOptions::default());
    let reporter = RecordingReporter::default();

    let a = history.change_page(1).unwrap();
    let b = history.change_page(2).unwrap();

    assert_eq!(
        history.complete(b.seq, Ok(page(2_000, 5, 25)), &reporter),
        FetchOutcome::Applied { records: 5 }
    );
    assert_eq!(
        history.complete(a.seq, Ok(page(1_000, 10, 99)), &reporter),
        FetchOutcome::Stale
    );

    assert_eq!(history.paging().total, 25);
    assert_eq!(history.paging().offset, 20);
    assert_eq!(history.records().len(), 5);
    assert!(!history.is_loading());
}

#[test]
fn failed_fetch_keeps_previous_page() {
    let mut state = make_state("sales_report");
    let reporter = RecordingReporter::default();

    let first = state.history.fetch_page(None).unwrap();
    state
        .history
        .complete(first.seq, Ok(page(1_700_000_000_000, 10, 25)), &reporter);
    let before: Vec<String> = state.history.records().iter().map(|r| r.id.clone()).collect();
    let paging_before = state.history.paging();

    let refresh = state.history.refresh().unwrap();
    let outcome = state
        .history
        .complete(refresh.seq, Err(eyre!("Server returned 502 Bad Gateway")), &reporter);

    assert_eq!(outcome, FetchOutcome::Failed);
    assert!(!state.is_loading());
    let after: Vec<String> = state.history.records().iter().map(|r| r.id.clone()).collect();
    assert_eq!(after, before);
    assert_eq!(state.history.paging(), paging_before);
    assert_eq!(reporter.messages(), vec!["Server returned 502 Bad Gateway".to_string()]);
}

#[test]
fn max_records_overrides_limit() {
    let mut cfg = config("sales_report");
    cfg.max_records = Some(5);
    let mut state = appruns::app::AppState::new(cfg);

    let req = state.history.fetch_page(None).unwrap();
    assert_eq!(req.limit, 5);
    let next = state.history.change_page(1).unwrap();
    assert_eq!((next.offset, next.limit), (10, 5));
}

#[test]
fn teardown_discards_late_results() {
    let mut state = make_state("sales_report");
    let reporter = RecordingReporter::default();
    let req = state.history.fetch_page(None).unwrap();

    state.history.teardown();
    assert_eq!(
        state.history.complete(req.seq, Ok(page(1_000, 3, 3)), &reporter),
        FetchOutcome::Discarded
    );
    assert!(state.history.records().is_empty());
    assert!(state.history.fetch_page(None).is_none());
}

// ========== Authorize card ==========

#[test]
fn authorize_card_from_server_payloads() {
    let user = parser::parse_current_user(
        r#"{"id": "u1", "name": "aaron_johnson0", "displayName": "Aaron Johnson"}"#,
    )
    .unwrap();
    let app = parser::parse_marketplace_app(
        r#"{
            "name": "SearchIndexingApplication",
            "displayName": "Search Indexing",
            "developer": "Collate Inc.",
            "developerUrl": "https://www.getcollate.io",
            "updatedAt": 1700000000000
        }"#,
    )
    .unwrap();

    let card = AuthorizeCard::new(&app, &user);
    assert_eq!(card.app_name, "Search Indexing");
    assert_eq!(card.user_name, "Aaron Johnson");
    assert_eq!(card.developer, "Collate Inc.");

    let mut state = make_state("SearchIndexingApplication");
    state.open_authorize_card(card);
    let ctx = InputContext {
        overlay: OverlayMode::Authorize,
        ..Default::default()
    };
    assert_eq!(input::map_key(press(KeyCode::Char('y')), &ctx), Action::Configure);
    state.resolve_authorize_card(AuthorizeDecision::Configure);
    assert!(!state.has_authorize_card());
    assert!(!state.should_quit);
}

#[test]
fn cancelling_authorize_card_quits() {
    let mut state = make_state("SearchIndexingApplication");
    state.open_authorize_card(AuthorizeCard {
        app_name: "Search Indexing".to_string(),
        developer: String::new(),
        developer_url: None,
        updated_at: None,
        user_name: "admin".to_string(),
    });
    state.resolve_authorize_card(AuthorizeDecision::Cancel);
    assert!(state.should_quit);
}

// ========== Async fetch tests ==========

/// Answers page requests after a per-offset delay.
struct SlowFirstPage;

#[async_trait]
impl RunSource for SlowFirstPage {
    async fn fetch_runs(&self, _entity: &str, offset: usize, limit: usize) -> Result<RunPage> {
        let delay = if offset == 0 { 150 } else { 10 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        let total = if offset == 0 { 11 } else { 25 };
        Ok(page(1_700_000_000_000 - offset as i64 * 1000, limit.min(5), total))
    }
}

struct FailingSource;

#[async_trait]
impl RunSource for FailingSource {
    async fn fetch_runs(&self, _entity: &str, _offset: usize, _limit: usize) -> Result<RunPage> {
        Err(eyre!("Cannot reach server localhost:8585"))
    }
}

async fn next_page_result(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> (u64, Result<RunPage>) {
    loop {
        match rx.recv().await {
            Some(AppEvent::PageResult { seq, result }) => return (seq, result),
            Some(_) => {}
            None => panic!("channel closed"),
        }
    }
}

#[tokio::test]
async fn slow_stale_response_cannot_overwrite_newer_page() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut tasks = FetchTasks::new(Arc::new(SlowFirstPage), tx);
    let mut state = make_state("sales_report");
    let reporter = RecordingReporter::default();

    tasks.dispatch(state.history.fetch_page(None));
    tasks.dispatch(state.history.change_page(2));

    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let (seq, result) = next_page_result(&mut rx).await;
        outcomes.push(state.history.complete(seq, result, &reporter));
    }

    assert_eq!(
        outcomes,
        vec![FetchOutcome::Applied { records: 5 }, FetchOutcome::Stale]
    );
    assert_eq!(state.history.paging().total, 25);
    assert_eq!(state.history.paging().offset, 20);
    assert!(!state.is_loading());
}

#[tokio::test]
async fn source_error_reaches_reporter() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut tasks = FetchTasks::new(Arc::new(FailingSource), tx);
    let mut state = make_state("sales_report");
    let reporter = RecordingReporter::default();

    tasks.dispatch(state.history.fetch_page(None));
    let (seq, result) = next_page_result(&mut rx).await;

    assert_eq!(state.history.complete(seq, result, &reporter), FetchOutcome::Failed);
    assert!(!state.is_loading());
    assert_eq!(
        reporter.messages(),
        vec!["Cannot reach server localhost:8585".to_string()]
    );
}

#[tokio::test]
async fn teardown_then_abort_leaves_state_untouched() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut tasks = FetchTasks::new(Arc::new(SlowFirstPage), tx);
    let mut state = make_state("sales_report");

    tasks.dispatch(state.history.fetch_page(None));
    state.history.teardown();
    tasks.abort_all();
    drop(tasks);

    let got = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(matches!(got, Ok(None)));
    assert!(state.history.records().is_empty());
    assert!(!state.is_loading());
}

#[test]
fn page_request_carries_entity() {
    let mut history = RunHistory::new("sales_report".to_string(), HistoryOptions::default());
    let req = history.fetch_page(Some(37)).unwrap();
    assert_eq!(
        req,
        PageRequest {
            seq: 1,
            entity: "sales_report".to_string(),
            offset: 30,
            limit: 10,
        }
    );
}
