//! End-to-end runs of the list and cleanup workflows over in-memory endpoints.

use std::io::Cursor;

use chrono::{DateTime, Duration, TimeZone, Utc};
use vsnap_common::EndpointCredential;
use vsnap_lib::cleanup::{run_cleanup, AgeSource, CleanupOptions};
use vsnap_lib::filter::AgeThreshold;
use vsnap_lib::lister::run_list;
use vsnap_lib::logging::{file_layer, open_log_file};
use vsnap_lib::memory::{snapshot_tree, InMemoryConnector, InMemoryInventory};
use vsnap_lib::prompt::CONFIRM_PROMPT;
use vsnap_lib::report::{OutputFormat, EMPTY_LISTING, NO_CANDIDATES};
use vsnap_lib::VsnapError;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
}

fn days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

fn creds(hosts: &[&str]) -> Vec<EndpointCredential> {
    hosts
        .iter()
        .enumerate()
        .map(|(i, host)| EndpointCredential::new(i as u32 + 1, *host, "admin", "pw"))
        .collect()
}

/// One VM with a 45 day old snapshot and a 10 day old child.
fn aged_inventory() -> InMemoryInventory {
    InMemoryInventory::new().with_vm(
        "vm-1",
        "db01",
        vec![snapshot_tree(
            "snap-45",
            "before-upgrade",
            days_ago(45),
            vec![snapshot_tree("snap-10", "nightly", days_ago(10), vec![])],
        )],
    )
}

fn options(yes: bool) -> CleanupOptions {
    CleanupOptions {
        age: AgeSource::Fixed(AgeThreshold::days(30).unwrap()),
        assume_yes: yes,
        format: OutputFormat::Table,
    }
}

#[tokio::test]
async fn test_lister_shows_every_snapshot_regardless_of_age() {
    let inventory = aged_inventory();
    let connector = InMemoryConnector::new().with_endpoint("vc1", inventory.clone());
    let mut out = Vec::new();

    let rows = run_list(&connector, &creds(&["vc1"]), OutputFormat::Table, &mut out)
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("before-upgrade"));
    assert!(text.contains("nightly"));
    assert!(text.contains("| vCenter |"));
    assert_eq!(inventory.logouts(), 1);
}

#[tokio::test]
async fn test_lister_empty_inventory_message() {
    let connector = InMemoryConnector::new().with_endpoint("vc1", InMemoryInventory::new());
    let mut out = Vec::new();
    run_list(&connector, &creds(&["vc1"]), OutputFormat::Table, &mut out)
        .await
        .unwrap();
    assert_eq!(String::from_utf8(out).unwrap().trim(), EMPTY_LISTING);
}

#[tokio::test]
async fn test_cleanup_candidates_exclude_young_snapshots() {
    let inventory = aged_inventory();
    let connector = InMemoryConnector::new().with_endpoint("vc1", inventory.clone());
    let mut out = Vec::new();

    let outcome = run_cleanup(
        &connector,
        &creds(&["vc1"]),
        &options(false),
        now(),
        &mut Cursor::new(&b"y\n"[..]),
        &mut out,
    )
    .await
    .unwrap();

    let ids: Vec<_> = outcome.candidates.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["snap-45"]);
    assert!(outcome.confirmed);
    assert_eq!(inventory.removed(), vec!["snap-45".to_string()]);
    assert!(outcome.failed.is_empty());

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Age (days)"));
    assert!(!text.contains("nightly"));
    assert!(text.contains("Deleted 1 snapshot(s), 0 failed."));
}

#[tokio::test]
async fn test_declined_confirmation_deletes_nothing() {
    let inventory = aged_inventory();
    let connector = InMemoryConnector::new().with_endpoint("vc1", inventory.clone());

    for answer in [&b"n\n"[..], &b"\n"[..], &b""[..]] {
        let outcome = run_cleanup(
            &connector,
            &creds(&["vc1"]),
            &options(false),
            now(),
            &mut Cursor::new(answer),
            &mut Vec::new(),
        )
        .await
        .unwrap();

        assert!(!outcome.confirmed);
        assert_eq!(outcome.candidates.len(), 1);
        assert!(outcome.deleted.is_empty());
    }
    assert!(inventory.removed().is_empty());
    assert_eq!(inventory.logouts(), 3);
}

#[tokio::test]
async fn test_deletion_is_best_effort_and_children_first() {
    let inventory = InMemoryInventory::new()
        .with_vm(
            "vm-1",
            "db01",
            vec![snapshot_tree(
                "root",
                "base",
                days_ago(200),
                vec![snapshot_tree(
                    "mid",
                    "patch",
                    days_ago(150),
                    vec![snapshot_tree("leaf", "hotfix", days_ago(100), vec![])],
                )],
            )],
        )
        .with_vm(
            "vm-2",
            "web01",
            vec![snapshot_tree("web-old", "old", days_ago(90), vec![])],
        )
        .fail_removal("mid");
    let connector = InMemoryConnector::new().with_endpoint("vc1", inventory.clone());

    let outcome = run_cleanup(
        &connector,
        &creds(&["vc1"]),
        &options(true),
        now(),
        &mut Cursor::new(&b""[..]),
        &mut Vec::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        inventory.removed(),
        vec!["leaf".to_string(), "root".to_string(), "web-old".to_string()]
    );
    let failed: Vec<_> = outcome.failed.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(failed, vec!["mid"]);
    assert_eq!(outcome.deleted.len(), 3);
}

#[tokio::test]
async fn test_each_candidate_listed_once_across_endpoints() {
    let a = InMemoryInventory::new().with_vm(
        "vm-1",
        "db01",
        vec![snapshot_tree("s1", "old", days_ago(60), vec![])],
    );
    // Same managed object ids on a different vCenter are different snapshots.
    let b = InMemoryInventory::new().with_vm(
        "vm-1",
        "db01",
        vec![snapshot_tree("s1", "old", days_ago(60), vec![])],
    );
    let connector = InMemoryConnector::new()
        .with_endpoint("vc-a", a.clone())
        .with_endpoint("vc-b", b.clone());

    let outcome = run_cleanup(
        &connector,
        &creds(&["vc-a", "vc-b"]),
        &options(true),
        now(),
        &mut Cursor::new(&b""[..]),
        &mut Vec::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.candidates.len(), 2);
    assert_eq!(a.removed(), vec!["s1".to_string()]);
    assert_eq!(b.removed(), vec!["s1".to_string()]);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_logged_once_and_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("snapshot_cleanup.log");
    let subscriber = {
        use tracing_subscriber::layer::SubscriberExt;
        tracing_subscriber::registry().with(file_layer(open_log_file(&log_path).unwrap()))
    };
    let _guard = tracing::subscriber::set_default(subscriber);

    let a = aged_inventory();
    let connector = InMemoryConnector::new().with_endpoint("vc-a", a.clone());
    let mut out = Vec::new();

    let rows = run_list(
        &connector,
        &creds(&["vc-a", "vc-b"]),
        OutputFormat::Table,
        &mut out,
    )
    .await
    .unwrap();

    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.vm.endpoint.host == "vc-a"));

    let log = std::fs::read_to_string(&log_path).unwrap();
    let failures: Vec<_> = log
        .lines()
        .filter(|line| line.contains("Error connecting to vCenter"))
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("vc-b"));
    assert!(failures[0].contains("ERROR"));
}

#[tokio::test]
async fn test_no_reachable_endpoint_is_fatal() {
    let connector = InMemoryConnector::new();
    let err = run_cleanup(
        &connector,
        &creds(&["vc-a"]),
        &options(true),
        now(),
        &mut Cursor::new(&b""[..]),
        &mut Vec::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, VsnapError::NoSessions));
}

#[tokio::test]
async fn test_ask_age_quit_connects_nowhere() {
    let connector = InMemoryConnector::new().with_endpoint("vc1", aged_inventory());
    let options = CleanupOptions {
        age: AgeSource::Ask,
        ..options(false)
    };

    let outcome = run_cleanup(
        &connector,
        &creds(&["vc1"]),
        &options,
        now(),
        &mut Cursor::new(&b"q\n"[..]),
        &mut Vec::new(),
    )
    .await
    .unwrap();

    assert!(outcome.threshold.is_none());
    assert!(connector.attempts().is_empty());
}

#[tokio::test]
async fn test_ask_age_then_confirm() {
    let inventory = aged_inventory();
    let connector = InMemoryConnector::new().with_endpoint("vc1", inventory.clone());
    let options = CleanupOptions {
        age: AgeSource::Ask,
        ..options(false)
    };

    // 5 days catches both snapshots.
    let outcome = run_cleanup(
        &connector,
        &creds(&["vc1"]),
        &options,
        now(),
        &mut Cursor::new(&b"5\nyes\n"[..]),
        &mut Vec::new(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.threshold.map(|t| t.as_days()), Some(5));
    assert_eq!(
        inventory.removed(),
        vec!["snap-10".to_string(), "snap-45".to_string()]
    );
}

#[tokio::test]
async fn test_same_host_under_two_indices_is_processed_once() {
    let inventory = aged_inventory();
    let connector = InMemoryConnector::new().with_endpoint("vc1", inventory.clone());
    let creds = creds(&["vc1", "vc1"]);

    let rows = run_list(&connector, &creds, OutputFormat::Table, &mut Vec::new())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    let outcome = run_cleanup(
        &connector,
        &creds,
        &options(true),
        now(),
        &mut Cursor::new(&b""[..]),
        &mut Vec::new(),
    )
    .await
    .unwrap();

    let candidates: Vec<_> = outcome
        .candidates
        .iter()
        .map(|s| (s.endpoint().index, s.id.as_str()))
        .collect();
    assert_eq!(candidates, vec![(1, "snap-45")]);
    assert_eq!(outcome.deleted.len(), 1);
    assert!(outcome.failed.is_empty());
    assert_eq!(connector.attempts(), vec!["vc1", "vc1"]);
}

#[tokio::test]
async fn test_no_candidates_skips_confirmation() {
    let inventory = InMemoryInventory::new().with_vm(
        "vm-1",
        "db01",
        vec![snapshot_tree("young", "nightly", days_ago(3), vec![])],
    );
    let connector = InMemoryConnector::new().with_endpoint("vc1", inventory.clone());
    let mut out = Vec::new();

    let outcome = run_cleanup(
        &connector,
        &creds(&["vc1"]),
        &options(false),
        now(),
        &mut Cursor::new(&b""[..]),
        &mut out,
    )
    .await
    .unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains(NO_CANDIDATES));
    assert!(!text.contains(CONFIRM_PROMPT));
    assert!(outcome.candidates.is_empty());
    assert!(!outcome.confirmed);
    assert!(inventory.removed().is_empty());
    assert_eq!(inventory.logouts(), 1);
}

#[tokio::test]
async fn test_json_candidates_carry_age() {
    let connector = InMemoryConnector::new().with_endpoint("vc1", aged_inventory());
    let options = CleanupOptions {
        format: OutputFormat::Json,
        ..options(false)
    };
    let mut out = Vec::new();

    run_cleanup(
        &connector,
        &creds(&["vc1"]),
        &options,
        now(),
        &mut Cursor::new(&b"n\n"[..]),
        &mut out,
    )
    .await
    .unwrap();

    let text = String::from_utf8(out).unwrap();
    let json = text.strip_suffix(CONFIRM_PROMPT).unwrap();
    let value: serde_json::Value = serde_json::from_str(json).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 1);
    assert_eq!(value[0]["snapshot"], "before-upgrade");
    assert_eq!(value[0]["vcenter"], "vc1");
    assert_eq!(value[0]["age_days"], 45);
}
