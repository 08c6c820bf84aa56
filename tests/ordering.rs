use sensei_hub::collections::{Collection, Collections};
use sensei_hub::entity::{CollectionId, Document, Fields, PerformanceSession, SEED_EVENT_ID};
use sensei_hub::session::tracker_stats;
use serde_json::Value;

fn session_doc(id: &str, game: &str, finished_at: Option<&str>, wins: u32, losses: u32) -> Document {
    let mut fields = Fields::new();
    fields.insert("game".into(), Value::from(game));
    fields.insert("mode".into(), Value::from("Ranked"));
    fields.insert("wins".into(), Value::from(wins));
    fields.insert("losses".into(), Value::from(losses));
    if let Some(at) = finished_at {
        fields.insert("finishedAt".into(), Value::from(at));
    }
    Document::new(id, fields)
}

fn ids(collections: &Collections) -> Vec<String> {
    collections
        .performance_log()
        .get_all()
        .iter()
        .map(|s| s.id.clone())
        .collect()
}

#[test]
fn performance_log_is_newest_first_regardless_of_arrival_order() {
    let mut collections = Collections::new();

    collections.apply_snapshot(
        CollectionId::PerformanceLog,
        &[
            session_doc("b", "fortnite", Some("2025-11-02T10:00:00Z"), 1, 1),
            session_doc("a", "fortnite", Some("2025-11-01T10:00:00Z"), 1, 1),
            session_doc("c", "fortnite", Some("2025-11-03T10:00:00Z"), 1, 1),
        ],
    );

    assert_eq!(ids(&collections), vec!["c", "b", "a"]);
}

#[test]
fn sessions_without_a_finish_moment_sort_last() {
    let mut collections = Collections::new();

    collections.apply_snapshot(
        CollectionId::PerformanceLog,
        &[
            session_doc("pending", "fortnite", None, 0, 0),
            session_doc("old", "fortnite", Some("2024-01-01T00:00:00Z"), 2, 0),
            session_doc("new", "fortnite", Some("2025-06-01T00:00:00Z"), 0, 2),
        ],
    );

    assert_eq!(ids(&collections), vec!["new", "old", "pending"]);
}

#[test]
fn equal_moments_keep_arrival_order() {
    let mut collections = Collections::new();
    let at = Some("2025-11-01T10:00:00Z");

    collections.apply_snapshot(
        CollectionId::PerformanceLog,
        &[
            session_doc("first", "valorant", at, 1, 0),
            session_doc("second", "valorant", at, 0, 1),
            session_doc("third", "valorant", at, 1, 1),
        ],
    );

    assert_eq!(ids(&collections), vec!["first", "second", "third"]);
}

#[test]
fn numeric_and_sdk_style_moments_order_alongside_strings() {
    let mut collections = Collections::new();
    let mut sdk = session_doc("sdk", "fortnite", None, 1, 0);
    let mut ts = Fields::new();
    ts.insert("seconds".into(), Value::from(1_767_225_600_i64)); // 2026-01-01
    ts.insert("nanoseconds".into(), Value::from(0));
    sdk.fields.insert("finishedAt".into(), Value::Object(ts));
    let mut millis = session_doc("millis", "fortnite", None, 1, 0);
    millis
        .fields
        .insert("finishedAt".into(), Value::from(1_704_067_200_000_i64)); // 2024-01-01

    collections.apply_snapshot(
        CollectionId::PerformanceLog,
        &[millis, session_doc("rfc", "fortnite", Some("2025-01-01T00:00:00Z"), 1, 0), sdk],
    );

    assert_eq!(ids(&collections), vec!["sdk", "rfc", "millis"]);
}

#[test]
fn event_snapshots_keep_the_seed_first_and_store_order_after() {
    let mut collections = Collections::new();
    let mut fields = Fields::new();
    fields.insert("title".into(), Value::from("Scrim"));
    fields.insert("date".into(), Value::from("2025-12-01"));
    fields.insert("type".into(), Value::from("training"));

    collections.apply_snapshot(
        CollectionId::Events,
        &[
            Document::new("z-event", fields.clone()),
            Document::new("a-event", fields.clone()),
            // A stored copy of the seed id must not duplicate it.
            Document::new(SEED_EVENT_ID, fields),
        ],
    );

    let ids: Vec<&str> = collections.events().get_all().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec![SEED_EVENT_ID, "z-event", "a-event"]);
    assert_eq!(collections.events().get_all()[0].title, "RL 1v1 Cash Cup");
}

#[test]
fn tracker_stats_aggregate_one_game_oldest_session_first() {
    let mut collections = Collections::new();
    collections.apply_snapshot(
        CollectionId::PerformanceLog,
        &[
            session_doc("s1", "rocketLeague", Some("2025-11-01T10:00:00Z"), 3, 1),
            session_doc("s2", "rocketLeague", Some("2025-11-02T10:00:00Z"), 1, 1),
            session_doc("other", "fortnite", Some("2025-11-03T10:00:00Z"), 9, 0),
            session_doc("empty", "rocketLeague", Some("2025-11-04T10:00:00Z"), 0, 0),
        ],
    );

    let stats = tracker_stats(collections.performance_log().get_all(), "rocketLeague");

    assert_eq!((stats.wins, stats.losses), (4, 2));
    assert_eq!(stats.win_rate, 66.7);
    assert_eq!(stats.series.len(), 2);
    assert_eq!(stats.series[0], ("Session 1".to_string(), 75.0));
    assert_eq!(stats.series[1], ("Session 2".to_string(), 50.0));
}

#[test]
fn tracker_stats_with_no_matches_report_zero() {
    let stats = tracker_stats(&[], "valorant");

    assert_eq!(stats.win_rate, 0.0);
    assert!(stats.series.is_empty());
}

#[test]
fn local_inserts_go_ahead_of_equal_moments() {
    let mut log = Collection::<PerformanceSession>::default();
    let at = Some("2025-11-01T10:00:00Z");

    log.insert_local(&session_doc("earlier", "fortnite", at, 1, 0));
    log.insert_local(&session_doc("later", "fortnite", at, 0, 1));
    log.insert_local(&session_doc("older", "fortnite", Some("2025-10-01T10:00:00Z"), 0, 0));

    let order: Vec<&str> = log.get_all().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(order, vec!["later", "earlier", "older"]);
}

#[test]
fn out_of_range_sdk_moments_sort_as_missing() {
    let mut collections = Collections::new();
    let mut huge = session_doc("huge", "fortnite", None, 1, 0);
    let mut ts = Fields::new();
    ts.insert("seconds".into(), Value::from(i64::MAX / 10));
    huge.fields.insert("finishedAt".into(), Value::Object(ts));

    collections.apply_snapshot(
        CollectionId::PerformanceLog,
        &[huge, session_doc("dated", "fortnite", Some("2025-01-01T00:00:00Z"), 1, 0)],
    );

    assert_eq!(ids(&collections), vec!["dated", "huge"]);
    let log = collections.performance_log().get_all();
    assert!(log[1].finished_at.is_none());
}

#[test]
fn tracker_stats_totals_exceed_a_single_session_counter() {
    let mut collections = Collections::new();
    collections.apply_snapshot(
        CollectionId::PerformanceLog,
        &[
            session_doc("a", "rocketLeague", Some("2025-11-01T10:00:00Z"), 3_000_000_000, 0),
            session_doc("b", "rocketLeague", Some("2025-11-02T10:00:00Z"), 3_000_000_000, 1),
        ],
    );

    let stats = tracker_stats(collections.performance_log().get_all(), "rocketLeague");

    assert_eq!(stats.wins, 6_000_000_000);
    assert_eq!(stats.losses, 1);
    assert_eq!(stats.win_rate, 100.0);
    assert_eq!(stats.series[0].1, 100.0);
}
