use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use sensei_hub::config::AppConfig;
use sensei_hub::debounce::SAVED_LABEL;
use sensei_hub::dispatch::Tab;
use sensei_hub::entity::{CollectionId, Document, Fields, PlayerCard, SEED_EVENT_ID};
use sensei_hub::hub::SyncHub;
use sensei_hub::memory_store::{MemoryConnector, MemoryStore};
use sensei_hub::state::Delta;
use sensei_hub::supervisor::Mode;
use serde_json::Value;

const VALID_CONFIG: &str = r#"{"apiKey":"test-key","projectId":"sensei-test"}"#;

fn live_hub(store: Arc<MemoryStore>) -> (SyncHub, Receiver<Delta>) {
    let mut config = AppConfig::offline();
    config.store_config = Some(VALID_CONFIG.to_string());
    let connector = MemoryConnector::new(store);
    let (tx, rx) = mpsc::channel();
    let mut hub = SyncHub::new(tx);
    let resolution = hub.start(&connector, &config);
    assert_eq!(resolution.mode, Mode::Live);
    hub.drain(&rx);
    (hub, rx)
}

/// Applies deltas until the store worker reports the outcome of one write.
fn settle_write(hub: &mut SyncHub, rx: &Receiver<Delta>) -> Delta {
    loop {
        let delta = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("store worker answered");
        let done = matches!(delta, Delta::WriteAcked { .. } | Delta::WriteFailed { .. });
        hub.apply(delta.clone());
        if done {
            return delta;
        }
    }
}

fn link_doc(id: &str, username: &str) -> Document {
    let mut fields = Fields::new();
    fields.insert("platform".into(), Value::from("Twitch"));
    fields.insert("username".into(), Value::from(username));
    Document::new(id, fields)
}

#[test]
fn live_create_arrives_through_the_subscription_not_locally() {
    let store = Arc::new(MemoryStore::new());
    let (mut hub, rx) = live_hub(store.clone());

    let id = hub.add_event("Scrim", "2025-12-01", "training").expect("sent");
    // Nothing is applied before the store answers.
    assert!(hub.state().collections().events().find(&id).is_none());

    let outcome = settle_write(&mut hub, &rx);

    assert!(matches!(outcome, Delta::WriteAcked { .. }));
    let event = hub.state().collections().events().find(&id).expect("event synced");
    assert_eq!(event.title, "Scrim");
    assert!(event.created_at.is_some(), "store stamps createdAt");
    let stored = store.document(CollectionId::Events, &id).expect("stored");
    assert!(stored.fields.contains_key("createdAt"));
}

#[test]
fn live_update_and_delete_round_trip_through_the_store() {
    let store = Arc::new(MemoryStore::new());
    let (mut hub, rx) = live_hub(store.clone());
    let id = hub.add_social_link("Twitch", "sensei").expect("sent");
    settle_write(&mut hub, &rx);
    assert_eq!(hub.state().collections().social_links().len(), 1);

    hub.unlink_social(&id).expect("sent");
    settle_write(&mut hub, &rx);

    assert!(hub.state().collections().social_links().is_empty());
    assert!(store.documents(CollectionId::SocialLinks).is_empty());
}

#[test]
fn rejected_live_write_changes_nothing_and_is_logged() {
    let store = Arc::new(MemoryStore::new());
    let (mut hub, rx) = live_hub(store.clone());
    store.set_fail_writes(true);

    let id = hub.add_vod("https://youtu.be/abc123XYZ", "Clip", "valorant").expect("sent");
    let outcome = settle_write(&mut hub, &rx);

    assert!(matches!(outcome, Delta::WriteFailed { .. }));
    assert!(hub.state().collections().vod_library().find(&id).is_none());
    assert!(store.documents(CollectionId::VodLibrary).is_empty());
    assert_eq!(hub.mode(), Mode::Live);
    assert!(
        hub.state()
            .logs
            .iter()
            .any(|l| l.starts_with("[WARN]") && l.contains("vodLibrary"))
    );
}

#[test]
fn write_rejected_for_lost_session_demotes_to_demo() {
    let store = Arc::new(MemoryStore::new());
    let (mut hub, rx) = live_hub(store.clone());
    store.revoke_auth();
    // Drop the auth watcher's own notice so the write path is what demotes.
    while rx.try_recv().is_ok() {}

    hub.add_social_link("Twitch", "late").expect("sent");
    let outcome = settle_write(&mut hub, &rx);
    assert!(matches!(outcome, Delta::WriteFailed { .. }));
    let notice = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("auth loss reported after the failed write");
    hub.apply(notice);

    assert_eq!(hub.mode(), Mode::Demo);
    assert!(hub.state().collections().social_links().is_empty());
}

#[test]
fn empty_snapshot_leaves_only_the_seed_event() {
    let store = Arc::new(MemoryStore::new());
    let (hub, _rx) = live_hub(store);

    let events = hub.state().collections().events().get_all();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, SEED_EVENT_ID);
}

#[test]
fn snapshot_replaces_the_collection_wholesale() {
    let store = Arc::new(MemoryStore::new());
    store.seed_document(CollectionId::SocialLinks, link_doc("l1", "one"));
    store.seed_document(CollectionId::SocialLinks, link_doc("l2", "two"));
    let (mut hub, rx) = live_hub(store);
    assert_eq!(hub.state().collections().social_links().len(), 2);

    let generation = hub.state().generation;
    hub.apply(Delta::Snapshot {
        generation,
        collection: CollectionId::SocialLinks,
        documents: vec![link_doc("l3", "three")],
    });
    hub.drain(&rx);

    let links = hub.state().collections().social_links().get_all();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].id, "l3");
}

#[test]
fn background_snapshots_do_not_redraw_other_tabs() {
    let store = Arc::new(MemoryStore::new());
    let (mut hub, rx) = live_hub(store.clone());
    hub.navigate(Tab::Calendar);
    hub.take_redraw();
    let redraws = hub.state().refresh.redraw_count();
    let skipped = hub.state().refresh.skipped_count();

    store.seed_document(CollectionId::PerformanceLog, Document::new("s1", Fields::new()));
    hub.drain(&rx);

    assert!(!hub.take_redraw());
    assert_eq!(hub.state().refresh.redraw_count(), redraws);
    assert_eq!(hub.state().refresh.skipped_count(), skipped + 1);
    assert_eq!(hub.state().collections().performance_log().len(), 1);

    hub.navigate(Tab::Tracker);
    hub.take_redraw();
    store.seed_document(CollectionId::PerformanceLog, Document::new("s2", Fields::new()));
    hub.drain(&rx);

    assert!(hub.take_redraw());
    assert_eq!(hub.state().refresh.redraw_count(), redraws + 1);
}

#[test]
fn failed_subscription_keeps_other_collections_syncing() {
    let store = Arc::new(MemoryStore::new());
    store.seed_document(CollectionId::VodLibrary, Document::new("v1", Fields::new()));
    store.seed_document(CollectionId::SocialLinks, link_doc("l1", "one"));
    store.fail_subscription(CollectionId::VodLibrary);

    let (hub, _rx) = live_hub(store);

    assert_eq!(hub.mode(), Mode::Live);
    assert!(hub.state().collections().vod_library().is_empty());
    assert_eq!(hub.state().collections().social_links().len(), 1);
    assert!(
        hub.state()
            .logs
            .iter()
            .any(|l| l.contains("Error loading vodLibrary"))
    );
}

#[test]
fn change_listeners_fire_for_live_snapshots() {
    let store = Arc::new(MemoryStore::new());
    let (mut hub, rx) = live_hub(store.clone());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    hub.on_change(move |collection, state| {
        sink.borrow_mut().push((collection, state.collections().len(collection)));
    });

    store.seed_document(CollectionId::SocialLinks, link_doc("l1", "one"));
    hub.drain(&rx);

    assert_eq!(*seen.borrow(), vec![(CollectionId::SocialLinks, 1)]);
}

#[test]
fn profile_saves_round_trip_through_the_store() {
    let store = Arc::new(MemoryStore::new());
    let (mut hub, rx) = live_hub(store.clone());

    hub.set_game_account("rocketLeague", "SenseiRL").expect("sent");
    settle_write(&mut hub, &rx);
    hub.set_player_card(
        "rocketLeague",
        PlayerCard {
            role: "Striker".into(),
            style: "Fast rotations".into(),
            availability: "Weekends".into(),
        },
    )
    .expect("sent");
    settle_write(&mut hub, &rx);

    let profile = hub.state().collections().profile();
    assert_eq!(profile.account_for("rocketLeague"), Some("SenseiRL"));
    assert_eq!(profile.player_card["rocketLeague"].role, "Striker");
    let stored = store.profile().expect("profile stored");
    assert_eq!(stored["gameAccounts"]["rocketLeague"], "SenseiRL");
}

#[test]
fn stored_profile_loads_on_connect() {
    let store = Arc::new(MemoryStore::new());
    let mut accounts = Fields::new();
    accounts.insert("fortnite".into(), Value::from("Builder99"));
    let mut fields = Fields::new();
    fields.insert("gameAccounts".into(), Value::Object(accounts));
    store.seed_profile(fields);

    let (hub, _rx) = live_hub(store);

    assert_eq!(
        hub.state().collections().profile().account_for("fortnite"),
        Some("Builder99")
    );
}

#[test]
fn live_notes_write_shows_saved_after_the_ack() {
    let store = Arc::new(MemoryStore::new());
    let (mut hub, rx) = live_hub(store.clone());
    let id = hub.add_vod("https://youtu.be/abc123XYZ", "Clip", "valorant").expect("sent");
    settle_write(&mut hub, &rx);
    hub.load_vod(&id).expect("loaded");

    let t0 = Instant::now();
    hub.edit_vod_notes("hold the mid", t0);
    hub.tick(t0 + Duration::from_millis(500));
    // Not yet acknowledged.
    assert_ne!(hub.state().notes.indicator(Instant::now()), SAVED_LABEL);

    settle_write(&mut hub, &rx);

    assert_eq!(hub.state().notes.indicator(Instant::now()), SAVED_LABEL);
    let clip = hub.state().collections().vod_library().find(&id).expect("clip");
    assert_eq!(clip.notes, "hold the mid");
}

#[test]
fn clip_deleted_remotely_unloads_the_reviewer() {
    let store = Arc::new(MemoryStore::new());
    let (mut hub, rx) = live_hub(store.clone());
    let id = hub.add_vod("https://youtu.be/abc123XYZ", "Clip", "valorant").expect("sent");
    settle_write(&mut hub, &rx);
    hub.load_vod(&id).expect("loaded");

    let generation = hub.state().generation;
    hub.apply(Delta::Snapshot {
        generation,
        collection: CollectionId::VodLibrary,
        documents: Vec::new(),
    });

    assert!(hub.state().vod_loaded.is_none());
    assert!(hub.state().notes.tracked().is_none());
}

#[test]
fn sign_out_discards_a_pending_notes_write() {
    let store = Arc::new(MemoryStore::new());
    let (mut hub, rx) = live_hub(store.clone());
    let id = hub.add_vod("https://youtu.be/abc123XYZ", "Clip", "valorant").expect("sent");
    settle_write(&mut hub, &rx);
    hub.load_vod(&id).expect("loaded");

    let t0 = Instant::now();
    hub.edit_vod_notes("never saved", t0);
    assert!(hub.state().notes.pending().is_some());

    store.revoke_auth();
    hub.drain(&rx);
    assert_eq!(hub.mode(), Mode::Demo);
    assert!(hub.state().notes.pending().is_none());

    hub.tick(t0 + Duration::from_millis(600));

    // No write reached the worker, so nothing comes back.
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    let stored = store.document(CollectionId::VodLibrary, &id).expect("clip stored");
    assert_eq!(stored.fields.get("notes"), Some(&Value::from("")));
    assert!(hub.state().collections().vod_library().find(&id).is_none());
}
