use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use sensei_hub::config::AppConfig;
use sensei_hub::debounce::{DebouncedFieldSync, IDLE_LABEL, SAVED_LABEL};
use sensei_hub::dispatch::Tab;
use sensei_hub::hub::SyncHub;
use sensei_hub::memory_store::{MemoryConnector, MemoryStore};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn demo_hub_with_clip() -> (SyncHub, String) {
    let (tx, _rx) = mpsc::channel();
    let mut hub = SyncHub::new(tx);
    let connector = MemoryConnector::new(Arc::new(MemoryStore::new()));
    hub.start(&connector, &AppConfig::offline());
    let id = hub
        .add_vod(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "Grand final game 7",
            "rocketLeague",
        )
        .expect("clip added");
    hub.load_vod(&id).expect("clip loaded");
    (hub, id)
}

#[test]
fn burst_of_edits_collapses_into_one_write_with_the_last_value() {
    let t0 = Instant::now();
    let mut notes = DebouncedFieldSync::notes();
    notes.track(Some("clip-1".to_string()));

    assert!(notes.on_edit("g", t0));
    assert!(notes.on_edit("go", t0 + ms(100)));
    assert!(notes.on_edit("goo", t0 + ms(200)));
    assert!(notes.poll(t0 + ms(550)).is_none());
    assert!(notes.on_edit("good rotation", t0 + ms(600)));

    // The edit at 600 restarted the window.
    assert!(notes.poll(t0 + ms(700)).is_none());
    assert!(notes.poll(t0 + ms(1099)).is_none());
    let write = notes.poll(t0 + ms(1100)).expect("write due at 1100");
    assert_eq!(write.entity_id, "clip-1");
    assert_eq!(write.field, "notes");
    assert_eq!(write.value, "good rotation");

    assert!(notes.poll(t0 + ms(5000)).is_none());
}

#[test]
fn edits_without_a_loaded_clip_are_ignored() {
    let mut notes = DebouncedFieldSync::notes();

    assert!(!notes.on_edit("nothing loaded", Instant::now()));
    assert!(notes.pending().is_none());
    assert_eq!(notes.next_deadline(), None);
}

#[test]
fn switching_clips_cancels_the_pending_write() {
    let t0 = Instant::now();
    let mut notes = DebouncedFieldSync::notes();
    notes.track(Some("clip-1".to_string()));
    notes.on_edit("half typed", t0);

    notes.track(Some("clip-2".to_string()));

    assert!(notes.pending().is_none());
    assert!(notes.poll(t0 + ms(2000)).is_none());
    assert_eq!(notes.tracked(), Some("clip-2"));
}

#[test]
fn retracking_the_same_clip_keeps_the_pending_write() {
    let t0 = Instant::now();
    let mut notes = DebouncedFieldSync::notes();
    notes.track(Some("clip-1".to_string()));
    notes.on_edit("keep me", t0);

    notes.track(Some("clip-1".to_string()));

    assert_eq!(notes.pending().map(|p| p.value.as_str()), Some("keep me"));
    assert_eq!(notes.next_deadline(), Some(t0 + ms(500)));
}

#[test]
fn saved_indicator_holds_then_reverts() {
    let t0 = Instant::now();
    let mut notes = DebouncedFieldSync::notes();
    assert_eq!(notes.indicator(t0), IDLE_LABEL);

    notes.mark_saved(t0);

    assert_eq!(notes.indicator(t0 + ms(1000)), SAVED_LABEL);
    assert!(!notes.expire_indicator(t0 + ms(1499)));
    assert_eq!(notes.indicator(t0 + ms(1500)), IDLE_LABEL);
    assert!(notes.expire_indicator(t0 + ms(1500)));
    assert!(!notes.expire_indicator(t0 + ms(1600)));
}

#[test]
fn hub_tick_writes_notes_once_the_window_elapses_in_demo() {
    let (mut hub, id) = demo_hub_with_clip();
    let t0 = Instant::now();

    assert!(hub.edit_vod_notes("watch the", t0));
    assert!(hub.edit_vod_notes("watch the boost", t0 + ms(300)));
    hub.tick(t0 + ms(600));
    let clip = hub.state().collections().vod_library().find(&id).expect("clip");
    assert_eq!(clip.notes, "");

    hub.tick(t0 + ms(800));

    let clip = hub.state().collections().vod_library().find(&id).expect("clip");
    assert_eq!(clip.notes, "watch the boost");
    assert_eq!(hub.state().notes.indicator(t0 + ms(900)), SAVED_LABEL);
    assert_eq!(hub.state().notes.indicator(t0 + ms(2300)), IDLE_LABEL);
}

#[test]
fn indicator_expiry_redraws_only_on_the_vod_tab() {
    let (mut hub, _id) = demo_hub_with_clip();
    let t0 = Instant::now();
    hub.navigate(Tab::Vod);
    hub.edit_vod_notes("x", t0);
    hub.tick(t0 + ms(500));
    hub.take_redraw();

    hub.tick(t0 + ms(2000));
    assert!(hub.take_redraw());

    hub.navigate(Tab::Calendar);
    hub.take_redraw();
    hub.edit_vod_notes("y", t0 + ms(2100));
    hub.tick(t0 + ms(2600));
    hub.take_redraw();
    hub.tick(t0 + ms(4200));
    assert!(!hub.take_redraw());
}

#[test]
fn deleting_the_loaded_clip_drops_its_pending_notes() {
    let (mut hub, id) = demo_hub_with_clip();
    let t0 = Instant::now();
    hub.edit_vod_notes("about to vanish", t0);

    hub.delete_vod(&id).expect("deleted");
    hub.tick(t0 + ms(1000));

    assert!(hub.state().notes.pending().is_none());
    assert!(hub.state().collections().vod_library().find(&id).is_none());
    assert!(!hub.state().logs.iter().any(|l| l.contains("Error saving notes")));
}

#[test]
fn loading_another_clip_before_the_window_cancels_the_write() {
    let (mut hub, first) = demo_hub_with_clip();
    let second = hub
        .add_vod("https://youtu.be/abcDEF12345", "Second clip", "fortnite")
        .expect("second clip");
    let t0 = Instant::now();
    hub.edit_vod_notes("for the first clip", t0);

    hub.load_vod(&second).expect("switch");
    hub.tick(t0 + ms(1000));

    let first_clip = hub.state().collections().vod_library().find(&first).expect("first");
    assert_eq!(first_clip.notes, "");
    assert_eq!(hub.state().notes.tracked(), Some(second.as_str()));
}
