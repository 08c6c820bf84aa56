use std::sync::Arc;
use std::sync::mpsc;

use sensei_hub::calendar::{IndicatorColor, build_month};
use sensei_hub::config::AppConfig;
use sensei_hub::dispatch::Tab;
use sensei_hub::entity::{CollectionId, Fields, Moment, PlayerCard, SEED_EVENT_ID};
use sensei_hub::error::SyncError;
use sensei_hub::hub::SyncHub;
use sensei_hub::memory_store::{MemoryConnector, MemoryStore};
use sensei_hub::state::AppState;
use sensei_hub::supervisor::Mode;
use sensei_hub::writer::DualModeWriter;
use serde_json::Value;

fn demo_hub() -> SyncHub {
    let (tx, _rx) = mpsc::channel();
    let mut hub = SyncHub::new(tx);
    let connector = MemoryConnector::new(Arc::new(MemoryStore::new()));
    let resolution = hub.start(&connector, &AppConfig::offline());
    assert_eq!(resolution.mode, Mode::Demo);
    hub
}

fn link_fields(platform: &str, username: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert("platform".into(), Value::from(platform));
    fields.insert("username".into(), Value::from(username));
    fields
}

#[test]
fn demo_create_update_delete_sequence_reflects_net_effect() {
    let mut state = AppState::new();
    let writer = DualModeWriter::demo();

    let a = writer
        .create(&mut state, CollectionId::SocialLinks, link_fields("Twitch", "alpha"))
        .expect("create a");
    let b = writer
        .create(&mut state, CollectionId::SocialLinks, link_fields("YouTube", "bravo"))
        .expect("create b");
    let c = writer
        .create(&mut state, CollectionId::SocialLinks, link_fields("Discord", "charlie"))
        .expect("create c");

    let mut partial = Fields::new();
    partial.insert("username".into(), Value::from("bravo-renamed"));
    writer
        .update(&mut state, CollectionId::SocialLinks, &b, partial)
        .expect("update b");
    writer
        .delete(&mut state, CollectionId::SocialLinks, &a)
        .expect("delete a");
    // Unknown ids are ignored rather than creating anything.
    writer
        .delete(&mut state, CollectionId::SocialLinks, "missing")
        .expect("delete missing");

    let links = state.collections().social_links().get_all();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].id, b);
    assert_eq!(links[0].username, "bravo-renamed");
    assert_eq!(links[0].platform, "YouTube");
    assert_eq!(links[1].id, c);
    assert_eq!(links[1].username, "charlie");
}

#[test]
fn demo_ids_are_prefixed_and_unique() {
    let mut state = AppState::new();
    let writer = DualModeWriter::demo();

    let ids: Vec<String> = (0..50)
        .map(|i| {
            writer
                .create(&mut state, CollectionId::SocialLinks, link_fields("Twitch", &format!("u{i}")))
                .expect("create")
        })
        .collect();

    assert!(ids.iter().all(|id| id.starts_with("demo-")));
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());
    assert_eq!(state.collections().social_links().len(), 50);
}

#[test]
fn demo_create_stamps_a_sortable_moment() {
    let mut state = AppState::new();
    let writer = DualModeWriter::demo();
    let before = Moment::now();

    let id = writer
        .create(&mut state, CollectionId::SocialLinks, link_fields("Twitch", "alpha"))
        .expect("create");

    let link = state.collections().social_links().find(&id).expect("link");
    let stamped = link.created_at.expect("createdAt stamped");
    assert!(stamped >= Moment::from_millis(before.millis() - 1000));
}

#[test]
fn demo_writes_redraw_only_the_dependent_tab() {
    let mut state = AppState::new();
    state.tab = Tab::Tracker;
    let writer = DualModeWriter::demo();
    state.refresh.take_redraw();

    writer
        .create(&mut state, CollectionId::SocialLinks, link_fields("Twitch", "alpha"))
        .expect("create");
    assert!(!state.refresh.is_dirty());
    assert_eq!(state.refresh.skipped_count(), 1);

    state.tab = Tab::Profile;
    writer
        .create(&mut state, CollectionId::SocialLinks, link_fields("Twitch", "beta"))
        .expect("create");
    assert!(state.refresh.take_redraw());
    assert_eq!(state.refresh.redraw_count(), 1);
}

#[test]
fn adding_a_training_event_shows_one_blue_indicator_on_its_day() {
    let mut hub = demo_hub();

    hub.add_event("Scrim", "2025-12-01", "training")
        .expect("event accepted");

    let month = build_month(2025, 12, hub.state().collections().events().get_all());
    let day = month.day(1).expect("Dec 1");
    assert_eq!(day.indicators, vec![IndicatorColor::Blue]);
    assert_eq!(day.titles, vec!["Scrim".to_string()]);
    // 2025-12-01 is a Monday.
    assert_eq!(month.leading_blanks, 1);
    assert!(month.days.iter().filter(|d| d.day != 1).all(|d| d.indicators.is_empty()));
}

#[test]
fn seed_event_is_present_in_demo_and_shows_on_the_calendar() {
    let hub = demo_hub();

    let events = hub.state().collections().events();
    assert_eq!(events.len(), 1);
    assert_eq!(events.get_all()[0].id, SEED_EVENT_ID);

    let month = build_month(2025, 11, events.get_all());
    assert_eq!(month.day(17).expect("Nov 17").indicators, vec![IndicatorColor::Red]);
}

#[test]
fn invalid_event_input_is_rejected_before_any_write() {
    let mut hub = demo_hub();

    let blank = hub.add_event("   ", "2025-12-01", "training");
    let bad_date = hub.add_event("Scrim", "12/01/2025", "training");

    assert!(matches!(blank, Err(SyncError::Validation(_))));
    assert!(matches!(bad_date, Err(SyncError::Validation(_))));
    assert_eq!(hub.state().collections().events().len(), 1);
    assert!(hub.state().logs.iter().any(|l| l.starts_with("[WARN]")));
}

#[test]
fn finishing_a_session_logs_one_entry_and_clears_the_live_session() {
    let mut hub = demo_hub();

    hub.start_session("rocketLeague", "Ranked 2v2").expect("session starts");
    assert!(hub.add_quick_note("rotate back post"));
    assert!(hub.add_quick_note("too many double commits"));
    assert!(!hub.add_quick_note("   "));
    for _ in 0..5 {
        hub.record_win();
    }
    for _ in 0..3 {
        hub.record_loss();
    }
    hub.undo_loss();

    let id = hub.finish_session().expect("session saved");

    assert!(hub.state().live_session.is_none());
    let log = hub.state().collections().performance_log().get_all();
    assert_eq!(log.len(), 1);
    let entry = &log[0];
    assert_eq!(entry.id, id);
    assert_eq!(entry.game, "rocketLeague");
    assert_eq!(entry.mode, "Ranked 2v2");
    assert_eq!((entry.wins, entry.losses), (5, 2));
    assert_eq!(entry.notes.len(), 2);
    assert_eq!(entry.notes[0].text, "rotate back post");
    assert!(entry.finished_at.is_some());
}

#[test]
fn session_actions_require_a_running_session() {
    let mut hub = demo_hub();

    hub.record_win();
    assert!(!hub.add_quick_note("nothing running"));
    assert!(matches!(hub.finish_session(), Err(SyncError::Validation(_))));

    hub.start_session("fortnite", "Zero Build").expect("start");
    assert!(matches!(
        hub.start_session("fortnite", "Zero Build"),
        Err(SyncError::Validation(_))
    ));
    hub.discard_session();
    assert!(hub.state().live_session.is_none());
    assert!(hub.state().collections().performance_log().is_empty());
}

#[test]
fn auto_tracker_needs_a_rocket_league_username() {
    let mut hub = demo_hub();

    assert!(matches!(hub.simulate_auto_session(), Err(SyncError::Validation(_))));

    hub.set_game_account("rocketLeague", "SenseiRL").expect("account saved");
    hub.simulate_auto_session().expect("auto session");

    let log = hub.state().collections().performance_log().get_all();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].mode, "Ranked (Auto-Tracked)");
    assert!((3..=7).contains(&log[0].wins));
    assert!((1..=4).contains(&log[0].losses));
    assert!(log[0].notes[0].text.contains("SenseiRL"));
}

#[test]
fn profile_edits_overwrite_the_local_profile() {
    let mut hub = demo_hub();

    hub.set_game_account("fortnite", "Builder99").expect("account");
    hub.set_player_card(
        "fortnite",
        PlayerCard {
            role: "IGL".into(),
            style: "Aggressive".into(),
            availability: "Weeknights".into(),
        },
    )
    .expect("card");
    hub.set_game_account("fortnite", "").expect("unlink");

    let profile = hub.state().collections().profile();
    assert_eq!(profile.account_for("fortnite"), None);
    assert_eq!(profile.player_card["fortnite"].role, "IGL");
}

#[test]
fn social_links_can_be_added_and_unlinked() {
    let mut hub = demo_hub();

    assert!(matches!(
        hub.add_social_link("Twitch", " "),
        Err(SyncError::Validation(_))
    ));
    let id = hub.add_social_link("Twitch", "sensei_live").expect("link");
    assert_eq!(hub.state().collections().social_links().len(), 1);

    hub.unlink_social(&id).expect("unlink");
    assert!(hub.state().collections().social_links().is_empty());
}

#[test]
fn deleting_the_loaded_clip_clears_the_reviewer() {
    let mut hub = demo_hub();
    let id = hub
        .add_vod("https://youtu.be/abc123XYZ", "Overtime loss", "rocketLeague")
        .expect("clip");
    hub.load_vod(&id).expect("load");
    assert_eq!(hub.state().loaded_clip().map(|c| c.embed_url.as_str()), Some("https://www.youtube.com/embed/abc123XYZ"));

    hub.delete_vod(&id).expect("delete");

    assert!(hub.state().vod_loaded.is_none());
    assert!(hub.state().notes.tracked().is_none());
    assert!(hub.state().collections().vod_library().is_empty());
}

#[test]
fn malformed_clip_urls_are_rejected() {
    let mut hub = demo_hub();

    let err = hub
        .add_vod("https://vimeo.com/12345", "Not YouTube", "fortnite")
        .unwrap_err();

    assert!(matches!(err, SyncError::Validation(_)));
    assert!(hub.state().collections().vod_library().is_empty());
}

#[test]
fn change_listeners_see_every_demo_change() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut hub = demo_hub();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    hub.on_change(move |collection, state| {
        sink.borrow_mut().push((collection, state.collections().len(collection)));
    });

    hub.add_social_link("Twitch", "alpha").expect("link");
    hub.add_event("Scrim", "2025-12-01", "training").expect("event");

    assert_eq!(
        *seen.borrow(),
        vec![(CollectionId::SocialLinks, 1), (CollectionId::Events, 2)]
    );
}
