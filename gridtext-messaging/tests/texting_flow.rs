//! End-to-end scenarios for the texting core: sending, thread reuse,
//! read state, per-number deletion, and on-disk persistence.

use std::sync::Arc;

use gridtext_messaging::{ManualClock, MessageStore, MessagingError, PhoneNumber};

fn open_store() -> (MessageStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(10_000));
    let store = MessageStore::open_in_memory(clock.clone()).expect("in-memory store");
    (store, clock)
}

#[test]
fn reply_lands_in_the_same_thread_and_listing_shows_newest() {
    let (store, clock) = open_store();

    let hi = store.send("555-0001", &["555-0002"], "hi").unwrap();
    clock.advance(60);
    let hey = store.send("555-0002", &["5550001"], "hey").unwrap();

    assert_eq!(hi.thread_id, hey.thread_id);

    for viewer in ["555-0001", "555-0002"] {
        let threads = store.get_threads_for(viewer).unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[&hi.thread_id].content, "hey");
    }
}

#[test]
fn sending_flips_read_state_for_the_other_side() {
    let (store, _clock) = open_store();

    let text = store.send("555-0001", &["555-0002"], "ping").unwrap();
    assert!(store.has_read(text.thread_id, "555-0001").unwrap());
    assert!(!store.has_read(text.thread_id, "555-0002").unwrap());

    store.mark_read(text.thread_id, "555-0002").unwrap();
    assert!(store.has_read(text.thread_id, "555-0002").unwrap());

    // replying catches the replier up and puts the original sender behind
    store.send("555-0002", &["555-0001"], "pong").unwrap();
    assert!(store.has_read(text.thread_id, "555-0002").unwrap());
    assert!(!store.has_read(text.thread_id, "555-0001").unwrap());
}

#[test]
fn read_state_never_creates_numbers() {
    let (store, _clock) = open_store();
    let text = store.send("555-0001", &["555-0002"], "hello").unwrap();

    let err = store.mark_unread(text.thread_id, "999-9999").unwrap_err();
    assert!(matches!(err, MessagingError::UnknownNumber(ref n) if n == "999-9999"));

    // the failed call must not have registered the number
    let err = store.mark_read(text.thread_id, "999-9999").unwrap_err();
    assert!(matches!(err, MessagingError::UnknownNumber(_)));
}

#[test]
fn hiding_a_text_only_affects_one_number() {
    let (store, clock) = open_store();

    let first = store.send("555-0001", &["555-0002"], "keep this").unwrap();
    clock.advance(30);
    let second = store.send("555-0002", &["555-0001"], "hide this").unwrap();

    store.hide_text(second.id, "555-0001").unwrap();

    let mine = store.get_texts_for("555-0001").unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, first.id);
    assert_eq!(store.count_texts_for("555-0001").unwrap(), 1);

    let theirs = store.get_texts_for("555-0002").unwrap();
    assert_eq!(theirs.len(), 2);

    // the thread listing still surfaces the hidden text as newest
    let threads = store.get_threads_for("555-0001").unwrap();
    assert_eq!(threads[&first.thread_id].id, second.id);
}

#[test]
fn group_and_pair_conversations_stay_separate() {
    let (store, clock) = open_store();

    let group = store
        .send("555-0001", &["555-0002", "555-0003"], "everyone here?")
        .unwrap();
    clock.advance(10);
    let pair = store.send("555-0001", &["555-0002"], "just you").unwrap();

    assert_ne!(group.thread_id, pair.thread_id);
    assert_eq!(store.get_threads_for("555-0001").unwrap().len(), 2);
    assert_eq!(store.get_threads_for("555-0002").unwrap().len(), 2);
    assert_eq!(store.get_threads_for("555-0003").unwrap().len(), 1);

    // the group text reaches both recipients
    assert_eq!(
        group.recipients,
        vec![
            PhoneNumber::parse("555-0002").unwrap(),
            PhoneNumber::parse("555-0003").unwrap(),
        ]
    );
}

#[test]
fn message_age_follows_the_game_clock() {
    let (store, clock) = open_store();

    let text = store.send("555-0001", &["555-0002"], "old news").unwrap();
    clock.advance(3_660);

    assert_eq!(text.sent_ago(store.game_now()), "1 hour, 1 minute ago");
}

#[test]
fn store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("texts.db");

    let thread_id = {
        let clock = Arc::new(ManualClock::new(500));
        let store = MessageStore::open(&path, clock).unwrap();
        let text = store.send("555-0001", &["555-0002"], "durable").unwrap();
        store.mark_read(text.thread_id, "555-0002").unwrap();
        text.thread_id
    };

    let clock = Arc::new(ManualClock::new(600));
    let store = MessageStore::open(&path, clock).unwrap();

    let threads = store.get_threads_for("555-0002").unwrap();
    assert_eq!(threads[&thread_id].content, "durable");
    assert!(store.has_read(thread_id, "555-0002").unwrap());

    let thread = store.get_thread(thread_id).unwrap();
    assert_eq!(thread.display_name(), "555-0001, 555-0002");
}
