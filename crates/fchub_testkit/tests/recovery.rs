//! Trie recovery after a crash.
//!
//! Each test copies a running file hub's store, the state a power loss
//! would leave on disk, and checks that a hub opened over the copy agrees
//! with the stores it finds there.

use fchub_core::{Fid, MessageBuilder};
use fchub_testkit::prelude::*;

#[tokio::test]
async fn trie_is_rebuilt_when_nothing_was_flushed() {
    init_tracing();
    let hub = TestHub::file().await.unwrap();
    for i in 0..5u64 {
        hub.merge(&link_add(20, 200 + i, 100 + i as u32).unwrap())
            .await
            .unwrap();
    }
    let hash = hub.root_hash().await.unwrap();
    assert_eq!(hub.trie().checkpoint().await.unwrap().persisted, None);

    let copy = hub.open_crash_copy().await.unwrap();
    assert_eq!(copy.messages(20).unwrap().len(), 5);
    assert_eq!(copy.trie_items().await.unwrap(), 5);
    assert_eq!(copy.root_hash().await.unwrap(), hash);
    assert_eq!(
        copy.trie().checkpoint().await.unwrap().persisted,
        hub.events().last_event_id().unwrap()
    );
}

#[tokio::test]
async fn events_after_the_checkpoint_are_replayed() {
    let hub = TestHub::file().await.unwrap();
    for i in 0..3u64 {
        hub.merge(&link_add(21, 210 + i, 100 + i as u32).unwrap())
            .await
            .unwrap();
    }
    hub.trie().commit().await.unwrap();

    hub.merge(&link_add(21, 213, 103).unwrap()).await.unwrap();
    let remove = MessageBuilder::link_remove(Fid::new(21), "follow", Fid::new(210))
        .timestamp(104)
        .build()
        .unwrap();
    hub.merge(&remove).await.unwrap();
    hub.engine()
        .revoke_message(&link_add(21, 211, 101).unwrap())
        .await
        .unwrap();
    let hash = hub.root_hash().await.unwrap();

    let copy = hub.open_crash_copy().await.unwrap();
    assert_eq!(copy.trie_items().await.unwrap(), 3);
    assert_eq!(copy.root_hash().await.unwrap(), hash);
    let checkpoint = copy.trie().checkpoint().await.unwrap();
    assert_eq!(checkpoint.applied, hub.events().last_event_id().unwrap());
    assert!(!checkpoint.needs_rebuild);
}

#[tokio::test]
async fn trie_invalidated_before_the_crash_is_rebuilt() {
    let hub = TestHub::file().await.unwrap();
    hub.merge(&link_add(22, 220, 100).unwrap()).await.unwrap();
    hub.merge(&link_add(22, 221, 101).unwrap()).await.unwrap();
    hub.trie().commit().await.unwrap();
    let hash = hub.root_hash().await.unwrap();

    // Keys shorter than a timestamp prefix cannot be placed.
    assert!(hub
        .trie()
        .apply(Vec::new(), vec![b"123".to_vec()])
        .await
        .is_err());
    assert_eq!(hub.trie().checkpoint().await.unwrap().persisted, None);

    let copy = hub.open_crash_copy().await.unwrap();
    assert_eq!(copy.trie_items().await.unwrap(), 2);
    assert_eq!(copy.root_hash().await.unwrap(), hash);
    assert!(!copy.trie().checkpoint().await.unwrap().needs_rebuild);
}

#[tokio::test]
async fn clean_reopen_replays_nothing() {
    let hub = TestHub::file().await.unwrap();
    hub.merge(&link_add(23, 230, 100).unwrap()).await.unwrap();
    let last = hub.events().last_event_id().unwrap();

    let hub = hub.reopen().await.unwrap();
    assert_eq!(hub.trie().checkpoint().await.unwrap().persisted, last);
    assert_eq!(hub.sync().recover_trie().await.unwrap(), 0);
    assert_eq!(hub.trie_items().await.unwrap(), 1);
}
