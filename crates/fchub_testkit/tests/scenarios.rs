//! End-to-end hub scenarios.

use fchub_core::{
    farcaster_time, Fid, HubConfig, HubEventType, MessageBuilder, MessageEngine, MessageFamily,
    PruneLimits, StoreLimits, SyncId,
};
use fchub_testkit::prelude::*;
use std::sync::Arc;
use tokio::sync::broadcast::error::TryRecvError;

#[tokio::test]
async fn empty_hub_catches_up_through_sync() {
    init_tracing();
    let a = TestHub::memory().await.unwrap();
    let b = TestHub::memory().await.unwrap();
    a.merge(&link_add(1, 10, 100).unwrap()).await.unwrap();
    a.merge(&link_add(1, 11, 105).unwrap()).await.unwrap();

    let snapshot = a.sync().get_snapshot_by_prefix(&[]).await.unwrap();
    assert!(b.sync().should_sync(&snapshot).await.unwrap());

    let result = b.sync().perform_sync(&snapshot, &a.peer()).await.unwrap();
    assert_eq!(result.merged, 2);
    assert_eq!(b.root_hash().await.unwrap(), a.root_hash().await.unwrap());
    assert_eq!(b.messages(1).unwrap().len(), 2);
}

#[tokio::test]
async fn revoking_a_signer_removes_its_messages_once() {
    init_tracing();
    let hub = TestHub::memory().await.unwrap();
    let custody = signer_key(0xc0);
    let app = signer_key(0x5a);
    let mut events = hub.events().subscribe();

    hub.merge(&signer_add(1, &app, &custody, 100).unwrap())
        .await
        .unwrap();
    assert_eq!(hub.trie_items().await.unwrap(), 1);

    let revoked = hub
        .engine()
        .revoke_messages_by_signer(Fid::new(1), &custody)
        .await
        .unwrap();
    assert_eq!(revoked.len(), 1);
    assert!(hub
        .engine()
        .signer_store()
        .get_signer_adds_by_fid(Fid::new(1))
        .unwrap()
        .is_empty());
    assert_eq!(hub.trie_items().await.unwrap(), 0);

    let mut revokes = 0;
    loop {
        match events.try_recv() {
            Ok(event) if event.event_type() == HubEventType::RevokeMessage => revokes += 1,
            Ok(_) => {}
            Err(TryRecvError::Empty) => break,
            Err(e) => panic!("unexpected receive error: {e}"),
        }
    }
    assert_eq!(revokes, 1);
}

#[tokio::test]
async fn removing_a_signer_revokes_what_it_signed() {
    let hub = TestHub::memory().await.unwrap();
    let custody = signer_key(0xc0);
    let app = signer_key(0x5a);

    hub.merge(&signer_add(2, &app, &custody, 100).unwrap())
        .await
        .unwrap();
    let follow = MessageBuilder::link_add(Fid::new(2), "follow", Fid::new(9))
        .signer(&app)
        .timestamp(110)
        .build()
        .unwrap();
    hub.merge(&follow).await.unwrap();
    hub.merge(&display_name(2, "alice", 111).unwrap())
        .await
        .unwrap();

    hub.merge(&signer_remove(2, &app, &custody, 120).unwrap())
        .await
        .unwrap();

    let remaining = hub.messages(2).unwrap();
    assert!(remaining.iter().all(|m| m.signer != app));
    assert!(remaining
        .iter()
        .any(|m| m.family() == MessageFamily::UserData));
    assert!(remaining
        .iter()
        .any(|m| m.family() == MessageFamily::Signer));
    assert_eq!(hub.trie_items().await.unwrap(), remaining.len() as u64);
}

#[tokio::test]
async fn higher_hash_wins_a_timestamp_tie() {
    let low = MessageBuilder::link_add(Fid::new(1), "follow", Fid::new(2))
        .timestamp(100)
        .hash(&[0x01; 20])
        .build()
        .unwrap();
    let high = MessageBuilder::link_add(Fid::new(1), "follow", Fid::new(2))
        .timestamp(100)
        .hash(&[0x02; 20])
        .build()
        .unwrap();

    let forward = TestHub::memory().await.unwrap();
    forward.engine().link_store().merge(&low).await.unwrap();
    forward.engine().link_store().merge(&high).await.unwrap();

    let backward = TestHub::memory().await.unwrap();
    backward.engine().link_store().merge(&high).await.unwrap();
    let error = backward.engine().link_store().merge(&low).await.unwrap_err();
    assert_eq!(error.code(), "bad_request.conflict");

    for hub in [&forward, &backward] {
        let stored = hub
            .engine()
            .link_store()
            .get_link_add(Fid::new(1), "follow", Fid::new(2))
            .unwrap();
        assert_eq!(stored.hash, vec![0x02; 20]);
        assert_eq!(hub.trie_items().await.unwrap(), 1);
    }
    assert_eq!(
        forward.root_hash().await.unwrap(),
        backward.root_hash().await.unwrap()
    );
}

#[tokio::test]
async fn pruning_updates_the_trie() {
    let limits = StoreLimits::default()
        .with(MessageFamily::Link, PruneLimits::unlimited().size_limit(2));
    let hub = TestHub::memory_with(TestHubConfig {
        hub: HubConfig::new().limits(limits),
        ..TestHubConfig::default()
    })
    .await
    .unwrap();

    for (i, timestamp) in [100, 200, 300, 400].into_iter().enumerate() {
        hub.merge(&link_add(3, 30 + i as u64, timestamp).unwrap())
            .await
            .unwrap();
    }
    assert_eq!(hub.trie_items().await.unwrap(), 4);

    let old = link_add(3, 99, 50).unwrap();
    let error = hub.merge(&old).await.unwrap_err();
    assert_eq!(error.code(), "bad_request.prunable");

    let pruned = hub.engine().prune_messages(Fid::new(3)).await.unwrap();
    let timestamps: Vec<_> = pruned.iter().map(|m| m.timestamp()).collect();
    assert_eq!(timestamps, vec![100, 200]);
    assert_eq!(hub.trie_items().await.unwrap(), 2);
}

#[tokio::test]
async fn pruning_by_age_updates_the_trie() {
    let hub = TestHub::memory().await.unwrap();
    let now = farcaster_time().unwrap();
    let old = [link_add(6, 60, now - 7_200).unwrap(), link_add(6, 61, now - 3_600).unwrap()];
    let fresh = [link_add(6, 62, now - 30).unwrap(), link_add(6, 63, now).unwrap()];
    for message in old.iter().chain(&fresh) {
        hub.merge(message).await.unwrap();
    }
    assert_eq!(hub.trie_items().await.unwrap(), 4);

    let limits = StoreLimits::unlimited()
        .with(MessageFamily::Link, PruneLimits::unlimited().time_limit(600));
    let aged = MessageEngine::with_quota(Arc::clone(hub.events()), &limits, &HubConfig::default());
    let pruned = aged.prune_messages(Fid::new(6)).await.unwrap();
    assert_eq!(pruned, old.to_vec());

    assert_eq!(hub.messages(6).unwrap(), fresh.to_vec());
    assert_eq!(hub.trie_items().await.unwrap(), 2);
    for message in &old {
        let id = SyncId::from_message(message).unwrap();
        assert!(!hub.trie().exists(&id).await.unwrap());
    }
    for message in &fresh {
        let id = SyncId::from_message(message).unwrap();
        assert!(hub.trie().exists(&id).await.unwrap());
    }
}

#[tokio::test]
async fn file_hub_survives_reopen() {
    let hub = TestHub::file().await.unwrap();
    let mut last_event = 0;
    for i in 0..5u64 {
        last_event = hub.merge(&link_add(4, 40 + i, 100 + i as u32).unwrap())
            .await
            .unwrap();
    }
    let hash = hub.root_hash().await.unwrap();

    let hub = hub.reopen().await.unwrap();
    assert_eq!(hub.root_hash().await.unwrap(), hash);
    assert_eq!(hub.trie_items().await.unwrap(), 5);
    assert_eq!(hub.messages(4).unwrap().len(), 5);

    let next = hub.merge(&link_add(4, 50, 200).unwrap()).await.unwrap();
    assert!(next > last_event);
    assert_eq!(hub.events().get_event(last_event).unwrap().id, last_event);
}

#[tokio::test]
async fn unreachable_peer_leaves_state_alone() {
    let a = TestHub::memory().await.unwrap();
    let b = TestHub::memory().await.unwrap();
    a.merge(&display_name(5, "bob", 100).unwrap()).await.unwrap();

    let peer = a.peer();
    peer.set_reachable(false);
    let error = b.sync().sync_with_peer(&peer).await.unwrap_err();
    assert!(error.is_retryable());
    assert_eq!(b.trie_items().await.unwrap(), 0);
    assert!(!b.sync().is_syncing());
}
