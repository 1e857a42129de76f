//! Property tests over a wired hub: ordering, idempotence, convergence
//! and quota invariants.

use fchub_core::{
    Fid, HubConfig, Message, MessageFamily, PruneLimits, StoreLimits, SyncId,
};
use fchub_testkit::prelude::*;
use proptest::prelude::*;
use std::cmp::Ordering;

const FIDS: [u64; 3] = [1, 2, 3];

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn order(a: &Message, b: &Message) -> Ordering {
    a.timestamp()
        .cmp(&b.timestamp())
        .then_with(|| {
            a.message_type()
                .is_remove()
                .cmp(&b.message_type().is_remove())
        })
        .then_with(|| a.hash.cmp(&b.hash))
}

fn stored(hub: &TestHub) -> Vec<Message> {
    let mut messages: Vec<_> = FIDS
        .iter()
        .flat_map(|&fid| hub.messages(fid).unwrap())
        .collect();
    messages.sort_by(|a, b| a.hash.cmp(&b.hash));
    messages
}

async fn assert_trie_matches_store(hub: &TestHub) {
    let messages = stored(hub);
    assert_eq!(hub.trie_items().await.unwrap(), messages.len() as u64);
    for message in &messages {
        let id = SyncId::from_message(message).unwrap();
        assert!(hub.trie().exists(&id).await.unwrap());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn last_write_wins_in_either_order((a, b) in conflicting_pair_strategy()) {
        runtime().block_on(async {
            let forward = TestHub::memory().await.unwrap();
            let backward = TestHub::memory().await.unwrap();
            let _ = forward.merge_all(&[a.clone(), b.clone()]).await;
            let _ = backward.merge_all(&[b.clone(), a.clone()]).await;

            let winner = if order(&a, &b) == Ordering::Greater { &a } else { &b };
            let forward_stored = stored(&forward);
            prop_assert_eq!(forward_stored.len(), 1);
            prop_assert_eq!(&forward_stored[0], winner);
            prop_assert_eq!(stored(&backward), forward_stored);
            prop_assert_eq!(
                forward.root_hash().await.unwrap(),
                backward.root_hash().await.unwrap()
            );
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn merging_twice_changes_nothing(messages in message_set_strategy(24)) {
        runtime().block_on(async {
            let hub = TestHub::memory().await.unwrap();
            let _ = hub.merge_all(&messages).await;
            let hash = hub.root_hash().await.unwrap();
            let before = stored(&hub);
            let events = hub.events().get_events(None, 10_000).unwrap().len();

            for result in hub.merge_all(&messages).await {
                prop_assert!(result.is_err());
            }
            prop_assert_eq!(hub.root_hash().await.unwrap(), hash);
            prop_assert_eq!(stored(&hub), before);
            prop_assert_eq!(hub.events().get_events(None, 10_000).unwrap().len(), events);
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn arrival_order_does_not_matter(messages in message_set_strategy(32)) {
        runtime().block_on(async {
            let forward = TestHub::memory().await.unwrap();
            let backward = TestHub::memory().await.unwrap();
            let _ = forward.merge_all(&messages).await;
            let reversed: Vec<_> = messages.iter().rev().cloned().collect();
            let _ = backward.merge_all(&reversed).await;

            prop_assert_eq!(
                forward.root_hash().await.unwrap(),
                backward.root_hash().await.unwrap()
            );
            prop_assert_eq!(stored(&forward), stored(&backward));
            assert_trie_matches_store(&forward).await;
            assert_trie_matches_store(&backward).await;
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn pruning_keeps_the_newest(
        messages in prop::collection::vec(link_message_strategy(), 1..40),
        limit in 1u64..5,
    ) {
        runtime().block_on(async {
            let limits = StoreLimits::default()
                .with(MessageFamily::Link, PruneLimits::unlimited().size_limit(limit));
            let config = TestHubConfig {
                hub: HubConfig::new().limits(limits),
                ..TestHubConfig::default()
            };
            let hub = TestHub::memory_with(config).await.unwrap();
            let _ = hub.merge_all(&messages).await;

            for fid in FIDS {
                let pruned = hub.engine().prune_messages(Fid::new(fid)).await.unwrap();
                let remaining = hub.messages(fid).unwrap();
                prop_assert!(remaining.len() as u64 <= limit);
                for kept in &remaining {
                    for evicted in &pruned {
                        prop_assert!(kept.ts_hash().unwrap() >= evicted.ts_hash().unwrap());
                    }
                }
            }
            assert_trie_matches_store(&hub).await;
            Ok::<(), TestCaseError>(())
        })?;
    }
}
