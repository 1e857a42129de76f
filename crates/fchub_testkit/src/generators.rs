//! Property-based test generators using proptest.
//!
//! Generated messages are well formed and use families without a time
//! limit, so any timestamp is accepted by the default quotas.

use fchub_core::{Fid, Message, MessageBuilder, UserDataType};
use proptest::prelude::*;

/// Strategy for small account ids, so that messages collide often.
pub fn fid_strategy() -> impl Strategy<Value = u64> {
    1u64..=3
}

/// Strategy for farcaster timestamps.
pub fn timestamp_strategy() -> impl Strategy<Value = u32> {
    1u32..50_000
}

fn build_link(fid: u64, target: u64, timestamp: u32, remove: bool) -> Option<Message> {
    let builder = if remove {
        MessageBuilder::link_remove(Fid::new(fid), "follow", Fid::new(target))
    } else {
        MessageBuilder::link_add(Fid::new(fid), "follow", Fid::new(target))
    };
    builder.timestamp(timestamp).build().ok()
}

/// Strategy for follow and unfollow messages over a small target set.
pub fn link_message_strategy() -> impl Strategy<Value = Message> {
    (fid_strategy(), 1u64..=4, timestamp_strategy(), any::<bool>())
        .prop_filter_map("link message builds", |(fid, target, timestamp, remove)| {
            build_link(fid, target, timestamp, remove)
        })
}

/// Strategy for user data updates over a small field set.
pub fn user_data_strategy() -> impl Strategy<Value = Message> {
    let data_type = prop_oneof![
        Just(UserDataType::Pfp),
        Just(UserDataType::Display),
        Just(UserDataType::Bio),
        Just(UserDataType::Url),
    ];
    (
        fid_strategy(),
        data_type,
        "[a-z]{1,12}",
        timestamp_strategy(),
    )
        .prop_filter_map("user data message builds", |(fid, data_type, value, timestamp)| {
            MessageBuilder::user_data_add(Fid::new(fid), data_type, value)
                .timestamp(timestamp)
                .build()
                .ok()
        })
}

/// Strategy for any generated message.
pub fn message_strategy() -> impl Strategy<Value = Message> {
    prop_oneof![3 => link_message_strategy(), 1 => user_data_strategy()]
}

/// Strategy for message sequences of up to `max_len` messages.
pub fn message_set_strategy(max_len: usize) -> impl Strategy<Value = Vec<Message>> {
    prop::collection::vec(message_strategy(), 1..=max_len.max(1))
}

/// Strategy for two distinct link messages on the same follow, so that
/// exactly one of them can survive.
pub fn conflicting_pair_strategy() -> impl Strategy<Value = (Message, Message)> {
    (
        fid_strategy(),
        1u64..=4,
        (1u32..100, any::<bool>()),
        (1u32..100, any::<bool>()),
    )
        .prop_filter_map(
            "distinct conflicting pair",
            |(fid, target, (ts_a, remove_a), (ts_b, remove_b))| {
                let a = build_link(fid, target, ts_a, remove_a)?;
                let b = build_link(fid, target, ts_b, remove_b)?;
                (a.hash != b.hash).then_some((a, b))
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn generated_pairs_share_a_follow() {
        let mut runner = TestRunner::default();
        for _ in 0..32 {
            let (a, b) = conflicting_pair_strategy()
                .new_tree(&mut runner)
                .unwrap()
                .current();
            assert_eq!(a.fid(), b.fid());
            assert_ne!(a.hash, b.hash);
        }
    }

    proptest! {
        #[test]
        fn generated_messages_are_well_formed(message in message_strategy()) {
            prop_assert_eq!(message.hash.len(), 20);
            prop_assert!(message.timestamp() > 0);
        }
    }
}
