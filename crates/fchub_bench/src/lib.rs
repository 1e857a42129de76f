//! Benchmark utilities.

use fchub_core::{Fid, HubResult, Message, MessageBuilder, MessageFamily, SyncId};
use rand::Rng;

/// Generate random bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate random sync ids with timestamps below `max_timestamp`.
pub fn random_sync_ids(count: usize, max_timestamp: u32) -> Vec<Vec<u8>> {
    let mut rng = rand::thread_rng();
    (0..count)
        .filter_map(|_| {
            let hash: [u8; 20] = rng.gen();
            let timestamp = rng.gen_range(0..max_timestamp.max(1));
            let fid = Fid::new(rng.gen_range(1..10_000));
            SyncId::from_parts(timestamp, &hash, fid, MessageFamily::Link)
                .ok()
                .map(SyncId::into_bytes)
        })
        .collect()
}

/// Generate `count` follows from one account with increasing timestamps.
pub fn generate_links(fid: u64, count: usize) -> HubResult<Vec<Message>> {
    (0..count)
        .map(|i| {
            MessageBuilder::link_add(Fid::new(fid), "follow", Fid::new(i as u64 + 1))
                .timestamp(1_000 + i as u32)
                .build()
        })
        .collect()
}
