use std::sync::Arc;

use tracing::debug;

use crate::config::BUCKET_COUNT;
use crate::tracker::torrent::current_epoch;
use crate::tracker::Tracker;

/// Runs the periodic cleaner until the runtime shuts down: every
/// `cleanup_interval` seconds the whole store is aged one bucket at a
/// time.
pub async fn handle(tracker: &Arc<Tracker>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(
        tracker.config.cleanup_interval.max(1),
    ));

    loop {
        interval.tick().await;

        let removed = sweep(tracker, current_epoch());

        if removed > 0 {
            debug!(removed, "cleaner dropped empty torrents");
        }
    }
}

/// One pass over every bucket, holding one lock at a time: rotates each
/// torrent's pools and drops the torrents whose population has aged to
/// empty. Returns the number of torrents dropped.
pub fn sweep(tracker: &Tracker, now: u64) -> usize {
    let mut removed = 0;

    for index in 0..BUCKET_COUNT {
        let mut bucket = tracker.buckets.lock(index);
        let before = bucket.len();

        bucket.retain_mut(|torrent| !torrent.peers.clean(now));

        removed += before - bucket.len();
    }

    removed
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use crate::announce::add_peer;
    use crate::config::{Config, POOLS_COUNT};
    use crate::tracker::torrent::InfoHash;
    use crate::tracker::Peer;

    use super::*;

    const HASH: InfoHash = InfoHash([0x33; 20]);

    #[test]
    fn sweep_keeps_live_torrents() {
        let (tracker, _tasks) = Tracker::new(Config::default());
        let peer = Peer::new(Ipv4Addr::new(10, 0, 0, 1), 6881, 0);
        add_peer(&tracker, &HASH, peer, false).unwrap();

        let base = tracker
            .buckets
            .lock_by_hash(&HASH)
            .find(&HASH)
            .unwrap()
            .peers
            .base;

        assert_eq!(sweep(&tracker, base + 1), 0);
        assert!(tracker.buckets.lock_by_hash(&HASH).find(&HASH).is_some());
    }

    #[test]
    fn sweep_drops_torrents_that_aged_out() {
        let (tracker, _tasks) = Tracker::new(Config::default());
        let peer = Peer::new(Ipv4Addr::new(10, 0, 0, 1), 6881, 0);
        add_peer(&tracker, &HASH, peer, false).unwrap();

        let base = tracker
            .buckets
            .lock_by_hash(&HASH)
            .find(&HASH)
            .unwrap()
            .peers
            .base;

        assert_eq!(sweep(&tracker, base + POOLS_COUNT as u64), 1);
        assert!(tracker.buckets.lock_by_hash(&HASH).is_empty());
    }
}
