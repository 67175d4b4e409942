use chrono::Utc;

use crate::config::{POOLS_COUNT, POOL_ROTATION_SECS};
use crate::error::TrackerError;

use super::peer::{Peer, Pool, Removed};

pub mod infohash;
pub use infohash::InfoHash;

/// Wall clock quantized to pool-rotation units; `PeerList::base` and
/// `PeerList::clean` speak in these ticks.
pub fn current_epoch() -> u64 {
    Utc::now().timestamp().max(0) as u64 / POOL_ROTATION_SECS
}

/// One swarm: the infohash and its aging peer population. Owned by value
/// inside the bucket vector.
#[derive(Clone, Debug)]
pub struct Torrent {
    pub info_hash: InfoHash,
    pub peers: PeerList,
}

impl Torrent {
    pub fn new(info_hash: InfoHash, base: u64) -> Torrent {
        Torrent {
            info_hash,
            peers: PeerList::new(base),
        }
    }
}

/// The aging peer population of one torrent.
///
/// Peers live in `POOLS_COUNT` generations; announces land in generation 0
/// (generation 1 for sync-injected peers) and `clean` slides everything
/// toward the highest index until it falls off. The aggregate counters are
/// maintained incrementally:
/// `peer_count` is the total population, `seed_count` the seeders within
/// it, `seed_counts[pool]` the per-generation seeder share and `down_count`
/// the completed downloads ever observed.
#[derive(Clone, Debug)]
pub struct PeerList {
    pub base: u64,
    pub peer_count: usize,
    pub seed_count: usize,
    pub down_count: usize,
    pub seed_counts: [usize; POOLS_COUNT],
    pub pools: [Pool; POOLS_COUNT],
}

impl PeerList {
    pub fn new(base: u64) -> PeerList {
        PeerList {
            base,
            peer_count: 0,
            seed_count: 0,
            down_count: 0,
            seed_counts: [0; POOLS_COUNT],
            pools: Default::default(),
        }
    }

    pub fn leecher_count(&self) -> usize {
        self.peer_count - self.seed_count
    }

    /// Inserts or refreshes `peer` in `base_pool` and settles the counters.
    ///
    /// A fresh insertion evicts any stale copy of the same key from an
    /// older generation; the scan stops at the first hit because a peer
    /// lives in at most one pool. On a refresh the seeding transition is
    /// reconciled against the per-pool seeder counts, a completed download
    /// is counted once, and the stored flag survives later announces.
    pub fn insert_or_update(&mut self, peer: Peer, base_pool: usize) -> Result<(), TrackerError> {
        let mut peer = peer;
        peer.sanitize_flags();

        let key = peer.key();
        let (slot, existed) = self.pools[base_pool].find_or_insert(peer)?;

        if !existed {
            self.peer_count += 1;

            if peer.is_completed() {
                self.down_count += 1;
            }

            if peer.is_seeder() {
                self.seed_counts[base_pool] += 1;
                self.seed_count += 1;
            }

            for pool in base_pool + 1..POOLS_COUNT {
                match self.pools[pool].remove(&key, false) {
                    Removed::Absent => continue,
                    Removed::Seeder => {
                        self.seed_counts[pool] -= 1;
                        self.seed_count -= 1;
                        self.peer_count -= 1;
                        break;
                    }
                    Removed::Leecher => {
                        self.peer_count -= 1;
                        break;
                    }
                }
            }

            return Ok(());
        }

        let Some(stored) = self.pools[base_pool].get(slot).copied() else {
            return Ok(());
        };

        if stored.is_seeder() && !peer.is_seeder() {
            self.seed_counts[base_pool] -= 1;
            self.seed_count -= 1;
        }

        if !stored.is_seeder() && peer.is_seeder() {
            self.seed_counts[base_pool] += 1;
            self.seed_count += 1;
        }

        if !stored.is_completed() && peer.is_completed() {
            self.down_count += 1;
        }

        // A completed download sticks to the descriptor for its lifetime.
        if stored.is_completed() {
            peer.flags |= Peer::COMPLETED;
        }

        if let Some(dest) = self.pools[base_pool].get_mut(slot) {
            *dest = peer;
        }

        Ok(())
    }

    /// Removes the peer with `key` on a stopped announce. Generation 0
    /// keeps its order for the announce-path binary search; older
    /// generations swap-remove. Returns whether a peer was dropped.
    pub fn remove(&mut self, key: &[u8; 6]) -> bool {
        for pool in 0..POOLS_COUNT {
            match self.pools[pool].remove(key, pool == 0) {
                Removed::Absent => continue,
                Removed::Seeder => {
                    self.seed_counts[pool] -= 1;
                    self.seed_count -= 1;
                    self.peer_count -= 1;
                    return true;
                }
                Removed::Leecher => {
                    self.peer_count -= 1;
                    return true;
                }
            }
        }

        false
    }

    /// Ages the population without per-peer timers: generations older than
    /// the elapsed rotation ticks are dropped wholesale, the rest slide
    /// toward the high indices, and the list is re-based. Returns true when
    /// the population has emptied.
    pub fn clean(&mut self, now: u64) -> bool {
        let elapsed = now.saturating_sub(self.base) as usize;

        if elapsed == 0 {
            return false;
        }

        let timedout = elapsed.min(POOLS_COUNT);

        for pool in POOLS_COUNT - timedout..POOLS_COUNT {
            self.peer_count -= self.pools[pool].len();
            self.seed_count -= self.seed_counts[pool];
            self.pools[pool] = Pool::default();
            self.seed_counts[pool] = 0;
        }

        self.pools.rotate_right(timedout);
        self.seed_counts.rotate_right(timedout);
        self.base = now;

        self.peer_count == 0
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn peer(last_octet: u8, flags: u8) -> Peer {
        Peer::new(Ipv4Addr::new(10, 0, 0, last_octet), 6881, flags)
    }

    /// Checks the counter identities after any sequence of operations:
    /// the total population is the sum of the pool sizes, the seeder total
    /// is the sum of the per-pool seeder counts, no pool carries more
    /// seeders than peers, and a key appears in at most one pool.
    fn assert_consistent(list: &PeerList) {
        let pool_total: usize = list.pools.iter().map(Pool::len).sum();
        assert_eq!(list.peer_count, pool_total);

        let seed_total: usize = list.seed_counts.iter().sum();
        assert_eq!(list.seed_count, seed_total);

        for (pool, seeds) in list.pools.iter().zip(list.seed_counts) {
            assert!(seeds <= pool.len());
            assert_eq!(pool.iter().filter(|p| p.is_seeder()).count(), seeds);
        }

        let mut keys: Vec<_> = list
            .pools
            .iter()
            .flat_map(|pool| pool.iter().map(Peer::key))
            .collect();
        keys.sort_unstable();
        let total = keys.len();
        keys.dedup();
        assert_eq!(keys.len(), total);
    }

    #[test]
    fn insertion_counts_seeders_and_downloads() {
        let mut list = PeerList::new(10);

        list.insert_or_update(peer(1, Peer::SEEDING), 0).unwrap();
        list.insert_or_update(peer(2, 0), 0).unwrap();
        list.insert_or_update(peer(3, Peer::SEEDING | Peer::COMPLETED), 0)
            .unwrap();

        assert_eq!(list.peer_count, 3);
        assert_eq!(list.seed_count, 2);
        assert_eq!(list.down_count, 1);
        assert_consistent(&list);
    }

    #[test]
    fn completed_without_seeding_is_stored_bare() {
        let mut list = PeerList::new(10);

        list.insert_or_update(peer(1, Peer::COMPLETED), 0).unwrap();

        assert_eq!(list.pools[0].get(0).unwrap().flags, 0);
        assert_eq!(list.down_count, 0);
        assert_eq!(list.seed_count, 0);
        assert_consistent(&list);
    }

    #[test]
    fn repeated_announce_leaves_counters_unchanged() {
        let mut list = PeerList::new(10);

        list.insert_or_update(peer(1, Peer::SEEDING), 0).unwrap();
        let (peers, seeds, downs) = (list.peer_count, list.seed_count, list.down_count);

        list.insert_or_update(peer(1, Peer::SEEDING), 0).unwrap();

        assert_eq!(
            (list.peer_count, list.seed_count, list.down_count),
            (peers, seeds, downs)
        );
        assert_consistent(&list);
    }

    #[test]
    fn seeder_turning_leecher_adjusts_seed_counts() {
        let mut list = PeerList::new(10);

        list.insert_or_update(peer(1, Peer::SEEDING), 0).unwrap();
        list.insert_or_update(peer(1, 0), 0).unwrap();

        assert_eq!(list.peer_count, 1);
        assert_eq!(list.seed_count, 0);
        assert_consistent(&list);
    }

    #[test]
    fn fresh_completion_counts_once_and_sticks() {
        let mut list = PeerList::new(10);

        list.insert_or_update(peer(1, Peer::SEEDING), 0).unwrap();
        list.insert_or_update(peer(1, Peer::SEEDING | Peer::COMPLETED), 0)
            .unwrap();
        assert_eq!(list.down_count, 1);

        // Later announces without the flag keep the stored one.
        list.insert_or_update(peer(1, Peer::SEEDING), 0).unwrap();
        assert!(list.pools[0].get(0).unwrap().is_completed());
        assert_eq!(list.down_count, 1);
        assert_consistent(&list);
    }

    #[test]
    fn reannounce_migrates_peer_out_of_older_pool() {
        let mut list = PeerList::new(10);

        // Age a seeder into generation 2, as the cleaner would.
        list.insert_or_update(peer(1, Peer::SEEDING), 0).unwrap();
        list.clean(12);
        assert_eq!(list.pools[2].len(), 1);

        list.insert_or_update(peer(1, Peer::SEEDING), 0).unwrap();

        assert_eq!(list.pools[0].len(), 1);
        assert_eq!(list.pools[2].len(), 0);
        assert_eq!(list.peer_count, 1);
        assert_eq!(list.seed_counts[0], 1);
        assert_eq!(list.seed_counts[2], 0);
        assert_consistent(&list);
    }

    #[test]
    fn announce_then_stopped_restores_counters() {
        let mut list = PeerList::new(10);

        list.insert_or_update(peer(1, Peer::SEEDING), 0).unwrap();
        let (peers, seeds) = (list.peer_count, list.seed_count);

        list.insert_or_update(peer(9, Peer::SEEDING | Peer::COMPLETED), 0)
            .unwrap();
        assert!(list.remove(&peer(9, 0).key()));

        assert_eq!((list.peer_count, list.seed_count), (peers, seeds));
        assert_consistent(&list);
    }

    #[test]
    fn remove_finds_peers_in_older_pools() {
        let mut list = PeerList::new(10);

        list.insert_or_update(peer(1, Peer::SEEDING), 0).unwrap();
        list.clean(11);
        assert_eq!(list.pools[1].len(), 1);

        assert!(list.remove(&peer(1, 0).key()));
        assert_eq!(list.peer_count, 0);
        assert_eq!(list.seed_count, 0);
        assert_consistent(&list);
    }

    #[test]
    fn remove_of_unknown_key_is_a_noop() {
        let mut list = PeerList::new(10);

        list.insert_or_update(peer(1, 0), 0).unwrap();

        assert!(!list.remove(&peer(2, 0).key()));
        assert_eq!(list.peer_count, 1);
        assert_consistent(&list);
    }

    #[test]
    fn clean_within_the_same_tick_changes_nothing() {
        let mut list = PeerList::new(10);

        list.insert_or_update(peer(1, 0), 0).unwrap();

        assert!(!list.clean(10));
        assert_eq!(list.pools[0].len(), 1);
        assert_eq!(list.base, 10);
    }

    #[test]
    fn clean_slides_generations_and_rebases() {
        let mut list = PeerList::new(10);

        list.insert_or_update(peer(1, Peer::SEEDING), 0).unwrap();

        assert!(!list.clean(13));
        assert_eq!(list.base, 13);
        assert_eq!(list.pools[3].len(), 1);
        assert_eq!(list.seed_counts[3], 1);
        assert_eq!(list.peer_count, 1);
        assert_consistent(&list);
    }

    #[test]
    fn clean_expires_the_population_after_all_generations() {
        let mut list = PeerList::new(10);

        list.insert_or_update(peer(1, Peer::SEEDING), 0).unwrap();
        list.insert_or_update(peer(2, 0), 0).unwrap();
        let downs = list.down_count;

        assert!(list.clean(10 + POOLS_COUNT as u64));
        assert_eq!(list.peer_count, 0);
        assert_eq!(list.seed_count, 0);
        // The download tally outlives the peers.
        assert_eq!(list.down_count, downs);
        assert_consistent(&list);
    }

    #[test]
    fn sync_injected_peers_live_in_generation_one() {
        let mut list = PeerList::new(10);

        list.insert_or_update(peer(1, Peer::SEEDING), 1).unwrap();

        assert_eq!(list.pools[1].len(), 1);
        assert_eq!(list.seed_counts[1], 1);
        assert_eq!(list.peer_count, 1);
        assert_consistent(&list);
    }
}
