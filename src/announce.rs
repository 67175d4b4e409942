use std::fmt::Display;
use std::str::FromStr;

use anyhow::bail;
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::config::POOLS_COUNT;
use crate::error::TrackerError;
use crate::tracker::torrent::{current_epoch, InfoHash, PeerList};
use crate::tracker::{Peer, Tracker};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Event {
    Completed,
    #[default]
    Empty,
    Started,
    Stopped,
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Empty => write!(f, ""),
            Self::Started => write!(f, "started"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

impl FromStr for Event {
    type Err = anyhow::Error;

    fn from_str(event: &str) -> Result<Self, Self::Err> {
        match event {
            "" | "empty" | "paused" => Ok(Self::Empty),
            "completed" => Ok(Self::Completed),
            "started" => Ok(Self::Started),
            "stopped" => Ok(Self::Stopped),
            _ => bail!("unsupported announce event `{event}`"),
        }
    }
}

/// Which wire format the reply is encoded for. TCP replies are bencoded;
/// UDP replies are the raw words appended after the header the wire layer
/// owns.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Protocol {
    Tcp,
    Udp,
}

/// One decoded announce, as handed over by the wire parsers.
pub struct AnnounceRequest {
    pub info_hash: InfoHash,
    pub peer: Peer,
    pub event: Event,
    pub numwant: usize,
    pub protocol: Protocol,
}

/// Handles one announce: mutates the peer store and returns the complete
/// reply payload for the requested protocol.
pub fn handle(tracker: &Tracker, request: &AnnounceRequest) -> Result<Vec<u8>, TrackerError> {
    let mut rng = SmallRng::from_entropy();

    if request.event == Event::Stopped {
        return Ok(remove_peer(
            tracker,
            &request.info_hash,
            &request.peer,
            request.protocol,
            &mut rng,
        ));
    }

    let mut peer = request.peer;
    if request.event == Event::Completed {
        peer.flags |= Peer::COMPLETED;
    }

    add_peer(tracker, &request.info_hash, peer, false)?;

    Ok(peers_for_torrent(
        tracker,
        &request.info_hash,
        request.numwant,
        request.protocol,
        &mut rng,
    ))
}

/// Registers `peer` under `info_hash`, creating the torrent on first
/// contact and aging an existing population first. Sync-injected peers
/// land in generation 1 so they do not displace the live generation, and
/// are dropped silently when the live generation already knows the key.
pub fn add_peer(
    tracker: &Tracker,
    info_hash: &InfoHash,
    peer: Peer,
    from_sync: bool,
) -> Result<(), TrackerError> {
    let accesslist = tracker.accesslist();
    let now = current_epoch();
    let mut bucket = tracker.buckets.lock_by_hash(info_hash);

    if !accesslist.is_admitted(info_hash) {
        return Err(TrackerError::Rejected);
    }

    let (torrent, existed) = bucket.find_or_insert(*info_hash, now)?;

    if existed {
        torrent.peers.clean(now);
    }

    let mut base_pool = 0;
    if from_sync {
        if torrent.peers.pools[0].find(&peer.key()).is_some() {
            return Ok(());
        }

        base_pool = 1;
    }

    torrent.peers.insert_or_update(peer, base_pool)
}

/// Builds the announce reply for `info_hash`: the counters header plus up
/// to `amount` randomly sampled peers. An unknown torrent answers with the
/// zero-peer synthetic reply so downstream parsers never see an absent
/// torrent.
pub fn peers_for_torrent(
    tracker: &Tracker,
    info_hash: &InfoHash,
    amount: usize,
    protocol: Protocol,
    rng: &mut impl Rng,
) -> Vec<u8> {
    let interval = request_interval(tracker.config.announce_interval, rng);
    let bucket = tracker.buckets.lock_by_hash(info_hash);

    let Some(torrent) = bucket.find(info_hash) else {
        return counts_only_reply(protocol, interval, 0, 0);
    };

    let peers = &torrent.peers;
    let amount = amount.min(peers.peer_count);

    let mut reply = Vec::with_capacity(96 + 6 * amount);

    match protocol {
        Protocol::Tcp => {
            reply.extend(b"d8:completei");
            reply.extend(peers.seed_count.to_string().as_bytes());
            reply.extend(b"e10:incompletei");
            reply.extend(peers.leecher_count().to_string().as_bytes());
            reply.extend(b"e8:intervali");
            reply.extend(interval.to_string().as_bytes());
            reply.extend(b"e5:peers");
            reply.extend((6 * amount).to_string().as_bytes());
            reply.extend(b":");
        }
        Protocol::Udp => {
            reply.extend(interval.to_be_bytes());
            reply.extend((peers.peer_count as u32).to_be_bytes());
            reply.extend((peers.seed_count as u32).to_be_bytes());
        }
    }

    if amount > 0 {
        sample_peers(peers, amount, rng, &mut reply);
    }

    if protocol == Protocol::Tcp {
        reply.push(b'e');
    }

    reply
}

/// Removes the peer on a stopped announce and answers with a zero-peer
/// reply carrying the remaining counts; unknown torrents get the synthetic
/// all-zero record.
pub fn remove_peer(
    tracker: &Tracker,
    info_hash: &InfoHash,
    peer: &Peer,
    protocol: Protocol,
    rng: &mut impl Rng,
) -> Vec<u8> {
    let interval = request_interval(tracker.config.announce_interval, rng);
    let mut bucket = tracker.buckets.lock_by_hash(info_hash);

    let (seeders, leechers) = match bucket.find_mut(info_hash) {
        Some(torrent) => {
            torrent.peers.remove(&peer.key());

            (torrent.peers.seed_count, torrent.peers.leecher_count())
        }
        None => (0, 0),
    };

    drop(bucket);

    counts_only_reply(protocol, interval, seeders, leechers)
}

/// Reply without a peer sample, used for stopped announces and unknown
/// torrents. The UDP variant is the interval, leecher and seeder words.
fn counts_only_reply(protocol: Protocol, interval: u32, seeders: usize, leechers: usize) -> Vec<u8> {
    let mut reply = Vec::with_capacity(64);

    match protocol {
        Protocol::Tcp => {
            reply.extend(b"d8:completei");
            reply.extend(seeders.to_string().as_bytes());
            reply.extend(b"e10:incompletei");
            reply.extend(leechers.to_string().as_bytes());
            reply.extend(b"e8:intervali");
            reply.extend(interval.to_string().as_bytes());
            reply.extend(b"e5:peers0:e");
        }
        Protocol::Udp => {
            reply.extend(interval.to_be_bytes());
            reply.extend((leechers as u32).to_be_bytes());
            reply.extend((seeders as u32).to_be_bytes());
        }
    }

    reply
}

/// Random client re-announce interval in `[base / 2, base)` so the swarm
/// does not thunder in lockstep.
fn request_interval(base: u32, rng: &mut impl Rng) -> u32 {
    base / 2 + rng.gen_range(0..(base / 2).max(1))
}

/// Emits `amount` peers drawn approximately uniformly from the union of
/// the pools in one streaming pass.
///
/// A fixed-point step tiles the population into `amount` slots and a
/// random jitter inside each slot picks the peer, so no intermediate index
/// is built. The sampler may pick the requester itself.
fn sample_peers(peers: &PeerList, amount: usize, rng: &mut impl Rng, reply: &mut Vec<u8>) {
    // Position the high bit of the shifted population near the top of the
    // word for maximum fixed-point precision without overflow.
    const MAX_PREC_BIT: u32 = 1 << (u32::BITS - 3);

    let mut shifted_pc = peers.peer_count as u32;
    let mut shift = 0;

    while shifted_pc & MAX_PREC_BIT == 0 {
        shifted_pc <<= 1;
        shift += 1;
    }

    let shifted_step = shifted_pc / amount as u32;

    // Start somewhere in the middle of the population so the fixpoint's
    // aliasing does not always miss the same peers.
    let mut pool_offset = rng.gen_range(0..peers.peer_count);
    let mut pool_index = 0;

    for index in 0..amount as u32 {
        // The aliased, non-shifted range the next pick may fall into.
        let diff = ((index + 1) * shifted_step >> shift) - (index * shifted_step >> shift);
        pool_offset += 1 + rng.gen::<u32>() as usize % diff as usize;

        while pool_offset >= peers.pools[pool_index].len() {
            pool_offset -= peers.pools[pool_index].len();
            pool_index = (pool_index + 1) % POOLS_COUNT;
        }

        if let Some(peer) = peers.pools[pool_index].get(pool_offset) {
            reply.extend(peer.key());
        }
    }
}
