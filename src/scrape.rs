use crate::config::FULLSCRAPE_MAX_ENTRY_LEN;
use crate::tracker::torrent::{current_epoch, InfoHash};
use crate::tracker::Tracker;

/// One bencoded scrape dictionary entry, shared by scrape and fullscrape:
/// `20:<hash>d8:completei<S>e10:downloadedi<D>e10:incompletei<L>ee`.
pub(crate) fn push_entry(
    out: &mut Vec<u8>,
    info_hash: &InfoHash,
    seeders: usize,
    downloads: usize,
    leechers: usize,
) {
    out.extend(b"20:");
    out.extend(&info_hash.0);
    out.extend(b"d8:completei");
    out.extend(seeders.to_string().as_bytes());
    out.extend(b"e10:downloadedi");
    out.extend(downloads.to_string().as_bytes());
    out.extend(b"e10:incompletei");
    out.extend(leechers.to_string().as_bytes());
    out.extend(b"ee");
}

/// Looks one torrent up for scraping, aging it first; a population that
/// has aged to empty is dropped from its bucket and reported absent.
/// Returns the (seeders, downloads, leechers) counts of a live torrent.
fn scrape_torrent(tracker: &Tracker, info_hash: &InfoHash, now: u64) -> Option<(usize, usize, usize)> {
    let mut bucket = tracker.buckets.lock_by_hash(info_hash);

    let mut emptied = false;
    let mut counts = None;

    if let Some(torrent) = bucket.find_mut(info_hash) {
        if torrent.peers.clean(now) {
            emptied = true;
        } else {
            counts = Some((
                torrent.peers.seed_count,
                torrent.peers.down_count,
                torrent.peers.leecher_count(),
            ));
        }
    }

    if emptied {
        bucket.remove(info_hash);
    }

    counts
}

/// Bencoded multi-scrape: present torrents appear keyed by infohash,
/// absent torrents are omitted.
pub fn tcp_scrape(tracker: &Tracker, info_hashes: &[InfoHash]) -> Vec<u8> {
    let now = current_epoch();
    let mut reply = Vec::with_capacity(11 + info_hashes.len() * FULLSCRAPE_MAX_ENTRY_LEN);

    reply.extend(b"d5:filesd");

    for info_hash in info_hashes {
        if let Some((seeders, downloads, leechers)) = scrape_torrent(tracker, info_hash, now) {
            push_entry(&mut reply, info_hash, seeders, downloads, leechers);
        }
    }

    reply.extend(b"ee");

    reply
}

/// UDP scrape: exactly 12 bytes per hash — the seeder, download and
/// leecher words — zero-filled for absent torrents.
pub fn udp_scrape(tracker: &Tracker, info_hashes: &[InfoHash]) -> Vec<u8> {
    let now = current_epoch();
    let mut reply = Vec::with_capacity(info_hashes.len() * 12);

    for info_hash in info_hashes {
        match scrape_torrent(tracker, info_hash, now) {
            Some((seeders, downloads, leechers)) => {
                reply.extend((seeders as u32).to_be_bytes());
                reply.extend((downloads as u32).to_be_bytes());
                reply.extend((leechers as u32).to_be_bytes());
            }
            None => reply.extend([0u8; 12]),
        }
    }

    reply
}
