use std::sync::Arc;

use tracing::debug;

use crate::config::{BUCKET_COUNT, FULLSCRAPE_MAX_ENTRY_LEN, SCRAPE_CHUNK_SIZE};
use crate::queue::TaskReceiver;
use crate::scrape::push_entry;
use crate::tracker::Tracker;

/// Scatter-gather fullscrape output: a sequence of chunks the consumer can
/// hand to a vectored write.
pub type Chunks = Vec<Vec<u8>>;

fn new_chunk() -> Option<Vec<u8>> {
    let mut chunk = Vec::new();
    chunk.try_reserve_exact(SCRAPE_CHUNK_SIZE).ok()?;

    Some(chunk)
}

/// Dumps the counts of every torrent with peers or recorded downloads as
/// one bencoded dictionary, produced in equal-sized chunks while visiting
/// the buckets strictly one lock at a time.
///
/// Returns no chunks at all when a buffer cannot be grown; the consumer
/// answers with an empty dictionary.
pub fn fullscrape(tracker: &Tracker) -> Chunks {
    let mut chunks: Chunks = Vec::new();
    let Some(mut chunk) = new_chunk() else {
        return Vec::new();
    };

    chunk.extend(b"d5:filesd");

    for index in 0..BUCKET_COUNT {
        let bucket = tracker.buckets.lock(index);

        for torrent in bucket.iter() {
            let peers = &torrent.peers;

            if peers.peer_count == 0 && peers.down_count == 0 {
                continue;
            }

            push_entry(
                &mut chunk,
                &torrent.info_hash,
                peers.seed_count,
                peers.down_count,
                peers.leecher_count(),
            );

            // Low-water mark: seal the chunk while any entry still fits.
            if chunk.len() + FULLSCRAPE_MAX_ENTRY_LEN >= SCRAPE_CHUNK_SIZE {
                chunks.push(chunk);

                match new_chunk() {
                    Some(fresh) => chunk = fresh,
                    None => return Vec::new(),
                }
            }
        }
    }

    chunk.extend(b"ee");
    chunks.push(chunk);

    chunks
}

/// Single-allocation variant: sizes one buffer from a counting pass over
/// the buckets, then walks them once more writing linearly and trims the
/// excess. Produces the same bytes as the chunked walk.
pub fn fullscrape_buffer(tracker: &Tracker) -> Vec<u8> {
    let mut torrent_count = 0;
    for index in 0..BUCKET_COUNT {
        torrent_count += tracker.buckets.lock(index).len();
    }

    let mut out = Vec::new();
    if out
        .try_reserve(FULLSCRAPE_MAX_ENTRY_LEN * (torrent_count + 1))
        .is_err()
    {
        return Vec::new();
    }

    out.extend(b"d5:filesd");

    for index in 0..BUCKET_COUNT {
        let bucket = tracker.buckets.lock(index);

        for torrent in bucket.iter() {
            let peers = &torrent.peers;

            if peers.peer_count == 0 && peers.down_count == 0 {
                continue;
            }

            push_entry(
                &mut out,
                &torrent.info_hash,
                peers.seed_count,
                peers.down_count,
                peers.leecher_count(),
            );
        }
    }

    out.extend(b"ee");
    out.shrink_to_fit();

    out
}

/// Worker loop: blocks on the task queue, produces a dump, hands the
/// chunks back through the task's reply channel.
async fn worker(tracker: Arc<Tracker>, tasks: TaskReceiver) {
    loop {
        let task = tasks.lock().await.recv().await;

        let Some(task) = task else {
            break;
        };

        let chunks = fullscrape(&tracker);
        debug!(taskid = task.id, chunks = chunks.len(), "fullscrape produced");

        if task.reply.send(chunks).is_err() {
            // Requester went away mid-walk; the buffers die here.
            debug!(taskid = task.id, "fullscrape consumer gone");
        }
    }
}

/// Spawns `count` fullscrape workers sharing one task queue.
pub fn spawn(tracker: Arc<Tracker>, tasks: TaskReceiver, count: usize) {
    for _ in 0..count.max(1) {
        tokio::spawn(worker(tracker.clone(), tasks.clone()));
    }
}
