use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::accesslist::Mode;

/// Number of independently locked torrent shards. Must be a power of two
/// no larger than 2^16; the top bits of an infohash select the shard.
pub const BUCKET_COUNT: usize = 1024;

/// Number of age generations per torrent. Peers enter generation 0 and are
/// rotated toward the highest index until they fall off the end.
pub const POOLS_COUNT: usize = 9;

/// Seconds per pool generation. A peer that stays silent for
/// `POOLS_COUNT * POOL_ROTATION_SECS` seconds is forgotten.
pub const POOL_ROTATION_SECS: u64 = 300;

/// Capacity of the administrative IP permission table.
pub const ADMINIP_MAX: usize = 64;

/// Size of one fullscrape output chunk.
pub const SCRAPE_CHUNK_SIZE: usize = 512 * 1024;

/// Upper bound on one bencoded scrape dictionary entry; doubles as the
/// low-water mark when filling fullscrape chunks.
pub const FULLSCRAPE_MAX_ENTRY_LEN: usize = 100;

const _: () = assert!(BUCKET_COUNT.is_power_of_two() && BUCKET_COUNT <= 1 << 16);
const _: () = assert!(POOLS_COUNT >= 4);

#[derive(Clone, Debug)]
pub struct Config {
    /// Base client re-announce interval in seconds. Replies carry a random
    /// interval between half this value and the full value so clients do
    /// not thunder in lockstep.
    pub announce_interval: u32,
    /// Seconds between cleaner sweeps over the whole store.
    pub cleanup_interval: u64,
    /// Number of worker tasks serving the fullscrape queue.
    pub fullscrape_workers: usize,
    /// Whether the access list admits listed hashes only (`White`), all but
    /// the listed hashes (`Black`), or everything (`Off`).
    pub accesslist_mode: Mode,
    /// Path of the access list file, one 40-digit hex infohash per line.
    pub accesslist_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            announce_interval: 1800, // 30 minutes
            cleanup_interval: 60,    // 1 minute
            fullscrape_workers: 1,
            accesslist_mode: Mode::Off,
            accesslist_path: None,
        }
    }
}

impl Config {
    /// Builds a config from the environment, falling back to the defaults
    /// for unset variables. A `.env` file is honored when present.
    pub fn from_env() -> Result<Config> {
        dotenvy::dotenv().ok();

        let mut config = Config::default();

        if let Ok(value) = env::var("ANNOUNCE_INTERVAL") {
            config.announce_interval = value
                .parse()
                .context("ANNOUNCE_INTERVAL must be a number of seconds.")?;
        }

        if let Ok(value) = env::var("CLEANUP_INTERVAL") {
            config.cleanup_interval = value
                .parse()
                .context("CLEANUP_INTERVAL must be a number of seconds.")?;
        }

        if let Ok(value) = env::var("FULLSCRAPE_WORKERS") {
            config.fullscrape_workers = value
                .parse()
                .context("FULLSCRAPE_WORKERS must be a worker count.")?;
        }

        if let Ok(value) = env::var("ACCESSLIST_MODE") {
            config.accesslist_mode = value
                .parse()
                .context("ACCESSLIST_MODE must be one of off, white, black.")?;
        }

        if let Ok(value) = env::var("ACCESSLIST_PATH") {
            config.accesslist_path = Some(PathBuf::from(value));
        }

        Ok(config)
    }
}
