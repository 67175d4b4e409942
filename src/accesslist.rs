use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::bail;
use memchr::memchr_iter;
use tracing::{info, warn};

use crate::tracker::torrent::InfoHash;
use crate::tracker::Tracker;
use crate::utils::hex_digit;

/// Admission semantics of the list: `White` admits listed hashes only,
/// `Black` admits everything but the listed hashes, `Off` admits all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Off,
    White,
    Black,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        match mode {
            "off" => Ok(Self::Off),
            "white" => Ok(Self::White),
            "black" => Ok(Self::Black),
            _ => bail!("unknown access list mode `{mode}`"),
        }
    }
}

/// Sorted, deduplicated set of infohashes consulted before any mutation of
/// the peer store. Rebuilt wholesale on reload; callers work against an
/// `Arc` snapshot.
#[derive(Debug)]
pub struct AccessList {
    mode: Mode,
    entries: Vec<InfoHash>,
}

impl AccessList {
    pub fn empty(mode: Mode) -> AccessList {
        AccessList {
            mode,
            entries: Vec::new(),
        }
    }

    /// Reads the list file. An unreadable file leaves the list empty, which
    /// admits everything in `Black` mode and nothing in `White` mode.
    pub fn load(mode: Mode, path: Option<&Path>) -> AccessList {
        let Some(path) = path else {
            return Self::empty(mode);
        };

        match fs::read(path) {
            Ok(buffer) => {
                let (entries, skipped) = parse(&buffer);

                info!(
                    entries = entries.len(),
                    skipped,
                    "access list read from {}",
                    path.display()
                );

                AccessList { mode, entries }
            }
            Err(error) => {
                warn!("cannot open access list file {}: {error}", path.display());

                Self::empty(mode)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether announces for `info_hash` may touch the store.
    pub fn is_admitted(&self, info_hash: &InfoHash) -> bool {
        match self.mode {
            Mode::Off => true,
            Mode::White => self.entries.binary_search(info_hash).is_ok(),
            Mode::Black => self.entries.binary_search(info_hash).is_err(),
        }
    }
}

/// Scans the file: the first 40 bytes of a line are a lowercase hex
/// infohash, the rest of the line is ignored. A line whose 41st byte is
/// another hex digit is skipped so a 41-digit prefix of a longer id is
/// never accepted.
///
/// The scratch hash deliberately survives from line to line: a digit pair
/// that fails to parse leaves that position at the value an earlier line
/// put there. Returns the entries, sorted and deduplicated, plus the
/// skipped-line count.
fn parse(buffer: &[u8]) -> (Vec<InfoHash>, usize) {
    let mut entries = Vec::new();
    let mut skipped = 0;
    let mut hash = [0u8; 20];

    let mut start = 0;
    let mut lines: Vec<&[u8]> = Vec::new();

    for newline in memchr_iter(b'\n', buffer) {
        lines.push(&buffer[start..newline]);
        start = newline + 1;
    }

    if start < buffer.len() {
        lines.push(&buffer[start..]);
    }

    for line in lines {
        for pos in 0..hash.len() {
            let high = line.get(pos * 2).copied().and_then(hex_digit);
            let low = line.get(pos * 2 + 1).copied().and_then(hex_digit);

            if let (Some(high), Some(low)) = (high, low) {
                hash[pos] = high << 4 | low;
            }
        }

        if line.get(40).copied().and_then(hex_digit).is_some() {
            skipped += 1;
            continue;
        }

        entries.push(InfoHash(hash));
    }

    entries.sort_unstable();
    entries.dedup();

    (entries, skipped)
}

/// Supervisor task owning access-list reloads: replaces the backing
/// snapshot on every `SIGHUP`.
#[cfg(unix)]
pub async fn reload_on_sighup(tracker: Arc<Tracker>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(error) => {
            warn!("cannot install SIGHUP handler: {error}");
            return;
        }
    };

    while hangups.recv().await.is_some() {
        tracker.reload_accesslist();
    }
}
