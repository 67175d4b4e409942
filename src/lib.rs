//! In-memory data plane of a public BitTorrent tracker.
//!
//! The crate ingests announces for a set of infohashes, keeps an aging
//! peer population per torrent in a sharded, bucket-locked store, and
//! synthesises the replies: random peer samples for announces, counters
//! for scrapes, and a chunked bencoded dump of the whole population for
//! fullscrapes. State is optimised for throughput and a small working set;
//! nothing survives a restart.
//!
//! Wire parsing and socket I/O stay outside: a request handler decodes an
//! announce into an [`announce::AnnounceRequest`] and writes back the raw
//! reply bytes this crate hands it.
//!
//! ```no_run
//! use std::net::Ipv4Addr;
//!
//! use swarmtracker::announce::{self, AnnounceRequest, Event, Protocol};
//! use swarmtracker::config::Config;
//! use swarmtracker::tracker::{Peer, Tracker};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (tracker, tasks) = Tracker::new(Config::from_env().unwrap());
//!
//!     // Service tasks: fullscrape workers, SIGHUP reload, the cleaner.
//!     swarmtracker::fullscrape::spawn(tracker.clone(), tasks, tracker.config.fullscrape_workers);
//!     tokio::spawn(swarmtracker::accesslist::reload_on_sighup(tracker.clone()));
//!     tokio::spawn({
//!         let tracker = tracker.clone();
//!         async move { swarmtracker::scheduler::handle(&tracker).await }
//!     });
//!
//!     let request = AnnounceRequest {
//!         info_hash: "00112233445566778899aabbccddeeff00112233".parse().unwrap(),
//!         peer: Peer::new(Ipv4Addr::new(10, 0, 0, 1), 6881, 0),
//!         event: Event::Started,
//!         numwant: 50,
//!         protocol: Protocol::Tcp,
//!     };
//!     let _reply = announce::handle(&tracker, &request).unwrap();
//! }
//! ```

pub mod accesslist;
pub mod adminip;
pub mod announce;
pub mod config;
pub mod error;
pub mod fullscrape;
pub mod queue;
pub mod scheduler;
pub mod scrape;
pub mod tracker;
pub mod utils;

pub use announce::{AnnounceRequest, Event, Protocol};
pub use config::Config;
pub use error::TrackerError;
pub use tracker::torrent::InfoHash;
pub use tracker::{Peer, Tracker};
