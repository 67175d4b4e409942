pub mod bucket;
pub mod peer;
pub mod torrent;

pub use peer::Peer;

use std::net::IpAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::accesslist::AccessList;
use crate::adminip::AdminIpTable;
use crate::config::Config;
use crate::error::TrackerError;
use crate::queue::{TaskReceiver, WorkQueue};

use bucket::Buckets;

/// All state of the tracker data plane, constructed once at startup and
/// passed explicitly to every operation.
pub struct Tracker {
    pub buckets: Buckets,
    pub accesslist: RwLock<Arc<AccessList>>,
    pub adminips: RwLock<AdminIpTable>,
    pub config: Config,
    pub fullscrapes: WorkQueue,
}

impl Tracker {
    /// Builds the shared tracker state handed to every handler, plus the
    /// receiving end of the fullscrape task queue for `fullscrape::spawn`.
    pub fn new(config: Config) -> (Arc<Tracker>, TaskReceiver) {
        let accesslist = AccessList::load(config.accesslist_mode, config.accesslist_path.as_deref());
        let (fullscrapes, tasks) = WorkQueue::new();

        info!(
            entries = accesslist.len(),
            mode = ?config.accesslist_mode,
            "tracker state initialized"
        );

        let tracker = Tracker {
            buckets: Buckets::new(),
            accesslist: RwLock::new(Arc::new(accesslist)),
            adminips: RwLock::new(AdminIpTable::new()),
            config,
            fullscrapes,
        };

        (Arc::new(tracker), tasks)
    }

    /// Snapshot of the access list for the duration of one admission
    /// check; a concurrent reload swaps the backing `Arc` underneath.
    pub fn accesslist(&self) -> Arc<AccessList> {
        self.accesslist.read().clone()
    }

    /// Rebuilds the access list wholesale from its configured file.
    pub fn reload_accesslist(&self) {
        let fresh = AccessList::load(
            self.config.accesslist_mode,
            self.config.accesslist_path.as_deref(),
        );

        info!(entries = fresh.len(), "access list reloaded");

        *self.accesslist.write() = Arc::new(fresh);
    }

    /// Grants `permissions` to an administrative address.
    pub fn bless(&self, ip: IpAddr, permissions: u8) -> Result<(), TrackerError> {
        self.adminips.write().bless(ip, permissions)
    }

    /// Whether `ip` holds at least one of the `required` permission bits.
    pub fn is_blessed(&self, ip: IpAddr, required: u8) -> bool {
        self.adminips.read().is_blessed(ip, required)
    }

    /// Current number of torrents, counted one bucket lock at a time.
    pub fn torrent_count(&self) -> usize {
        (0..crate::config::BUCKET_COUNT)
            .map(|index| self.buckets.lock(index).len())
            .sum()
    }
}
