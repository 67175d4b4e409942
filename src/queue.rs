use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

use crate::fullscrape::Chunks;

/// One queued fullscrape job. The reply channel doubles as the result
/// queue slot: when the requester has gone away the send fails and the
/// worker frees the buffers.
pub struct Task {
    pub id: u64,
    pub reply: oneshot::Sender<Chunks>,
}

/// Consuming end of the task queue, shared by the worker tasks.
pub type TaskReceiver = Arc<Mutex<mpsc::UnboundedReceiver<Task>>>;

/// Producer handle of the fullscrape work queue, embedded in the tracker
/// state. Tasks are delivered in FIFO order to whichever worker is free.
pub struct WorkQueue {
    tasks: mpsc::UnboundedSender<Task>,
    next_id: AtomicU64,
}

impl WorkQueue {
    pub fn new() -> (WorkQueue, TaskReceiver) {
        let (tasks, receiver) = mpsc::unbounded_channel();

        let queue = WorkQueue {
            tasks,
            next_id: AtomicU64::new(1),
        };

        (queue, Arc::new(Mutex::new(receiver)))
    }

    /// Enqueues a task and hands back its id plus the result channel.
    /// Dropping the receiver cancels delivery, never the walk itself.
    pub fn push(&self) -> (u64, oneshot::Receiver<Chunks>) {
        let (reply, result) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        if self.tasks.send(Task { id, reply }).is_err() {
            debug!(taskid = id, "no fullscrape worker is running");
        }

        (id, result)
    }
}
