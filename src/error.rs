use std::collections::TryReserveError;

use thiserror::Error;

/// Errors surfaced by the store and its admission layers.
///
/// `Rejected` and `OutOfMemory` are per-request conditions: the caller drops
/// the update and answers (or stays silent) as its protocol requires.
/// `AdminTableFull` is permanent for the lifetime of the process.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerError {
    #[error("info hash not admitted")]
    Rejected,
    #[error("out of memory")]
    OutOfMemory,
    #[error("admin ip table full")]
    AdminTableFull,
}

impl From<TryReserveError> for TrackerError {
    fn from(_: TryReserveError) -> TrackerError {
        TrackerError::OutOfMemory
    }
}
