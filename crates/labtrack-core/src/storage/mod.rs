//! # Progress Storage
//!
//! Durable mapping from `(user, lab)` to [`ProgressRecord`].
//!
//! A store is a dumb keyed store: it never interprets stages. It guarantees
//! that a successful write is visible to every later read of the same key
//! and that writes to one key never interleave.
//!
//! ## Backends
//!
//! - [`MemoryProgressStore`]: `RwLock<BTreeMap>`, volatile (tests, `--backend memory`)
//! - [`RedbProgressStore`]: redb embedded database, ACID and crash safe

mod memory;
mod redb_store;

pub use memory::MemoryProgressStore;
pub use redb_store::RedbProgressStore;

use crate::{LabId, LabtrackError, ProgressRecord, UserId};
use std::collections::BTreeMap;

/// Keyed progress storage shared by all requests.
///
/// Implementations must be safe to call from many threads at once.
pub trait ProgressStore: Send + Sync {
    /// Read the record for a key, if one was ever written.
    fn get(&self, user: &UserId, lab: &LabId) -> Result<Option<ProgressRecord>, LabtrackError>;

    /// Replace the record for a key unconditionally.
    fn put(&self, user: &UserId, lab: &LabId, record: &ProgressRecord)
    -> Result<(), LabtrackError>;

    /// Replace the record only if the stored revision still equals `expected`.
    ///
    /// `expected = None` means "no record may exist yet". Returns `Ok(false)`,
    /// writing nothing, when another writer got there first. The comparison and
    /// the write happen atomically with respect to other writers of the key.
    fn compare_and_put(
        &self,
        user: &UserId,
        lab: &LabId,
        expected: Option<u64>,
        record: &ProgressRecord,
    ) -> Result<bool, LabtrackError>;

    /// Every record stored for one learner, keyed by lab.
    fn list_for_user(&self, user: &UserId)
    -> Result<BTreeMap<LabId, ProgressRecord>, LabtrackError>;
}

impl<S: ProgressStore + ?Sized> ProgressStore for std::sync::Arc<S> {
    fn get(&self, user: &UserId, lab: &LabId) -> Result<Option<ProgressRecord>, LabtrackError> {
        (**self).get(user, lab)
    }

    fn put(
        &self,
        user: &UserId,
        lab: &LabId,
        record: &ProgressRecord,
    ) -> Result<(), LabtrackError> {
        (**self).put(user, lab, record)
    }

    fn compare_and_put(
        &self,
        user: &UserId,
        lab: &LabId,
        expected: Option<u64>,
        record: &ProgressRecord,
    ) -> Result<bool, LabtrackError> {
        (**self).compare_and_put(user, lab, expected, record)
    }

    fn list_for_user(
        &self,
        user: &UserId,
    ) -> Result<BTreeMap<LabId, ProgressRecord>, LabtrackError> {
        (**self).list_for_user(user)
    }
}
