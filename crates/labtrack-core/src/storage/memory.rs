//! In-memory progress store.

use super::ProgressStore;
use crate::{LabId, LabtrackError, ProgressRecord, UserId};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Records = BTreeMap<(UserId, LabId), ProgressRecord>;

/// Volatile store backed by a `BTreeMap` behind a `RwLock`.
///
/// The write lock makes every put and compare-and-put atomic.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    records: RwLock<Records>,
}

impl MemoryProgressStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all learners.
    pub fn len(&self) -> Result<usize, LabtrackError> {
        Ok(self.read()?.len())
    }

    /// Whether nothing has been stored yet.
    pub fn is_empty(&self) -> Result<bool, LabtrackError> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Records>, LabtrackError> {
        self.records
            .read()
            .map_err(|_| LabtrackError::StoreUnavailable("progress lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Records>, LabtrackError> {
        self.records
            .write()
            .map_err(|_| LabtrackError::StoreUnavailable("progress lock poisoned".to_string()))
    }
}

impl ProgressStore for MemoryProgressStore {
    fn get(&self, user: &UserId, lab: &LabId) -> Result<Option<ProgressRecord>, LabtrackError> {
        Ok(self.read()?.get(&(user.clone(), lab.clone())).cloned())
    }

    fn put(
        &self,
        user: &UserId,
        lab: &LabId,
        record: &ProgressRecord,
    ) -> Result<(), LabtrackError> {
        self.write()?
            .insert((user.clone(), lab.clone()), record.clone());
        Ok(())
    }

    fn compare_and_put(
        &self,
        user: &UserId,
        lab: &LabId,
        expected: Option<u64>,
        record: &ProgressRecord,
    ) -> Result<bool, LabtrackError> {
        let mut records = self.write()?;
        let key = (user.clone(), lab.clone());
        let current = records.get(&key).map(|r| r.revision);
        if current != expected {
            return Ok(false);
        }
        records.insert(key, record.clone());
        Ok(true)
    }

    fn list_for_user(
        &self,
        user: &UserId,
    ) -> Result<BTreeMap<LabId, ProgressRecord>, LabtrackError> {
        Ok(self
            .read()?
            .iter()
            .filter(|((owner, _), _)| owner == user)
            .map(|((_, lab), record)| (lab.clone(), record.clone()))
            .collect())
    }
}
