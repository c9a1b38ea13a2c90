//! # redb-backed Progress Storage
//!
//! A disk-backed progress store using the redb embedded database, providing:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Records live in one table keyed by `(user_id, lab_id)`, so all of a
//! learner's records are contiguous and `list_for_user` is a range scan.
//! redb admits one write transaction at a time, which is what makes
//! `compare_and_put` atomic.

use super::ProgressStore;
use crate::formats::{record_from_bytes, record_to_bytes};
use crate::{LabId, LabtrackError, ProgressRecord, UserId};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::BTreeMap;
use std::path::Path;

/// Table for progress: (user_id, lab_id) -> encoded ProgressRecord
const PROGRESS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("progress");

/// Map any storage-engine error to the retryable store failure.
fn unavailable(e: impl std::fmt::Display) -> LabtrackError {
    LabtrackError::StoreUnavailable(e.to_string())
}

/// A disk-backed progress store using redb.
pub struct RedbProgressStore {
    db: Database,
}

impl std::fmt::Debug for RedbProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbProgressStore").finish_non_exhaustive()
    }
}

impl RedbProgressStore {
    /// Open or create a progress database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LabtrackError> {
        let db = Database::create(path.as_ref()).map_err(unavailable)?;

        // Initialize the table so that readers never see it missing.
        {
            let write_txn = db.begin_write().map_err(unavailable)?;
            let _ = write_txn.open_table(PROGRESS).map_err(unavailable)?;
            write_txn.commit().map_err(unavailable)?;
        }

        Ok(Self { db })
    }

    /// Total number of stored records across all learners.
    pub fn record_count(&self) -> Result<u64, LabtrackError> {
        let read_txn = self.db.begin_read().map_err(unavailable)?;
        let table = read_txn.open_table(PROGRESS).map_err(unavailable)?;
        table.len().map_err(unavailable)
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), LabtrackError> {
        self.db.compact().map_err(unavailable)?;
        Ok(())
    }
}

impl ProgressStore for RedbProgressStore {
    fn get(&self, user: &UserId, lab: &LabId) -> Result<Option<ProgressRecord>, LabtrackError> {
        let read_txn = self.db.begin_read().map_err(unavailable)?;
        let table = read_txn.open_table(PROGRESS).map_err(unavailable)?;
        match table
            .get((user.as_str(), lab.as_str()))
            .map_err(unavailable)?
        {
            Some(bytes) => Ok(Some(record_from_bytes(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn put(
        &self,
        user: &UserId,
        lab: &LabId,
        record: &ProgressRecord,
    ) -> Result<(), LabtrackError> {
        let bytes = record_to_bytes(record)?;
        let write_txn = self.db.begin_write().map_err(unavailable)?;
        {
            let mut table = write_txn.open_table(PROGRESS).map_err(unavailable)?;
            table
                .insert((user.as_str(), lab.as_str()), bytes.as_slice())
                .map_err(unavailable)?;
        }
        write_txn.commit().map_err(unavailable)
    }

    fn compare_and_put(
        &self,
        user: &UserId,
        lab: &LabId,
        expected: Option<u64>,
        record: &ProgressRecord,
    ) -> Result<bool, LabtrackError> {
        let bytes = record_to_bytes(record)?;
        let write_txn = self.db.begin_write().map_err(unavailable)?;

        let swapped = {
            let mut table = write_txn.open_table(PROGRESS).map_err(unavailable)?;
            let current = match table
                .get((user.as_str(), lab.as_str()))
                .map_err(unavailable)?
            {
                Some(stored) => Some(record_from_bytes(stored.value())?.revision),
                None => None,
            };

            if current == expected {
                table
                    .insert((user.as_str(), lab.as_str()), bytes.as_slice())
                    .map_err(unavailable)?;
                true
            } else {
                false
            }
        };

        if swapped {
            write_txn.commit().map_err(unavailable)?;
        } else {
            write_txn.abort().map_err(unavailable)?;
        }
        Ok(swapped)
    }

    fn list_for_user(
        &self,
        user: &UserId,
    ) -> Result<BTreeMap<LabId, ProgressRecord>, LabtrackError> {
        let read_txn = self.db.begin_read().map_err(unavailable)?;
        let table = read_txn.open_table(PROGRESS).map_err(unavailable)?;

        let mut records = BTreeMap::new();
        for entry in table.range((user.as_str(), "")..).map_err(unavailable)? {
            let (key, value) = entry.map_err(unavailable)?;
            let (owner, lab) = key.value();
            if owner != user.as_str() {
                break;
            }
            let lab = LabId::new(lab).map_err(|e| {
                LabtrackError::SerializationError(format!("stored lab key: {}", e))
            })?;
            records.insert(lab, record_from_bytes(value.value())?);
        }
        Ok(records)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Score, Stage};
    use tempfile::tempdir;

    fn ids(user: &str, lab: &str) -> (UserId, LabId) {
        (
            UserId::new(user).expect("user"),
            LabId::new(lab).expect("lab"),
        )
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("progress.db");
        let (user, lab) = ids("u1", "bb84");
        let record = ProgressRecord {
            stage: Stage::QuizPassed,
            passed: true,
            best_score: Score::from_bps(8000).expect("score"),
            revision: 2,
            ..ProgressRecord::default()
        };

        {
            let store = RedbProgressStore::open(&path).expect("open");
            store.put(&user, &lab, &record).expect("put");
        }

        let mut store = RedbProgressStore::open(&path).expect("reopen");
        assert_eq!(store.get(&user, &lab).expect("get"), Some(record.clone()));
        assert_eq!(store.record_count().expect("count"), 1);

        store.compact().expect("compact");
        assert_eq!(store.get(&user, &lab).expect("get"), Some(record));
    }

    #[test]
    fn compare_and_put_detects_conflict() {
        let dir = tempdir().expect("tempdir");
        let store = RedbProgressStore::open(dir.path().join("cas.db")).expect("open");
        let (user, lab) = ids("u1", "bb84");

        let first = ProgressRecord {
            revision: 1,
            ..ProgressRecord::default()
        };
        assert!(store.compare_and_put(&user, &lab, None, &first).expect("cas"));
        assert!(!store.compare_and_put(&user, &lab, None, &first).expect("cas"));

        let second = ProgressRecord {
            revision: 2,
            stage: Stage::TheoryViewed,
            ..ProgressRecord::default()
        };
        assert!(!store.compare_and_put(&user, &lab, Some(5), &second).expect("cas"));
        assert!(store.compare_and_put(&user, &lab, Some(1), &second).expect("cas"));
        assert_eq!(
            store.get(&user, &lab).expect("get").map(|r| r.stage),
            Some(Stage::TheoryViewed)
        );
    }

    #[test]
    fn list_for_user_scans_only_that_user() {
        let dir = tempdir().expect("tempdir");
        let store = RedbProgressStore::open(dir.path().join("list.db")).expect("open");
        let (alice, bb84) = ids("alice", "bb84");
        let (_, tele) = ids("alice", "tele");
        let (alicia, ghz) = ids("alicia", "ghz_state");
        let (al, walk) = ids("al", "walk");

        for (user, lab) in [(&alice, &bb84), (&alice, &tele), (&alicia, &ghz), (&al, &walk)] {
            store
                .put(user, lab, &ProgressRecord::default())
                .expect("put");
        }

        let listed = store.list_for_user(&alice).expect("list");
        let labs: Vec<_> = listed.keys().map(LabId::as_str).collect();
        assert_eq!(labs, vec!["bb84", "tele"]);
    }
}
