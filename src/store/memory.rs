//! In-memory queue store.
//!
//! Keeps everything in a `HashMap` behind a lock. Suitable for tests and for
//! deployments that want the persistence code path without a database.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use super::{QueueStore, StoreError, StoreResult, StoredEntry};
use crate::Qid;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<MemoryData>>,
}

#[derive(Debug)]
struct MemoryData {
    entries: HashMap<Qid, (i32, StoredEntry)>,
    broken: HashSet<Qid>,
    is_healthy: bool,
}

impl Default for MemoryData {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            broken: HashSet::new(),
            is_healthy: true,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an unreachable backend: every call fails while unhealthy.
    pub fn set_healthy(&self, healthy: bool) -> StoreResult<()> {
        self.write()?.is_healthy = healthy;
        Ok(())
    }

    /// Makes loading of a single entry fail, as a corrupt record would.
    pub fn break_entry(&self, qid: Qid) -> StoreResult<()> {
        self.write()?.broken.insert(qid);
        Ok(())
    }

    pub fn contains(&self, qid: Qid) -> bool {
        self.read().is_ok_and(|d| d.entries.contains_key(&qid))
    }

    pub fn len(&self) -> usize {
        self.read().map_or(0, |d| d.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, MemoryData>> {
        let guard = self
            .data
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if guard.is_healthy {
            Ok(guard)
        } else {
            Err(StoreError::Unavailable("memory store marked unhealthy".into()))
        }
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, MemoryData>> {
        self.data
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn write_healthy(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, MemoryData>> {
        let guard = self.write()?;
        if guard.is_healthy {
            Ok(guard)
        } else {
            Err(StoreError::Unavailable("memory store marked unhealthy".into()))
        }
    }
}

impl QueueStore for MemoryStore {
    fn load_entry_ids(&self, store_id: i32) -> StoreResult<Vec<Qid>> {
        let data = self.read()?;
        let mut ids: Vec<(usize, Qid)> = data
            .entries
            .values()
            .filter(|(owner, _)| *owner == store_id)
            .map(|(_, e)| (e.order, e.qid))
            .collect();
        ids.sort_unstable();
        Ok(ids.into_iter().map(|(_, qid)| qid).collect())
    }

    fn load_entry(&self, qid: Qid) -> StoreResult<StoredEntry> {
        let data = self.read()?;
        if data.broken.contains(&qid) {
            return Err(StoreError::Malformed {
                qid,
                reason: "record marked broken".into(),
            });
        }
        data.entries
            .get(&qid)
            .map(|(_, e)| e.clone())
            .ok_or(StoreError::NotFound(qid))
    }

    fn create(&self, store_id: i32, entry: &StoredEntry) -> StoreResult<()> {
        self.write_healthy()?
            .entries
            .insert(entry.qid, (store_id, entry.clone()));
        Ok(())
    }

    fn update(&self, entry: &StoredEntry) -> StoreResult<()> {
        let mut data = self.write_healthy()?;
        match data.entries.get_mut(&entry.qid) {
            Some((_, stored)) => {
                *stored = entry.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(entry.qid)),
        }
    }

    fn remove(&self, qid: Qid) -> StoreResult<()> {
        self.write_healthy()?
            .entries
            .remove(&qid)
            .map(|_| ())
            .ok_or(StoreError::NotFound(qid))
    }
}
