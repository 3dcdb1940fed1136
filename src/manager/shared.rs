use std::collections::BTreeSet;
use std::sync::Arc;
use parking_lot::{Mutex, MutexGuard};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::record::Record;
use crate::core::stats::ManagerStats;
use crate::core::types::{IndexedAttribute, RecordId};
use crate::manager::record_manager::RecordManager;

/// Cloneable handle serializing every call through one mutex.
#[derive(Clone)]
pub struct SharedRecordManager {
    inner: Arc<Mutex<RecordManager>>,
}

impl SharedRecordManager {
    pub fn open(config: Config) -> Result<Self> {
        Ok(Self::new(RecordManager::open(config)?))
    }

    pub fn new(manager: RecordManager) -> Self {
        SharedRecordManager {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    /// Holds the lock for a sequence of calls.
    pub fn lock(&self) -> MutexGuard<'_, RecordManager> {
        self.inner.lock()
    }

    pub fn add(&self, record: &Record) -> Result<RecordId> {
        self.inner.lock().add(record)
    }

    pub fn get(&self, record_id: RecordId) -> Result<Option<Record>> {
        self.inner.lock().get(record_id)
    }

    pub fn update(&self, record_id: RecordId, record: &Record) -> Result<bool> {
        self.inner.lock().update(record_id, record)
    }

    pub fn delete(&self, record_id: RecordId) -> Result<bool> {
        self.inner.lock().delete(record_id)
    }

    pub fn lookup_by(&self, attribute: IndexedAttribute, value: &str) -> Vec<RecordId> {
        self.inner.lock().lookup_by(attribute, value)
    }

    pub fn search_text_attribute(&self, patterns: &[&str]) -> Result<BTreeSet<RecordId>> {
        self.inner.lock().search_text_attribute(patterns)
    }

    pub fn valid_ids(&self) -> Vec<RecordId> {
        self.inner.lock().iter_valid_ids().collect()
    }

    pub fn stats(&self) -> Result<ManagerStats> {
        self.inner.lock().stats()
    }

    /// Closes the manager if this is the last handle.
    pub fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex.into_inner().close(),
            Err(_) => Err(Error::new(
                ErrorKind::InvalidInput,
                "other handles to the record manager are still alive".to_string(),
            )),
        }
    }
}
