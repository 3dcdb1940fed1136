use tracing::debug;
use crate::core::error::{Error, Result};
use crate::core::record::{normalize_number_key, Record};
use crate::core::types::{IndexedAttribute, IndexedAttributes, RecordId, SyncMode};
use crate::index::posting::PostingList;
use crate::index::substore::{LogStore, MemoryStore, OrderedStore};
use crate::storage::layout::StorageLayout;

/// Keys one record contributes, per indexed attribute.
type KeyPlan = Vec<(IndexedAttribute, Vec<String>)>;

/// Four secondary indexes, `attribute value -> ids`, one substore each.
pub struct InvertedIndex {
    attributes: IndexedAttributes,
    stores: Vec<Box<dyn OrderedStore>>, // in IndexedAttribute::ALL order
}

fn slot(attribute: IndexedAttribute) -> usize {
    match attribute {
        IndexedAttribute::Text => 0,
        IndexedAttribute::Count => 1,
        IndexedAttribute::Lighting => 2,
        IndexedAttribute::Severity => 3,
    }
}

impl InvertedIndex {
    pub fn open(
        layout: &StorageLayout,
        attributes: IndexedAttributes,
        sync_mode: SyncMode,
    ) -> Result<Self> {
        let mut stores: Vec<Box<dyn OrderedStore>> = Vec::with_capacity(IndexedAttribute::ALL.len());
        for attribute in IndexedAttribute::ALL {
            let store = LogStore::open(&layout.store_path(attribute), sync_mode)?;
            stores.push(Box::new(store));
        }
        Ok(InvertedIndex { attributes, stores })
    }

    /// Builds the index over caller-provided substores.
    pub fn with_stores<F>(attributes: IndexedAttributes, mut make: F) -> Self
    where
        F: FnMut(IndexedAttribute) -> Box<dyn OrderedStore>,
    {
        let stores = IndexedAttribute::ALL.iter().map(|a| make(*a)).collect();
        InvertedIndex { attributes, stores }
    }

    pub fn in_memory(attributes: IndexedAttributes) -> Self {
        Self::with_stores(attributes, |_| Box::new(MemoryStore::new()))
    }

    fn store(&self, attribute: IndexedAttribute) -> &dyn OrderedStore {
        self.stores[slot(attribute)].as_ref()
    }

    fn store_mut(&mut self, attribute: IndexedAttribute) -> &mut dyn OrderedStore {
        self.stores[slot(attribute)].as_mut()
    }

    /// Distinct keys `record` contributes to `attribute`'s index.
    pub fn keys_for(&self, record: &Record, attribute: IndexedAttribute) -> Result<Vec<String>> {
        let field = self.attributes.field_for(attribute);
        let value = record.field(field).ok_or_else(|| {
            Error::invariant(format!("record has no field {:?} for the {} index", field, attribute))
        })?;

        let mut keys = value.index_keys();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    fn plan(&self, record: &Record) -> Result<KeyPlan> {
        IndexedAttribute::ALL
            .iter()
            .map(|attribute| Ok((*attribute, self.keys_for(record, *attribute)?)))
            .collect()
    }

    /// Fails if `record` lacks a field one of the indexes is keyed on.
    pub fn check_record(&self, record: &Record) -> Result<()> {
        self.plan(record).map(|_| ())
    }

    pub fn add(&mut self, record: &Record, record_id: RecordId) -> Result<()> {
        let plan = self.plan(record)?;
        let result = self.add_planned(&plan, record_id);
        self.finish(result)
    }

    /// Removes `record_id` from the postings of `last_known`. Without a
    /// readable record every key of every substore is scanned.
    pub fn remove(&mut self, record_id: RecordId, last_known: Option<&Record>) -> Result<()> {
        let result = match last_known {
            Some(record) => {
                let plan = self.plan(record)?;
                self.remove_planned(&plan, record_id)
            }
            None => self.purge(record_id),
        };
        self.finish(result)
    }

    pub fn update(&mut self, record_id: RecordId, old: Option<&Record>, new: &Record) -> Result<()> {
        let new_plan = self.plan(new)?;
        let result = match old {
            Some(old) => {
                let old_plan = self.plan(old)?;
                self.remove_planned(&old_plan, record_id)
            }
            None => self.purge(record_id),
        }
        .and_then(|_| self.add_planned(&new_plan, record_id));
        self.finish(result)
    }

    /// Ids filed under `value`. Count values are compared in canonical form.
    pub fn lookup(&self, attribute: IndexedAttribute, value: &str) -> Vec<RecordId> {
        let key = match attribute {
            IndexedAttribute::Count => normalize_number_key(value),
            _ => value.trim().to_string(),
        };
        self.postings(attribute, &key)
            .map(PostingList::into_ids)
            .unwrap_or_default()
    }

    pub fn postings(&self, attribute: IndexedAttribute, key: &str) -> Option<PostingList> {
        self.store(attribute).get(key)
    }

    /// Snapshot of `attribute`'s keys, safe to hold across mutations.
    pub fn keys(&self, attribute: IndexedAttribute) -> Vec<String> {
        self.store(attribute).keys().map(str::to_string).collect()
    }

    pub fn key_count(&self, attribute: IndexedAttribute) -> usize {
        self.store(attribute).len()
    }

    /// Every `(attribute, key)` whose posting list holds `record_id`.
    pub fn keys_referencing(&self, record_id: RecordId) -> Vec<(IndexedAttribute, String)> {
        let mut found = Vec::new();
        for attribute in IndexedAttribute::ALL {
            let store = self.store(attribute);
            for key in store.keys() {
                if store.get(key).is_some_and(|list| list.contains(record_id)) {
                    found.push((attribute, key.to_string()));
                }
            }
        }
        found
    }

    pub fn clear(&mut self) -> Result<()> {
        let mut result = Ok(());
        for store in &mut self.stores {
            result = result.and(store.clear());
        }
        self.finish(result)
    }

    pub fn compact(&mut self) -> Result<()> {
        for store in &mut self.stores {
            store.compact()?;
        }
        Ok(())
    }

    /// Syncs every substore, returning the first failure.
    pub fn sync(&mut self) -> Result<()> {
        let mut result = Ok(());
        for store in &mut self.stores {
            let synced = store.sync();
            result = result.and(synced);
        }
        result
    }

    fn add_planned(&mut self, plan: &KeyPlan, record_id: RecordId) -> Result<()> {
        for (attribute, keys) in plan {
            let store = self.store_mut(*attribute);
            for key in keys {
                let mut list = store.get(key).unwrap_or_default();
                if list.insert(record_id) {
                    store.put(key, &list)?;
                }
            }
        }
        Ok(())
    }

    fn remove_planned(&mut self, plan: &KeyPlan, record_id: RecordId) -> Result<()> {
        for (attribute, keys) in plan {
            let store = self.store_mut(*attribute);
            for key in keys {
                remove_from_key(store, key, record_id)?;
            }
        }
        Ok(())
    }

    fn purge(&mut self, record_id: RecordId) -> Result<()> {
        debug!(record_id = record_id.0, "purging id from every inverted key");
        for store in &mut self.stores {
            let keys: Vec<String> = store.keys().map(str::to_string).collect();
            for key in &keys {
                remove_from_key(store.as_mut(), key, record_id)?;
            }
        }
        Ok(())
    }

    fn finish(&mut self, result: Result<()>) -> Result<()> {
        let synced = self.sync();
        result.and(synced)
    }
}

fn remove_from_key(store: &mut dyn OrderedStore, key: &str, record_id: RecordId) -> Result<()> {
    let Some(mut list) = store.get(key) else {
        return Ok(());
    };
    if list.remove(record_id) {
        // an emptied list drops the key
        store.put(key, &list)?;
    }
    Ok(())
}
