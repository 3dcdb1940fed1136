//! Ordered `key -> posting list` maps backing the inverted indexes.
//!
//! [`LogStore`] keeps the map in memory and persists every mutation as one
//! entry appended to its file:
//!
//! ```text
//! [ body_len u32 LE ][ crc32(body) u32 LE ][ body = bincode(StoreOp) ]
//! ```
//!
//! Replay applies entries in order and stops at the first torn or damaged one.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::core::error::{Error, Result};
use crate::core::types::SyncMode;
use crate::index::posting::PostingList;

const ENTRY_HEADER: usize = 8;
const MAX_ENTRY: usize = 64 * 1024 * 1024;

/// Operations the inverted layer needs from a substore.
pub trait OrderedStore: Send {
    fn get(&self, key: &str) -> Option<PostingList>;

    /// Replaces the posting list of `key`. An empty list deletes the key.
    fn put(&mut self, key: &str, postings: &PostingList) -> Result<()>;

    /// Returns false when the key was absent.
    fn delete(&mut self, key: &str) -> Result<bool>;

    /// Keys in ascending order.
    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes every mutation so far durable.
    fn sync(&mut self) -> Result<()>;

    /// Drops every key.
    fn clear(&mut self) -> Result<()>;

    /// Rewrites backing storage to hold only live keys.
    fn compact(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
enum StoreOp {
    Put { key: String, postings: Vec<u8> },
    Delete { key: String },
}

pub struct LogStore {
    path: PathBuf,
    file: File,
    map: BTreeMap<String, PostingList>,
    sync_mode: SyncMode,
    dirty: bool,
}

impl LogStore {
    pub fn open(path: &Path, sync_mode: SyncMode) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_failure(path, "create parent of", e))?;
        }

        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(io_failure(path, "read", e)),
        };

        let mut map = BTreeMap::new();
        let mut pos = 0usize;
        let mut applied = 0usize;
        while pos < data.len() {
            let replayed = read_entry(&data[pos..])
                .and_then(|(op, used)| apply(&mut map, op).map(|_| used));
            match replayed {
                Ok(used) => {
                    pos += used;
                    applied += 1;
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        offset = pos,
                        entries = applied,
                        error = %e,
                        "substore has a damaged tail; stopping replay"
                    );
                    break;
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| io_failure(path, "open", e))?;
        if pos < data.len() {
            file.set_len(pos as u64).map_err(|e| io_failure(path, "truncate", e))?;
        }

        debug!(path = %path.display(), entries = applied, keys = map.len(), "substore loaded");

        Ok(LogStore {
            path: path.to_path_buf(),
            file,
            map,
            sync_mode,
            dirty: false,
        })
    }

    fn write_op(&mut self, op: &StoreOp) -> Result<()> {
        let entry = encode_entry(op)?;
        self.file
            .write_all(&entry)
            .and_then(|_| self.file.flush())
            .map_err(|e| io_failure(&self.path, "append to", e))?;
        self.dirty = true;
        Ok(())
    }
}

impl OrderedStore for LogStore {
    fn get(&self, key: &str) -> Option<PostingList> {
        self.map.get(key).cloned()
    }

    fn put(&mut self, key: &str, postings: &PostingList) -> Result<()> {
        if postings.is_empty() {
            self.delete(key)?;
            return Ok(());
        }

        self.write_op(&StoreOp::Put {
            key: key.to_string(),
            postings: postings.encode(),
        })?;
        self.map.insert(key.to_string(), postings.clone());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        if !self.map.contains_key(key) {
            return Ok(false);
        }

        self.write_op(&StoreOp::Delete { key: key.to_string() })?;
        self.map.remove(key);
        Ok(true)
    }

    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.map.keys().map(String::as_str))
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn sync(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        self.file.flush().map_err(|e| io_failure(&self.path, "flush", e))?;
        if self.sync_mode == SyncMode::Immediate {
            self.file.sync_data().map_err(|e| io_failure(&self.path, "sync", e))?;
        }
        self.dirty = false;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.file.set_len(0).map_err(|e| io_failure(&self.path, "truncate", e))?;
        self.map.clear();
        self.dirty = true;
        Ok(())
    }

    fn compact(&mut self) -> Result<()> {
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".compact");
        let tmp_path = PathBuf::from(tmp_name);

        {
            let tmp = File::create(&tmp_path).map_err(|e| io_failure(&tmp_path, "create", e))?;
            let mut writer = BufWriter::new(tmp);
            for (key, postings) in &self.map {
                let entry = encode_entry(&StoreOp::Put {
                    key: key.clone(),
                    postings: postings.encode(),
                })?;
                writer.write_all(&entry).map_err(|e| io_failure(&tmp_path, "write", e))?;
            }
            let tmp = writer
                .into_inner()
                .map_err(|e| io_failure(&tmp_path, "flush", e.into_error()))?;
            tmp.sync_all().map_err(|e| io_failure(&tmp_path, "sync", e))?;
        }

        fs::rename(&tmp_path, &self.path).map_err(|e| io_failure(&self.path, "replace", e))?;
        sync_parent_dir(&self.path)?;
        self.file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| io_failure(&self.path, "reopen", e))?;
        self.dirty = false;

        debug!(path = %self.path.display(), keys = self.map.len(), "substore compacted");
        Ok(())
    }
}

/// Volatile substore. Same semantics as [`LogStore`] without a file.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: BTreeMap<String, PostingList>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl OrderedStore for MemoryStore {
    fn get(&self, key: &str) -> Option<PostingList> {
        self.map.get(key).cloned()
    }

    fn put(&mut self, key: &str, postings: &PostingList) -> Result<()> {
        if postings.is_empty() {
            self.map.remove(key);
        } else {
            self.map.insert(key.to_string(), postings.clone());
        }
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        Ok(self.map.remove(key).is_some())
    }

    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.map.keys().map(String::as_str))
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.map.clear();
        Ok(())
    }
}

fn encode_entry(op: &StoreOp) -> Result<Vec<u8>> {
    let body = bincode::serialize(op)?;

    let mut hasher = Hasher::new();
    hasher.update(&body);
    let crc = hasher.finalize();

    let mut entry = Vec::with_capacity(ENTRY_HEADER + body.len());
    entry.extend_from_slice(&(body.len() as u32).to_le_bytes());
    entry.extend_from_slice(&crc.to_le_bytes());
    entry.extend_from_slice(&body);
    Ok(entry)
}

fn read_entry(data: &[u8]) -> Result<(StoreOp, usize)> {
    if data.len() < ENTRY_HEADER {
        return Err(Error::short_read("substore entry header"));
    }

    let len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let expected = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if len > MAX_ENTRY {
        return Err(Error::index_error(format!("substore entry of {} bytes, possibly corrupted", len)));
    }
    if data.len() < ENTRY_HEADER + len {
        return Err(Error::short_read("substore entry body"));
    }

    let body = &data[ENTRY_HEADER..ENTRY_HEADER + len];
    let mut hasher = Hasher::new();
    hasher.update(body);
    let actual = hasher.finalize();
    if actual != expected {
        return Err(Error::index_error(format!(
            "substore entry crc mismatch: expected {:#010x}, got {:#010x}",
            expected, actual
        )));
    }

    let op: StoreOp = bincode::deserialize(body)?;
    Ok((op, ENTRY_HEADER + len))
}

fn apply(map: &mut BTreeMap<String, PostingList>, op: StoreOp) -> Result<()> {
    match op {
        StoreOp::Put { key, postings } => {
            let postings = PostingList::decode(&postings)?;
            if postings.is_empty() {
                map.remove(&key);
            } else {
                map.insert(key, postings);
            }
        }
        StoreOp::Delete { key } => {
            map.remove(&key);
        }
    }
    Ok(())
}

/// Makes a rename into `path`'s directory durable.
fn sync_parent_dir(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(parent)
        .and_then(|dir| dir.sync_all())
        .map_err(|e| io_failure(parent, "sync directory", e))
}

fn io_failure(path: &Path, action: &str, err: io::Error) -> Error {
    Error::index_error(format!("{} {}: {}", action, path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RecordId;

    fn list(raw: &[u32]) -> PostingList {
        PostingList::from_ids(raw.iter().copied().map(RecordId).collect())
    }

    fn open(path: &Path) -> LogStore {
        LogStore::open(path, SyncMode::Flush).unwrap()
    }

    #[test]
    fn mutations_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inv_lighting");
        {
            let mut store = open(&path);
            store.put("DARK", &list(&[1, 4])).unwrap();
            store.put("DAYLIGHT", &list(&[0])).unwrap();
            store.put("DARK", &list(&[4])).unwrap();
            assert!(store.delete("DAYLIGHT").unwrap());
            assert!(!store.delete("DAYLIGHT").unwrap());
            store.sync().unwrap();
        }

        let store = open(&path);
        assert_eq!(store.get("DARK"), Some(list(&[4])));
        assert_eq!(store.get("DAYLIGHT"), None);
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["DARK"]);
    }

    #[test]
    fn putting_an_empty_list_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir.path().join("inv_text"));
        store.put("PEDESTRIAN", &list(&[2])).unwrap();
        store.put("PEDESTRIAN", &PostingList::new()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn damaged_tail_stops_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inv_count");
        {
            let mut store = open(&path);
            store.put("1", &list(&[0])).unwrap();
            store.put("2", &list(&[1])).unwrap();
        }

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, &bytes).unwrap();

        let mut store = open(&path);
        assert_eq!(store.get("1"), Some(list(&[0])));
        assert_eq!(store.get("2"), None);

        // appends after the trimmed tail replay cleanly
        store.put("3", &list(&[7])).unwrap();
        drop(store);
        let store = open(&path);
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["1", "3"]);
    }

    #[test]
    fn compact_keeps_only_live_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inv_severity");
        let mut store = open(&path);
        for id in 0..50u32 {
            store.put("FATAL", &list(&(0..=id).collect::<Vec<_>>())).unwrap();
        }
        store.put("MINOR", &list(&[3])).unwrap();
        store.delete("MINOR").unwrap();
        let before = fs::metadata(&path).unwrap().len();

        store.compact().unwrap();
        let after = fs::metadata(&path).unwrap().len();
        assert!(after < before);
        assert!(!dir.path().join("inv_severity.compact").exists());
        let mut names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["inv_severity"]);

        store.put("NONE", &list(&[60])).unwrap();
        drop(store);
        let store = open(&path);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("FATAL").unwrap().len(), 50);
        assert_eq!(store.get("NONE"), Some(list(&[60])));
    }

    #[test]
    fn clear_empties_file_and_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inv_text");
        let mut store = open(&path);
        store.put("ANGLE", &list(&[1])).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
        drop(store);
        assert!(open(&path).is_empty());
    }

    #[test]
    fn memory_store_matches_log_store_semantics() {
        let mut store = MemoryStore::new();
        store.put("A", &list(&[1])).unwrap();
        store.put("B", &list(&[2])).unwrap();
        store.put("A", &PostingList::new()).unwrap();
        assert!(!store.delete("A").unwrap());
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["B"]);
    }
}
