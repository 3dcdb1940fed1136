use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};
use crate::core::error::{Error, Result};
use crate::core::types::{RecordId, SyncMode};

pub const ENTRY_SIZE: usize = 4 + 1 + 8;

/// One fixed-width entry of the index file. The last entry for an id wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub record_id: RecordId,
    pub valid: bool,
    pub offset: u64,
}

impl IndexEntry {
    pub fn encode(&self) -> [u8; ENTRY_SIZE] {
        let mut buf = [0u8; ENTRY_SIZE];
        buf[..4].copy_from_slice(&self.record_id.0.to_be_bytes());
        buf[4] = self.valid as u8;
        buf[5..].copy_from_slice(&self.offset.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < ENTRY_SIZE {
            return Err(Error::short_read(format!(
                "index entry needs {} bytes, got {}",
                ENTRY_SIZE,
                buf.len()
            )));
        }

        let mut offset = [0u8; 8];
        offset.copy_from_slice(&buf[5..ENTRY_SIZE]);

        Ok(IndexEntry {
            record_id: RecordId(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])),
            valid: buf[4] != 0,
            offset: u64::from_be_bytes(offset),
        })
    }
}

/// In-memory slot for one id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSlot {
    pub offset: u64,
    pub valid: bool,
}

/// `record_id -> (offset, valid)`, persisted as an append-only entry file and
/// rebuilt by replay on open.
pub struct PrimaryIndex {
    file: File,
    slots: BTreeMap<RecordId, IndexSlot>,
    // one past the highest id seen; reaches 2^32 once u32::MAX is used
    next_id: u64,
    sync_mode: SyncMode,
}

impl PrimaryIndex {
    pub fn open(path: &Path, sync_mode: SyncMode) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut slots = BTreeMap::new();
        let mut next_id = 0u64;

        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut replayed = 0usize;
        for chunk in data.chunks(ENTRY_SIZE) {
            let entry = match IndexEntry::decode(chunk) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        entries = replayed,
                        error = %e,
                        "primary index truncated mid-entry; stopping replay"
                    );
                    break;
                }
            };

            slots.insert(entry.record_id, IndexSlot { offset: entry.offset, valid: entry.valid });
            next_id = next_id.max(u64::from(entry.record_id.0) + 1);
            replayed += 1;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        // Drop a torn tail so later appends stay entry-aligned.
        let intact_len = (replayed * ENTRY_SIZE) as u64;
        if (data.len() as u64) > intact_len {
            file.set_len(intact_len)?;
        }

        info!(path = %path.display(), entries = replayed, ids = slots.len(), next_id, "primary index loaded");

        Ok(PrimaryIndex {
            file,
            slots,
            next_id,
            sync_mode,
        })
    }

    /// Id the next `add` will receive, or `None` once the id space is used up.
    pub fn next_id(&self) -> Option<RecordId> {
        u32::try_from(self.next_id).ok().map(RecordId)
    }

    /// How many ids have been handed out so far.
    pub fn issued_ids(&self) -> u64 {
        self.next_id
    }

    pub fn append(&mut self, record_id: RecordId, offset: u64, valid: bool) -> Result<()> {
        let entry = IndexEntry { record_id, valid, offset };
        self.file.write_all(&entry.encode())?;
        self.file.flush()?;
        if self.sync_mode == SyncMode::Immediate {
            self.file.sync_data()?;
        }

        self.slots.insert(record_id, IndexSlot { offset, valid });
        self.next_id = self.next_id.max(u64::from(record_id.0) + 1);
        Ok(())
    }

    pub fn lookup(&self, record_id: RecordId) -> Option<IndexSlot> {
        self.slots.get(&record_id).copied()
    }

    /// Flags `record_id` invalid and appends a matching entry so replay agrees.
    /// Returns false when the id is unknown.
    pub fn mark_invalid(&mut self, record_id: RecordId) -> Result<bool> {
        let Some(slot) = self.lookup(record_id) else {
            return Ok(false);
        };
        self.append(record_id, slot.offset, false)?;
        Ok(true)
    }

    /// Valid ids in ascending order.
    pub fn valid_ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.valid)
            .map(|(id, _)| *id)
    }

    /// Every id ever seen, valid or not.
    pub fn known_ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.slots.keys().copied()
    }

    pub fn valid_count(&self) -> usize {
        self.slots.values().filter(|slot| slot.valid).count()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}
