use std::collections::BTreeSet;
use std::fs;
use std::io::BufRead;
use std::path::Path;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::record::Record;
use crate::core::stats::ManagerStats;
use crate::core::types::{IndexedAttribute, RecordId};
use crate::index::inverted::InvertedIndex;
use crate::search::scanner::MultiPatternScanner;
use crate::storage::file_lock::FileLock;
use crate::storage::frame::{self, DecodedFrame, FrameStatus};
use crate::storage::layout::StorageLayout;
use crate::storage::primary_index::{IndexSlot, PrimaryIndex};
use crate::storage::primary_log::PrimaryLog;

/// Outcome of a CSV import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: Vec<RecordId>,
    /// 1-based line numbers of rows that could not be stored.
    pub skipped: Vec<usize>,
}

/// Owns the primary log, the primary index and the inverted indexes of one
/// data directory. Callers must serialize access.
pub struct RecordManager {
    config: Config,
    layout: StorageLayout,

    log: PrimaryLog,
    index: PrimaryIndex,
    inverted: InvertedIndex,

    opened_at: DateTime<Utc>,
    _lock: FileLock, // released on drop
}

impl RecordManager {
    pub fn open(config: Config) -> Result<Self> {
        let layout = StorageLayout::new(&config)?;
        let lock = FileLock::acquire(&layout.lock_path())?;

        let log = PrimaryLog::open(&layout.log_path, config.sync_mode)?;
        let index = PrimaryIndex::open(&layout.primary_index_path, config.sync_mode)?;
        let inverted =
            InvertedIndex::open(&layout, config.indexed_attributes.clone(), config.sync_mode)?;

        info!(
            log = %layout.log_path.display(),
            records = index.valid_count(),
            next_id = index.issued_ids(),
            log_bytes = log.end_offset(),
            "record manager opened"
        );

        Ok(RecordManager {
            config,
            layout,
            log,
            index,
            inverted,
            opened_at: Utc::now(),
            _lock: lock,
        })
    }

    pub fn inverted(&self) -> &InvertedIndex {
        &self.inverted
    }

    // 1. validate (nothing written on failure)
    // 2. log append      -> offset
    // 3. index append    (id, offset, valid)
    // 4. inverted add
    pub fn add(&mut self, record: &Record) -> Result<RecordId> {
        record.validate()?;
        self.inverted.check_record(record)?;

        let record_id = self
            .index
            .next_id()
            .ok_or_else(|| Error::invariant("record id space exhausted"))?;
        let frame = frame::encode(record_id, record, true)?;
        let offset = self.log.append(&frame)?;
        self.index.append(record_id, offset, true)?;
        self.inverted.add(record, record_id)?;

        debug!(record_id = record_id.0, offset, "record added");
        Ok(record_id)
    }

    /// Adds `records` in order. Stops at the first record that fails; the ones
    /// before it stay stored.
    pub fn add_many<'a, I>(&mut self, records: I) -> Result<Vec<RecordId>>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut ids = Vec::new();
        for (position, record) in records.into_iter().enumerate() {
            let id = self.add(record).map_err(|e| {
                Error::new(e.kind, format!("record #{} of batch: {}", position, e.context))
            })?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Stores every `;`-separated row of `reader`. Rows that are not UTF-8,
    /// do not parse or do not validate are skipped; storage failures abort
    /// the import.
    pub fn import_csv<R: BufRead>(&mut self, reader: R, has_header: bool) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        for (number, raw) in reader.split(b'\n').enumerate() {
            let raw = raw?;
            let line_number = number + 1;
            if has_header && number == 0 {
                continue;
            }

            let line = match String::from_utf8(raw) {
                Ok(line) => line,
                Err(e) => {
                    warn!(line = line_number, error = %e, "skipping csv row that is not utf-8");
                    summary.skipped.push(line_number);
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let record = match Record::from_csv_row(&line) {
                Ok(record) => record,
                Err(e) => {
                    warn!(line = line_number, error = %e, "skipping csv row");
                    summary.skipped.push(line_number);
                    continue;
                }
            };

            match self.add(&record) {
                Ok(id) => summary.added.push(id),
                Err(e) if e.kind == ErrorKind::InvariantViolation => {
                    warn!(line = line_number, error = %e, "skipping csv row");
                    summary.skipped.push(line_number);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            added = summary.added.len(),
            skipped = summary.skipped.len(),
            "csv import finished"
        );
        Ok(summary)
    }

    pub fn get(&mut self, record_id: RecordId) -> Result<Option<Record>> {
        let Some(slot) = self.live_slot(record_id) else {
            return Ok(None);
        };
        let decoded = self.read_frame(slot.offset)?;
        Ok(checked(record_id, slot.offset, decoded))
    }

    pub fn delete(&mut self, record_id: RecordId) -> Result<bool> {
        let Some(slot) = self.live_slot(record_id) else {
            return Ok(false);
        };
        let header = match self.log.read_header(slot.offset) {
            Ok(header) => Some(header),
            Err(e) if unreadable(&e) => {
                warn!(record_id = record_id.0, error = %e, "frame header unreadable; skipping tombstone");
                None
            }
            Err(e) => return Err(e),
        };

        // Best effort: without the old record the postings are purged by scan.
        let old = if header.is_none() {
            None
        } else {
            match self.read_frame(slot.offset) {
                Ok(decoded) => checked(record_id, slot.offset, decoded),
                Err(e) if unreadable(&e) => {
                    warn!(record_id = record_id.0, error = %e, "deleting unreadable record");
                    None
                }
                Err(e) => return Err(e),
            }
        };

        if let Some(header) = header {
            self.log.mark_invalid(slot.offset, header.payload_size)?;
        }
        self.index.mark_invalid(record_id)?;
        self.inverted.remove(record_id, old.as_ref())?;

        debug!(record_id = record_id.0, offset = slot.offset, "record deleted");
        Ok(true)
    }

    /// Replaces a valid, readable record. Returns false when `record_id` is
    /// unknown, deleted or unreadable.
    pub fn update(&mut self, record_id: RecordId, record: &Record) -> Result<bool> {
        record.validate()?;
        self.inverted.check_record(record)?;

        let Some(slot) = self.live_slot(record_id) else {
            return Ok(false);
        };
        let old_header = self.log.read_header(slot.offset)?;
        let old = match self.read_frame(slot.offset) {
            Ok(decoded) => checked(record_id, slot.offset, decoded),
            Err(e) if unreadable(&e) => None,
            Err(e) => return Err(e),
        };
        let Some(old) = old else {
            warn!(record_id = record_id.0, "refusing to update unreadable record");
            return Ok(false);
        };

        let frame = frame::encode(record_id, record, true)?;
        let footprint = old_header.frame_len();

        let offset = if frame.len() as u64 <= footprint {
            self.log.overwrite(slot.offset, &frame, footprint)?;
            debug!(record_id = record_id.0, offset = slot.offset, "updated in place");
            slot.offset
        } else {
            let offset = self.log.append(&frame)?;
            self.log.mark_invalid(slot.offset, old_header.payload_size)?;
            debug!(record_id = record_id.0, from = slot.offset, to = offset, "relocated record");
            offset
        };

        self.index.append(record_id, offset, true)?;
        self.inverted.update(record_id, Some(&old), record)?;
        Ok(true)
    }

    /// Ids filed under `value` for `attribute`, ascending.
    pub fn lookup_by(&self, attribute: IndexedAttribute, value: &str) -> Vec<RecordId> {
        self.inverted.lookup(attribute, value)
    }

    /// Like `lookup_by`, resolving each id. Ids that no longer resolve are
    /// left out.
    pub fn lookup_records(
        &mut self,
        attribute: IndexedAttribute,
        value: &str,
    ) -> Result<Vec<(RecordId, Record)>> {
        let ids = self.lookup_by(attribute, value);
        self.resolve(ids)
    }

    /// Ids of records whose text attribute has a value containing any of
    /// `patterns`.
    pub fn search_text_attribute<I, S>(&self, patterns: I) -> Result<BTreeSet<RecordId>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let scanner = MultiPatternScanner::new(patterns)?;
        Ok(scanner.run_over_text_index(&self.inverted))
    }

    pub fn iter_valid_ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.index.valid_ids()
    }

    /// Every readable valid record in id order. Corrupt or malformed frames
    /// are logged and left out.
    pub fn iter_valid_records(&mut self) -> Result<Vec<(RecordId, Record)>> {
        let ids: Vec<RecordId> = self.index.valid_ids().collect();
        self.resolve(ids)
    }

    /// Primary-index slot of `record_id`, deleted ids included.
    pub fn offset_of(&self, record_id: RecordId) -> Option<u64> {
        self.index.lookup(record_id).map(|slot| slot.offset)
    }

    /// Where the next appended frame will start.
    pub fn end_of_log(&self) -> u64 {
        self.log.end_offset()
    }

    /// Empties the four substores and refiles every readable valid record.
    /// Returns how many records were indexed.
    pub fn rebuild_inverted(&mut self) -> Result<usize> {
        self.inverted.clear()?;

        let records = self.iter_valid_records()?;
        for (record_id, record) in &records {
            self.inverted.add(record, *record_id)?;
        }

        info!(records = records.len(), "inverted indexes rebuilt");
        Ok(records.len())
    }

    pub fn stats(&self) -> Result<ManagerStats> {
        let valid = self.index.valid_count();
        Ok(ManagerStats {
            opened_at: self.opened_at,
            next_id: self.index.issued_ids(),
            valid_records: valid,
            invalid_records: self.index.len() - valid,
            log_size_bytes: file_size(&self.layout.log_path)?,
            primary_index_size_bytes: file_size(&self.layout.primary_index_path)?,
            text_keys: self.inverted.key_count(IndexedAttribute::Text),
            count_keys: self.inverted.key_count(IndexedAttribute::Count),
            lighting_keys: self.inverted.key_count(IndexedAttribute::Lighting),
            severity_keys: self.inverted.key_count(IndexedAttribute::Severity),
        })
    }

    pub fn sync(&mut self) -> Result<()> {
        self.log.sync()?;
        self.index.sync()?;
        self.inverted.sync()
    }

    /// Flushes everything and releases the directory lock.
    pub fn close(mut self) -> Result<()> {
        if self.config.compact_substores_on_close {
            self.inverted.compact()?;
        }
        self.sync()?;

        info!(
            log = %self.layout.log_path.display(),
            records = self.index.valid_count(),
            "record manager closed"
        );
        Ok(())
    }

    fn live_slot(&self, record_id: RecordId) -> Option<IndexSlot> {
        self.index.lookup(record_id).filter(|slot| slot.valid)
    }

    fn read_frame(&mut self, offset: u64) -> Result<DecodedFrame> {
        let bytes = self.log.read(offset)?;
        frame::decode(&bytes)
    }

    fn resolve(&mut self, ids: Vec<RecordId>) -> Result<Vec<(RecordId, Record)>> {
        let mut records = Vec::with_capacity(ids.len());
        for record_id in ids {
            match self.get(record_id) {
                Ok(Some(record)) => records.push((record_id, record)),
                Ok(None) => {}
                Err(e) if unreadable(&e) => {
                    warn!(record_id = record_id.0, error = %e, "skipping unreadable record");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }
}

/// The record of a decoded frame, if it is valid and belongs to `record_id`.
fn checked(record_id: RecordId, offset: u64, decoded: DecodedFrame) -> Option<Record> {
    if decoded.record_id != record_id {
        warn!(
            record_id = record_id.0,
            found = decoded.record_id.0,
            offset,
            "primary index points at another record's frame"
        );
        return None;
    }
    match decoded.status {
        FrameStatus::Valid => decoded.record,
        FrameStatus::Corrupt => {
            warn!(record_id = record_id.0, offset, "checksum mismatch");
            None
        }
        FrameStatus::Tombstone => None,
    }
}

/// Failures confined to one frame: a damaged header or payload.
fn unreadable(err: &Error) -> bool {
    matches!(
        err.kind,
        ErrorKind::MalformedPayload | ErrorKind::ReadError | ErrorKind::ShortRead
    )
}

fn file_size(path: &Path) -> Result<u64> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}
