use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::core::error::{Error, Result};
use crate::core::types::{RecordId, SyncMode};
use crate::storage::frame::{FrameHeader, HEADER_SIZE};

/// Append-only file of record frames, addressed by byte offset.
pub struct PrimaryLog {
    path: PathBuf,
    file: File,
    len: u64,
    sync_mode: SyncMode,
}

impl PrimaryLog {
    pub fn open(path: &Path, sync_mode: SyncMode) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Not opened in append mode: tombstones and in-place updates write
        // behind the end.
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();

        Ok(PrimaryLog {
            path: path.to_path_buf(),
            file,
            len,
            sync_mode,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current end of log, which is where the next frame lands.
    pub fn end_offset(&self) -> u64 {
        self.len
    }

    /// Writes `frame` at the end of the log and returns its offset.
    pub fn append(&mut self, frame: &[u8]) -> Result<u64> {
        let offset = self.len;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(frame)?;
        self.after_write()?;

        self.len += frame.len() as u64;
        debug!(offset, bytes = frame.len(), "appended frame");
        Ok(offset)
    }

    /// Reads the whole frame starting at `offset`. A header whose size runs
    /// past the end of the log is a `ReadError`.
    pub fn read(&mut self, offset: u64) -> Result<Vec<u8>> {
        let header = self.read_header(offset)?;
        let frame_len = header.frame_len();
        if offset.saturating_add(frame_len) > self.len {
            return Err(Error::read_error(format!(
                "{}: frame at offset {} claims {} bytes but the log ends at {}",
                self.path.display(),
                offset,
                frame_len,
                self.len
            )));
        }

        let mut frame = vec![0u8; frame_len as usize];
        frame[..HEADER_SIZE].copy_from_slice(&header.encode());
        self.file
            .read_exact(&mut frame[HEADER_SIZE..])
            .map_err(|e| self.read_failure(offset, frame_len, e))?;

        Ok(frame)
    }

    pub fn read_header(&mut self, offset: u64) -> Result<FrameHeader> {
        let mut buf = [0u8; HEADER_SIZE];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file
            .read_exact(&mut buf)
            .map_err(|e| self.read_failure(offset, HEADER_SIZE as u64, e))?;
        FrameHeader::decode(&buf)
    }

    /// Rewrites the header at `offset` as a tombstone. The stored record id is
    /// kept; `payload_size` stays the size the frame was written with.
    pub fn mark_invalid(&mut self, offset: u64, payload_size: u32) -> Result<()> {
        let mut id_buf = [0u8; 4];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file
            .read_exact(&mut id_buf)
            .map_err(|e| self.read_failure(offset, 4, e))?;
        let record_id = RecordId(u32::from_be_bytes(id_buf));

        let header = FrameHeader::tombstone(record_id, payload_size);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&header.encode())?;
        self.after_write()?;

        debug!(offset, record_id = record_id.0, "tombstoned frame");
        Ok(())
    }

    /// Overwrites the frame at `offset` with `frame`, zero-filling the rest of
    /// the old `footprint`. Caller guarantees `frame.len() <= footprint`.
    pub fn overwrite(&mut self, offset: u64, frame: &[u8], footprint: u64) -> Result<()> {
        debug_assert!(frame.len() as u64 <= footprint);

        let mut block = Vec::with_capacity(footprint as usize);
        block.extend_from_slice(frame);
        block.resize(footprint as usize, 0);

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&block)?;
        self.after_write()?;

        self.len = self.len.max(offset + footprint);
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    fn after_write(&mut self) -> Result<()> {
        self.file.flush()?;
        if self.sync_mode == SyncMode::Immediate {
            self.file.sync_data()?;
        }
        Ok(())
    }

    fn read_failure(&self, offset: u64, wanted: u64, err: io::Error) -> Error {
        Error::read_error(format!(
            "{}: reading {} bytes at offset {}: {}",
            self.path.display(),
            wanted,
            offset,
            err
        ))
    }
}
