//! Record frame codec.
//!
//! ```text
//! [ record_id u32 BE ][ valid u8 ][ sha256(payload) 32B ][ payload_size u32 BE ][ payload ]
//! ```
//!
//! A checksum mismatch is reported as [`FrameStatus::Corrupt`], never as an error,
//! so callers can still see which record the damaged frame belongs to.

use sha2::{Digest, Sha256};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::record::Record;
use crate::core::types::RecordId;

pub const CHECKSUM_SIZE: usize = 32;
pub const HEADER_SIZE: usize = 4 + 1 + CHECKSUM_SIZE + 4;

const VALID_AT: usize = 4;
const CHECKSUM_AT: usize = 5;
const SIZE_AT: usize = CHECKSUM_AT + CHECKSUM_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub record_id: RecordId,
    pub valid: bool,
    pub checksum: [u8; CHECKSUM_SIZE],
    pub payload_size: u32,
}

impl FrameHeader {
    /// Header written over an abandoned frame: invalid, zeroed checksum,
    /// id and size preserved.
    pub fn tombstone(record_id: RecordId, payload_size: u32) -> Self {
        FrameHeader {
            record_id,
            valid: false,
            checksum: [0u8; CHECKSUM_SIZE],
            payload_size,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..VALID_AT].copy_from_slice(&self.record_id.0.to_be_bytes());
        buf[VALID_AT] = self.valid as u8;
        buf[CHECKSUM_AT..SIZE_AT].copy_from_slice(&self.checksum);
        buf[SIZE_AT..].copy_from_slice(&self.payload_size.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::short_read(format!(
                "frame header needs {} bytes, got {}",
                HEADER_SIZE,
                buf.len()
            )));
        }

        let mut checksum = [0u8; CHECKSUM_SIZE];
        checksum.copy_from_slice(&buf[CHECKSUM_AT..SIZE_AT]);

        Ok(FrameHeader {
            record_id: RecordId(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])),
            valid: buf[VALID_AT] != 0,
            checksum,
            payload_size: u32::from_be_bytes([
                buf[SIZE_AT],
                buf[SIZE_AT + 1],
                buf[SIZE_AT + 2],
                buf[SIZE_AT + 3],
            ]),
        })
    }

    /// Total on-disk size of the frame this header starts.
    pub fn frame_len(&self) -> u64 {
        HEADER_SIZE as u64 + self.payload_size as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Valid,
    /// Header says invalid: deleted or relocated.
    Tombstone,
    /// Header says valid but the payload no longer matches its checksum.
    Corrupt,
}

#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub record_id: RecordId,
    /// Always present for `Valid`; best-effort for the other states.
    pub record: Option<Record>,
    pub status: FrameStatus,
    pub consumed: usize,
}

impl DecodedFrame {
    pub fn is_valid(&self) -> bool {
        self.status == FrameStatus::Valid
    }

    /// The record, only when the frame is valid.
    pub fn into_valid_record(self) -> Option<Record> {
        match self.status {
            FrameStatus::Valid => self.record,
            _ => None,
        }
    }
}

pub fn checksum(payload: &[u8]) -> [u8; CHECKSUM_SIZE] {
    let digest = Sha256::digest(payload);
    let mut out = [0u8; CHECKSUM_SIZE];
    out.copy_from_slice(&digest);
    out
}

pub fn encode(record_id: RecordId, record: &Record, valid: bool) -> Result<Vec<u8>> {
    let payload = record.to_payload()?;
    let payload_size = u32::try_from(payload.len()).map_err(|_| {
        Error::new(
            ErrorKind::InvalidInput,
            format!("record {} payload of {} bytes is too large", record_id, payload.len()),
        )
    })?;

    let header = FrameHeader {
        record_id,
        valid,
        checksum: checksum(&payload),
        payload_size,
    };

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

pub fn decode(buf: &[u8]) -> Result<DecodedFrame> {
    let header = FrameHeader::decode(buf)?;
    let end = HEADER_SIZE + header.payload_size as usize;
    if buf.len() < end {
        return Err(Error::short_read(format!(
            "record {} frame needs {} bytes, got {}",
            header.record_id,
            end,
            buf.len()
        )));
    }

    let payload = &buf[HEADER_SIZE..end];
    let intact = checksum(payload) == header.checksum;

    let (status, record) = match (header.valid, intact) {
        (true, true) => (FrameStatus::Valid, Some(Record::from_payload(payload)?)),
        (false, _) => (FrameStatus::Tombstone, Record::from_payload(payload).ok()),
        (true, false) => (FrameStatus::Corrupt, Record::from_payload(payload).ok()),
    };

    Ok(DecodedFrame {
        record_id: header.record_id,
        record,
        status,
        consumed: end,
    })
}
