use crate::core::error::{Error, Result};
use crate::core::types::RecordId;

/// Sorted, duplicate-free list of record ids for one inverted key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingList {
    pub ids: Vec<RecordId>, // ascending
}

impl PostingList {
    pub fn new() -> Self {
        PostingList { ids: Vec::new() }
    }

    pub fn from_ids(mut ids: Vec<RecordId>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        PostingList { ids }
    }

    /// Inserts keeping order. Returns false when the id was already there.
    pub fn insert(&mut self, id: RecordId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(_) => false,
            Err(pos) => {
                self.ids.insert(pos, id);
                true
            }
        }
    }

    /// Returns false when the id was not there.
    pub fn remove(&mut self, id: RecordId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(pos) => {
                self.ids.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn into_ids(self) -> Vec<RecordId> {
        self.ids
    }

    /// Delta encoding: first id as 4 LE bytes, then varint gaps.
    pub fn encode(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(4 + self.ids.len());
        let Some(first) = self.ids.first() else {
            return output;
        };
        output.extend_from_slice(&first.0.to_le_bytes());

        for pair in self.ids.windows(2) {
            encode_varint(&mut output, pair[1].0 - pair[0].0);
        }
        output
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(PostingList::new());
        }
        if data.len() < 4 {
            return Err(Error::index_error("posting list shorter than its first id"));
        }

        let first = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let mut ids = vec![RecordId(first)];
        let mut prev = first;
        let mut pos = 4;

        while pos < data.len() {
            let (delta, consumed) = decode_varint(&data[pos..])?;
            if delta == 0 {
                return Err(Error::index_error("posting list is not strictly ascending"));
            }
            prev = prev
                .checked_add(delta)
                .ok_or_else(|| Error::index_error("posting list id overflow"))?;
            ids.push(RecordId(prev));
            pos += consumed;
        }

        Ok(PostingList { ids })
    }
}

/// Values < 128 use 1 byte, < 16384 use 2 bytes, etc.
fn encode_varint(output: &mut Vec<u8>, mut value: u32) {
    while value >= 128 {
        output.push((value & 127) as u8 | 128); // continuation bit
        value >>= 7;
    }
    output.push(value as u8);
}

fn decode_varint(input: &[u8]) -> Result<(u32, usize)> {
    let mut value = 0u32;
    let mut shift = 0;

    for (i, &byte) in input.iter().enumerate() {
        value |= ((byte & 127) as u32) << shift;
        if byte & 128 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
        if shift > 28 {
            return Err(Error::index_error("varint overflow"));
        }
    }

    Err(Error::index_error("incomplete varint"))
}
