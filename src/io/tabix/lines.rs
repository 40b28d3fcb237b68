//! Reassembly of newline-terminated records from BGZF block payloads.
//!
//! A record may start in one block and end in a later one. The assembler
//! keeps the unterminated tail of each block in a carry buffer together with
//! the virtual offset of its first byte, and completes it with the leading
//! bytes of the next block fed in.

use crate::io::{Block, VirtualOffset};
use memchr::memchr;

/// One text record and the virtual offset of its first byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    offset: VirtualOffset,
    bytes: Vec<u8>,
}

impl Record {
    pub(crate) fn new(offset: VirtualOffset, bytes: Vec<u8>) -> Self {
        Record { offset, bytes }
    }

    /// Virtual offset of the record's first byte
    pub fn offset(&self) -> VirtualOffset {
        self.offset
    }

    /// Raw bytes of the record, without the terminating newline
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the record and return its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl AsRef<[u8]> for Record {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Splits block payloads into records, carrying partial records forward
#[derive(Debug, Default)]
pub(crate) struct LineAssembler {
    carry: Vec<u8>,
    carry_start: Option<VirtualOffset>,
}

impl LineAssembler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Virtual offset of the pending partial record, if any
    pub(crate) fn partial_start(&self) -> Option<VirtualOffset> {
        self.carry_start
    }

    /// Feed `block`'s payload from position `from` and collect every record
    /// completed by it, in order.
    pub(crate) fn push(&mut self, block: &Block, from: usize, out: &mut Vec<Record>) {
        let data = block.data();
        let mut pos = from.min(data.len());

        while pos < data.len() {
            let start = *self
                .carry_start
                .get_or_insert_with(|| block.virtual_offset(pos));

            match memchr(b'\n', &data[pos..]) {
                Some(len) => {
                    let mut bytes = std::mem::take(&mut self.carry);
                    bytes.extend_from_slice(&data[pos..pos + len]);
                    self.carry_start = None;
                    out.push(Record::new(start, bytes));
                    pos += len + 1;
                }
                None => {
                    self.carry.extend_from_slice(&data[pos..]);
                    pos = data.len();
                }
            }
        }
    }

    /// Take the unterminated tail at end of input
    pub(crate) fn finish(&mut self) -> Option<Record> {
        let start = self.carry_start.take()?;
        Some(Record::new(start, std::mem::take(&mut self.carry)))
    }

    /// Drop any partial record
    pub(crate) fn clear(&mut self) {
        self.carry.clear();
        self.carry_start = None;
    }
}
