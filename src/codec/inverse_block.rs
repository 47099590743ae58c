//! C2.4.6 — inverse-term block (spec §4.2.6).
//!
//! Per-document listing of every `(typeno, termno, ff, firstpos)` the
//! document contains. Used by delete to find what to retract from the
//! posting chains, and by the document-term iterator.

use crate::codec::varint::{encode_u32, VarintReader};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InverseTermEntry {
    pub type_no: u32,
    pub term_no: u32,
    pub ff: u32,
    pub first_pos: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InverseTermBlock {
    pub entries: Vec<InverseTermEntry>,
}

impl InverseTermBlock {
    pub fn new(entries: Vec<InverseTermEntry>) -> Self {
        InverseTermBlock { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_u32(&mut out, self.entries.len() as u32);
        for e in &self.entries {
            encode_u32(&mut out, e.type_no);
            encode_u32(&mut out, e.term_no);
            encode_u32(&mut out, e.ff);
            encode_u32(&mut out, e.first_pos);
        }
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = VarintReader::new(data);
        let count = r.read_u32()? as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(InverseTermEntry {
                type_no: r.read_u32()?,
                term_no: r.read_u32()?,
                ff: r.read_u32()?,
                first_pos: r.read_u32()?,
            });
        }
        Ok(InverseTermBlock { entries })
    }
}
