//! C2.4.4 — forward block (spec §4.2.4).
//!
//! An ordered sequence of `(position, term_string)` for one `(type, doc)`.
//! `block_id` is the last position; positions are delta-coded, term strings
//! length-prefixed.

use crate::codec::varint::{append_checksum, encode_u32, verify_checksum, VarintReader};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardBlock {
    pub positions: Vec<u32>,
    pub terms: Vec<String>,
}

impl ForwardBlock {
    pub fn new() -> Self {
        ForwardBlock::default()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn block_id(&self) -> u32 {
        self.positions.last().copied().unwrap_or(0)
    }

    pub fn append(&mut self, position: u32, term: String) -> Result<()> {
        if let Some(&last) = self.positions.last()
            && position <= last {
                return Err(Error::corrupt("non-monotonic forward position append"));
            }
        self.positions.push(position);
        self.terms.push(term);
        Ok(())
    }

    pub fn split(&self) -> (ForwardBlock, ForwardBlock) {
        let mid = self.len() / 2;
        (
            ForwardBlock { positions: self.positions[..mid].to_vec(), terms: self.terms[..mid].to_vec() },
            ForwardBlock { positions: self.positions[mid..].to_vec(), terms: self.terms[mid..].to_vec() },
        )
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_u32(&mut out, self.len() as u32);
        let mut prev = 0u32;
        for (i, (&pos, term)) in self.positions.iter().zip(self.terms.iter()).enumerate() {
            if i == 0 {
                encode_u32(&mut out, pos);
            } else {
                encode_u32(&mut out, pos - prev);
            }
            prev = pos;
            let bytes = term.as_bytes();
            encode_u32(&mut out, bytes.len() as u32);
            out.extend_from_slice(bytes);
        }
        append_checksum(&mut out);
        out
    }

    pub fn decode(data: &[u8]) -> Result<ForwardBlock> {
        let data = verify_checksum(data)?;
        let mut r = VarintReader::new(data);
        let count = r.read_u32()? as usize;
        let mut positions = Vec::with_capacity(count);
        let mut terms = Vec::with_capacity(count);
        let mut prev = 0u32;
        for i in 0..count {
            let v = r.read_u32()?;
            let pos = if i == 0 { v } else { prev + v };
            positions.push(pos);
            prev = pos;
            let len = r.read_u32()? as usize;
            let bytes = r.take(len).ok_or_else(|| Error::corrupt("truncated forward term"))?;
            let term = std::str::from_utf8(bytes).map_err(|_| Error::corrupt("non-utf8 forward term"))?.to_string();
            terms.push(term);
        }
        Ok(ForwardBlock { positions, terms })
    }
}
