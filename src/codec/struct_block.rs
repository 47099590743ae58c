//! C2.4.6 — struct block (spec §4.8 "Structure-bounded variants").
//!
//! One document's `(source, sink)` structure intervals (e.g. sentence or
//! paragraph boundaries), sorted by `source`. Structure-bounded join
//! iterators consume this to reject matches that straddle two intervals.

use crate::codec::varint::{encode_u32, VarintReader};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructBlock {
    /// Sorted, non-overlapping `(source, sink)` position ranges.
    pub intervals: Vec<(u32, u32)>,
}

impl StructBlock {
    pub fn new(intervals: Vec<(u32, u32)>) -> Self {
        StructBlock { intervals }
    }

    /// The interval containing `position`, if any (inclusive `[source,sink]`).
    pub fn containing(&self, position: u32) -> Option<(u32, u32)> {
        self.intervals.iter().copied().find(|&(source, sink)| position >= source && position <= sink)
    }

    /// True if every position in `positions` falls within a single interval.
    pub fn bounds_all(&self, positions: &[u32]) -> bool {
        if positions.is_empty() {
            return false;
        }
        match self.containing(positions[0]) {
            Some((source, sink)) => positions.iter().all(|&p| p >= source && p <= sink),
            None => false,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_u32(&mut out, self.intervals.len() as u32);
        let mut prev_source = 0u32;
        for &(source, sink) in &self.intervals {
            encode_u32(&mut out, source - prev_source);
            encode_u32(&mut out, sink - source);
            prev_source = source;
        }
        out
    }

    pub fn decode(data: &[u8]) -> Result<StructBlock> {
        let mut r = VarintReader::new(data);
        let count = r.read_u32()? as usize;
        let mut intervals = Vec::with_capacity(count);
        let mut prev_source = 0u32;
        for _ in 0..count {
            let source = prev_source + r.read_u32()?;
            let span = r.read_u32()?;
            let sink = source + span;
            if sink < source {
                return Err(Error::corrupt("struct interval sink precedes source"));
            }
            intervals.push((source, sink));
            prev_source = source;
        }
        Ok(StructBlock { intervals })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let block = StructBlock::new(vec![(1, 5), (10, 20)]);
        let bytes = block.encode();
        assert_eq!(StructBlock::decode(&bytes).unwrap(), block);
    }

    #[test]
    fn bounds_all_requires_a_single_containing_interval() {
        let block = StructBlock::new(vec![(1, 5), (10, 20)]);
        assert!(block.bounds_all(&[2, 3, 5]));
        assert!(!block.bounds_all(&[4, 12]));
        assert!(!block.bounds_all(&[100]));
    }
}
