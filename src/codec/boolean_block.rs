//! C2.4.3 — boolean block (spec §4.2.3, §3.4).
//!
//! A run-length encoded ordered set of integers, represented as `[from, to]`
//! ranges, each delta-coded against the previous range's `to`.

use crate::codec::varint::{encode_u32, VarintReader};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub from: u32,
    pub to: u32,
}

/// A merge input range: `is_member = false` deletes the range's members
/// (spec §4.2.3, §4.7 tombstones).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRange {
    pub from: u32,
    pub to: u32,
    pub is_member: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BooleanBlock {
    pub ranges: Vec<Range>,
}

impl BooleanBlock {
    pub fn new() -> Self {
        BooleanBlock::default()
    }

    pub fn from_sorted(members: &[u32]) -> Self {
        let mut ranges: Vec<Range> = Vec::new();
        for &m in members {
            match ranges.last_mut() {
                Some(r) if r.to + 1 == m => r.to = m,
                _ => ranges.push(Range { from: m, to: m }),
            }
        }
        BooleanBlock { ranges }
    }

    pub fn block_id(&self) -> u32 {
        self.ranges.last().map(|r| r.to).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ranges.iter().map(|r| (r.to - r.from + 1) as usize).sum()
    }

    pub fn contains(&self, x: u32) -> bool {
        self.ranges
            .binary_search_by(|r| {
                if x < r.from {
                    std::cmp::Ordering::Greater
                } else if x > r.to {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|r| r.from..=r.to)
    }

    /// Apply merge ranges (sorted, non-overlapping, ascending) against this
    /// block's members, producing a new block (spec §4.2.3 `merge`).
    pub fn merge(&self, merges: &[MergeRange]) -> BooleanBlock {
        let mut members: Vec<u32> = self.iter().collect();
        for m in merges {
            if m.is_member {
                for v in m.from..=m.to {
                    if let Err(i) = members.binary_search(&v) {
                        members.insert(i, v);
                    }
                }
            } else {
                members.retain(|&v| v < m.from || v > m.to);
            }
        }
        BooleanBlock::from_sorted(&members)
    }

    pub fn split(&self) -> (BooleanBlock, BooleanBlock) {
        let all: Vec<u32> = self.iter().collect();
        let mid = all.len() / 2;
        (BooleanBlock::from_sorted(&all[..mid]), BooleanBlock::from_sorted(&all[mid..]))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_u32(&mut out, self.ranges.len() as u32);
        let mut prev_to: i64 = -1;
        for r in &self.ranges {
            encode_u32(&mut out, (r.from as i64 - prev_to - 1) as u32);
            encode_u32(&mut out, r.to - r.from);
            prev_to = r.to as i64;
        }
        out
    }

    pub fn decode(data: &[u8]) -> Result<BooleanBlock> {
        let mut r = VarintReader::new(data);
        let count = r.read_u32()? as usize;
        let mut ranges = Vec::with_capacity(count);
        let mut prev_to: i64 = -1;
        for _ in 0..count {
            let from_delta = r.read_u32()? as i64;
            let span = r.read_u32()?;
            let from = (prev_to + 1 + from_delta) as u32;
            let to = from + span;
            ranges.push(Range { from, to });
            prev_to = to as i64;
        }
        Ok(BooleanBlock { ranges })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let b = BooleanBlock::from_sorted(&[1, 2, 3, 7, 8, 20]);
        let bytes = b.encode();
        assert_eq!(BooleanBlock::decode(&bytes).unwrap(), b);
    }

    #[test]
    fn contains_and_iterate() {
        let b = BooleanBlock::from_sorted(&[1, 2, 3, 7, 8, 20]);
        assert!(b.contains(2));
        assert!(b.contains(8));
        assert!(!b.contains(4));
        assert_eq!(b.iter().collect::<Vec<_>>(), vec![1, 2, 3, 7, 8, 20]);
    }

    #[test]
    fn merge_adds_and_deletes() {
        let b = BooleanBlock::from_sorted(&[1, 2, 3]);
        let merged = b.merge(&[
            MergeRange { from: 4, to: 5, is_member: true },
            MergeRange { from: 2, to: 2, is_member: false },
        ]);
        assert_eq!(merged.iter().collect::<Vec<_>>(), vec![1, 3, 4, 5]);
    }

    #[test]
    fn block_id_is_max_member() {
        assert_eq!(BooleanBlock::from_sorted(&[1, 2, 9]).block_id(), 9);
    }
}
