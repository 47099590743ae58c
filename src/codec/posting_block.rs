//! C2.4.2 — posting block (spec §4.2.2, §3.3).
//!
//! Logical content: an ordered sequence of `(docno, positions)`. The on-disk
//! form delta-codes the docno stream and the per-document position stream,
//! with a sparse index strip (one entry every [`INDEX_STRIDE`] documents)
//! recording the byte offset of that document's position-stream entry, so a
//! seek can binary-search the strip instead of decoding the whole block.

use crate::codec::varint::{append_checksum, encode_u32, verify_checksum, VarintReader};
use crate::error::{Error, Result};

/// One strip entry per this many documents.
pub const INDEX_STRIDE: usize = 16;

/// A decoded posting block: the in-memory working representation used by
/// the merge writer (C7) and the iterator algebra (C8). `positions[i].is_empty()`
/// marks doc `doc_ids[i]` as a tombstone (spec §4.2.2 `empty_at`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingBlock {
    pub doc_ids: Vec<u32>,
    pub positions: Vec<Vec<u32>>,
}

impl PostingBlock {
    pub fn new() -> Self {
        PostingBlock::default()
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// `block_id` per spec §3.2: the max docno stored in the block.
    pub fn block_id(&self) -> u32 {
        self.doc_ids.last().copied().unwrap_or(0)
    }

    pub fn first_doc(&self) -> Option<usize> {
        if self.doc_ids.is_empty() { None } else { Some(0) }
    }

    pub fn next_doc(&self, cursor: usize) -> Option<usize> {
        let next = cursor + 1;
        if next < self.doc_ids.len() { Some(next) } else { None }
    }

    /// Advance to the first doc `>= docno`, starting the search at `cursor`.
    pub fn skip_doc(&self, cursor: usize, docno: u32) -> Option<usize> {
        let start = cursor.min(self.doc_ids.len());
        match self.doc_ids[start..].binary_search(&docno) {
            Ok(i) => Some(start + i),
            Err(i) => {
                let idx = start + i;
                if idx < self.doc_ids.len() { Some(idx) } else { None }
            }
        }
    }

    pub fn doc_at(&self, cursor: usize) -> u32 {
        self.doc_ids[cursor]
    }

    pub fn positions_at(&self, cursor: usize) -> &[u32] {
        &self.positions[cursor]
    }

    pub fn empty_at(&self, cursor: usize) -> bool {
        self.positions[cursor].is_empty()
    }

    /// Append a posting; `docno` must be strictly greater than the
    /// previously appended one (spec §4.2.2 `append`).
    pub fn append(&mut self, docno: u32, mut positions: Vec<u32>) -> Result<()> {
        if let Some(&last) = self.doc_ids.last()
            && docno <= last {
                return Err(Error::corrupt(format!(
                    "non-monotonic posting append: {docno} after {last}"
                )));
            }
        positions.sort_unstable();
        self.doc_ids.push(docno);
        self.positions.push(positions);
        Ok(())
    }

    /// Insert or overwrite a single docno's positions anywhere in the block,
    /// keeping `doc_ids` sorted. Used by the merge writer (C7), which must
    /// mutate in the middle of a chain's block, not just append at the tail.
    pub fn insert(&mut self, docno: u32, mut positions: Vec<u32>) {
        positions.sort_unstable();
        match self.doc_ids.binary_search(&docno) {
            Ok(i) => self.positions[i] = positions,
            Err(i) => {
                self.doc_ids.insert(i, docno);
                self.positions.insert(i, positions);
            }
        }
    }

    /// Remove a docno if present; returns whether it was found.
    pub fn remove(&mut self, docno: u32) -> bool {
        match self.doc_ids.binary_search(&docno) {
            Ok(i) => {
                self.doc_ids.remove(i);
                self.positions.remove(i);
                true
            }
            Err(_) => false,
        }
    }

    /// Split into two halves by element count, each a valid standalone
    /// block whose `block_id` is its own last key (spec §4.7 Split).
    pub fn split(&self) -> (PostingBlock, PostingBlock) {
        let mid = self.len() / 2;
        let left = PostingBlock {
            doc_ids: self.doc_ids[..mid].to_vec(),
            positions: self.positions[..mid].to_vec(),
        };
        let right = PostingBlock {
            doc_ids: self.doc_ids[mid..].to_vec(),
            positions: self.positions[mid..].to_vec(),
        };
        (left, right)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut docno_region = Vec::new();
        let mut position_region = Vec::new();
        let mut index: Vec<(u32, usize, usize)> = Vec::new();

        let mut prev = 0u32;
        for (i, (&doc, pos)) in self.doc_ids.iter().zip(self.positions.iter()).enumerate() {
            if i % INDEX_STRIDE == 0 {
                index.push((doc, docno_region.len(), position_region.len()));
            }
            if i == 0 {
                encode_u32(&mut docno_region, doc);
            } else {
                encode_u32(&mut docno_region, doc - prev);
            }
            prev = doc;

            encode_u32(&mut position_region, pos.len() as u32);
            let mut prev_pos = 0u32;
            for (j, &p) in pos.iter().enumerate() {
                if j == 0 {
                    encode_u32(&mut position_region, p);
                } else {
                    encode_u32(&mut position_region, p - prev_pos);
                }
                prev_pos = p;
            }
        }

        let mut out = Vec::new();
        encode_u32(&mut out, self.len() as u32);
        encode_u32(&mut out, docno_region.len() as u32);
        out.extend_from_slice(&docno_region);
        encode_u32(&mut out, index.len() as u32);
        for (doc, doff, poff) in &index {
            encode_u32(&mut out, *doc);
            encode_u32(&mut out, *doff as u32);
            encode_u32(&mut out, *poff as u32);
        }
        out.extend_from_slice(&position_region);
        append_checksum(&mut out);
        out
    }

    pub fn decode(data: &[u8]) -> Result<PostingBlock> {
        let data = verify_checksum(data)?;
        let mut r = VarintReader::new(data);
        let count = r.read_u32()? as usize;
        let docno_region_len = r.read_u32()? as usize;
        let docno_region_start = r.position();
        let docno_region = data
            .get(docno_region_start..docno_region_start + docno_region_len)
            .ok_or_else(|| Error::corrupt("truncated posting docno region"))?;
        r = VarintReader::new(&data[docno_region_start + docno_region_len..]);
        let index_count = r.read_u32()? as usize;
        for _ in 0..index_count {
            r.read_u32()?; // doc
            r.read_u32()?; // docno offset
            r.read_u32()?; // position offset
        }
        let position_region = r.remaining();

        let mut doc_ids = Vec::with_capacity(count);
        let mut dr = VarintReader::new(docno_region);
        let mut prev = 0u32;
        for i in 0..count {
            let v = dr.read_u32()?;
            let doc = if i == 0 { v } else { prev + v };
            if doc <= prev && i > 0 {
                return Err(Error::corrupt("non-monotonic docno delta in posting block"));
            }
            doc_ids.push(doc);
            prev = doc;
        }

        let mut positions = Vec::with_capacity(count);
        let mut pr = VarintReader::new(position_region);
        for _ in 0..count {
            let ff = pr.read_u32()? as usize;
            let mut pos = Vec::with_capacity(ff);
            let mut prev_pos = 0u32;
            for j in 0..ff {
                let v = pr.read_u32()?;
                let p = if j == 0 { v } else { prev_pos + v };
                pos.push(p);
                prev_pos = p;
            }
            positions.push(pos);
        }

        Ok(PostingBlock { doc_ids, positions })
    }
}

/// Standalone decode of just the block header (`block_id`), used when a
/// caller only needs the chain key and not the full body.
pub fn peek_block_id(data: &[u8]) -> Result<Option<u32>> {
    let block = PostingBlock::decode(data)?;
    Ok(block.doc_ids.last().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PostingBlock {
        let mut b = PostingBlock::new();
        b.append(1, vec![1, 5, 9]).unwrap();
        b.append(3, vec![2]).unwrap();
        b.append(7, vec![1, 2, 3, 100]).unwrap();
        b
    }

    #[test]
    fn round_trip_exact() {
        let b = sample();
        let bytes = b.encode();
        let back = PostingBlock::decode(&bytes).unwrap();
        assert_eq!(b, back);
    }

    #[test]
    fn block_id_is_max_docno() {
        assert_eq!(sample().block_id(), 7);
    }

    #[test]
    fn append_rejects_non_monotonic() {
        let mut b = sample();
        assert!(b.append(3, vec![1]).is_err());
    }

    #[test]
    fn skip_doc_finds_ceiling() {
        let b = sample();
        assert_eq!(b.skip_doc(0, 2), Some(1)); // doc 3
        assert_eq!(b.skip_doc(0, 7), Some(2));
        assert_eq!(b.skip_doc(0, 8), None);
    }

    #[test]
    fn split_halves_by_count() {
        let mut b = PostingBlock::new();
        for d in 1..=6u32 {
            b.append(d, vec![1]).unwrap();
        }
        let (left, right) = b.split();
        assert_eq!(left.len(), 3);
        assert_eq!(right.len(), 3);
        assert_eq!(left.block_id(), 3);
        assert_eq!(right.block_id(), 6);
    }

    #[test]
    fn tombstone_has_empty_positions() {
        let mut b = PostingBlock::new();
        b.append(1, vec![]).unwrap();
        assert!(b.empty_at(0));
    }

    #[test]
    fn rejects_corrupt_bytes() {
        assert!(PostingBlock::decode(&[9, 9, 9]).is_err());
    }

    #[test]
    fn rejects_a_flipped_byte() {
        let mut bytes = sample().encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(PostingBlock::decode(&bytes).is_err());
    }

    #[test]
    fn insert_keeps_order_and_remove_deletes() {
        let mut b = sample();
        b.insert(4, vec![1]);
        assert_eq!(b.doc_ids, vec![1, 3, 4, 7]);
        assert!(b.remove(4));
        assert_eq!(b.doc_ids, vec![1, 3, 7]);
        assert!(!b.remove(4));
    }
}
