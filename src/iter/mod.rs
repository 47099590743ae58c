//! C8 — Posting Iterator Algebra (spec §4.8).
//!
//! Every term and every boolean expression is read through the same
//! [`PostingIterator`] contract, so query evaluation composes arbitrarily
//! deep trees of term iterators and the join combinators below without the
//! ranker ever knowing which leaf produced a given docno.

use crate::adapters::{families, ChainAdapter, SimpleAdapter};
use crate::codec::boolean_block::BooleanBlock;
use crate::codec::posting_block::PostingBlock;
use crate::codec::struct_block::StructBlock;
use crate::error::Result;
use crate::ids::{Position, TermType, TermValue};
use crate::kv::KvStore;

/// Shared contract for term leaves and every join combinator. `skip_doc`
/// positions the iterator at the first doc `>= docno` (or past the end);
/// `skip_pos` does the same within the current doc's position list.
pub trait PostingIterator {
    fn skip_doc(&mut self, docno: u32) -> Option<u32>;
    fn skip_pos(&mut self, firstpos: u32) -> Option<u32>;
    fn document_frequency(&self) -> u64;
    fn feature_id(&self) -> (u32, u32);

    fn current_positions(&self) -> &[u32];
}

/// Reads one `(type, term)` chain, decoding blocks lazily via
/// `load_upper_bound` as the cursor advances past the current block's range.
pub struct TermIterator<'a> {
    store: &'a dyn KvStore,
    adapter: ChainAdapter,
    fixed: [u32; 2],
    df: u64,
    block: Option<PostingBlock>,
    cursor: usize,
}

impl<'a> TermIterator<'a> {
    pub fn new(store: &'a dyn KvStore, type_no: TermType, term_no: TermValue, df: u64) -> Self {
        TermIterator {
            store,
            adapter: ChainAdapter::new(families::POSINFO),
            fixed: [type_no.value(), term_no.value()],
            df,
            block: None,
            cursor: 0,
        }
    }

    fn load_block_containing(&mut self, docno: u32) -> Result<bool> {
        match self.adapter.load_upper_bound(self.store, &self.fixed, docno)? {
            Some((_, bytes)) => {
                self.block = Some(PostingBlock::decode(&bytes)?);
                self.cursor = 0;
                Ok(true)
            }
            None => {
                self.block = None;
                Ok(false)
            }
        }
    }
}

impl<'a> PostingIterator for TermIterator<'a> {
    fn skip_doc(&mut self, docno: u32) -> Option<u32> {
        loop {
            if let Some(block) = &self.block
                && let Some(idx) = block.skip_doc(self.cursor, docno) {
                    let found = block.doc_at(idx);
                    if found >= docno {
                        self.cursor = idx;
                        if block.empty_at(idx) {
                            return self.skip_doc(found + 1);
                        }
                        return Some(found);
                    }
                }
            if !self.load_block_containing(docno).ok()? {
                return None;
            }
        }
    }

    fn skip_pos(&mut self, firstpos: u32) -> Option<u32> {
        let positions = self.current_positions();
        positions.iter().copied().find(|&p| p >= firstpos)
    }

    fn document_frequency(&self) -> u64 {
        self.df
    }

    fn feature_id(&self) -> (u32, u32) {
        (self.fixed[0], self.fixed[1])
    }

    fn current_positions(&self) -> &[u32] {
        match (&self.block, self.cursor) {
            (Some(block), c) if c < block.len() => block.positions_at(c),
            _ => &[],
        }
    }
}

/// An iterator with no matches; the identity for union, the absorbing
/// element for intersection.
pub struct NullIterator;

impl PostingIterator for NullIterator {
    fn skip_doc(&mut self, _docno: u32) -> Option<u32> {
        None
    }
    fn skip_pos(&mut self, _firstpos: u32) -> Option<u32> {
        None
    }
    fn document_frequency(&self) -> u64 {
        0
    }
    fn feature_id(&self) -> (u32, u32) {
        (0, 0)
    }
    fn current_positions(&self) -> &[u32] {
        &[]
    }
}

/// Matches any doc at least one operand matches.
pub struct Union<'a> {
    operands: Vec<Box<dyn PostingIterator + 'a>>,
    current: Option<u32>,
}

impl<'a> Union<'a> {
    pub fn new(operands: Vec<Box<dyn PostingIterator + 'a>>) -> Self {
        Union { operands, current: None }
    }
}

impl<'a> PostingIterator for Union<'a> {
    fn skip_doc(&mut self, docno: u32) -> Option<u32> {
        let mut best: Option<u32> = None;
        for op in &mut self.operands {
            if let Some(d) = op.skip_doc(docno) {
                best = Some(best.map_or(d, |b| b.min(d)));
            }
        }
        self.current = best;
        best
    }

    fn skip_pos(&mut self, firstpos: u32) -> Option<u32> {
        self.operands.iter_mut().filter_map(|op| op.skip_pos(firstpos)).min()
    }

    fn document_frequency(&self) -> u64 {
        self.operands.iter().map(|o| o.document_frequency()).max().unwrap_or(0)
    }

    fn feature_id(&self) -> (u32, u32) {
        self.operands.first().map(|o| o.feature_id()).unwrap_or((0, 0))
    }

    fn current_positions(&self) -> &[u32] {
        self.operands.iter().map(|o| o.current_positions()).find(|p| !p.is_empty()).unwrap_or(&[])
    }
}

/// Matches only docs every operand matches.
pub struct Intersect<'a> {
    operands: Vec<Box<dyn PostingIterator + 'a>>,
}

impl<'a> Intersect<'a> {
    pub fn new(operands: Vec<Box<dyn PostingIterator + 'a>>) -> Self {
        Intersect { operands }
    }
}

impl<'a> PostingIterator for Intersect<'a> {
    fn skip_doc(&mut self, mut docno: u32) -> Option<u32> {
        if self.operands.is_empty() {
            return None;
        }
        'outer: loop {
            let mut max_seen = docno;
            for op in &mut self.operands {
                let found = op.skip_doc(docno)?;
                if found > max_seen {
                    max_seen = found;
                }
            }
            for op in &mut self.operands {
                if op.skip_doc(max_seen)? != max_seen {
                    docno = max_seen;
                    continue 'outer;
                }
            }
            return Some(max_seen);
        }
    }

    fn skip_pos(&mut self, firstpos: u32) -> Option<u32> {
        self.operands.iter_mut().filter_map(|op| op.skip_pos(firstpos)).max()
    }

    fn document_frequency(&self) -> u64 {
        self.operands.iter().map(|o| o.document_frequency()).min().unwrap_or(0)
    }

    fn feature_id(&self) -> (u32, u32) {
        self.operands.first().map(|o| o.feature_id()).unwrap_or((0, 0))
    }

    fn current_positions(&self) -> &[u32] {
        self.operands.first().map(|o| o.current_positions()).unwrap_or(&[])
    }
}

/// Matches docs where operand term occurrences appear in sequence
/// (`within` becomes `Sequence` with an unordered distance check, reusing
/// this same skip-doc gate).
pub struct Sequence<'a> {
    operands: Vec<Box<dyn PostingIterator + 'a>>,
    max_range: Option<Position>,
    ordered: bool,
}

impl<'a> Sequence<'a> {
    pub fn ordered(operands: Vec<Box<dyn PostingIterator + 'a>>) -> Self {
        Sequence { operands, max_range: None, ordered: true }
    }

    pub fn within(operands: Vec<Box<dyn PostingIterator + 'a>>, max_range: Position) -> Self {
        Sequence { operands, max_range: Some(max_range), ordered: false }
    }

    fn doc_matches(&mut self) -> bool {
        if self.operands.is_empty() {
            return false;
        }
        let mut expected = 0u32;
        for (i, op) in self.operands.iter_mut().enumerate() {
            let positions = op.current_positions().to_vec();
            if positions.is_empty() {
                return false;
            }
            if i == 0 {
                expected = positions[0];
                continue;
            }
            let target = if self.ordered { expected + 1 } else { expected };
            let within = |p: u32| {
                if self.ordered {
                    p == target
                } else {
                    let range = self.max_range.unwrap_or(0);
                    p.abs_diff(expected) <= range
                }
            };
            match positions.into_iter().find(|&p| within(p)) {
                Some(p) => expected = p,
                None => return false,
            }
        }
        true
    }
}

impl<'a> PostingIterator for Sequence<'a> {
    fn skip_doc(&mut self, mut docno: u32) -> Option<u32> {
        loop {
            let mut max_seen = docno;
            for op in &mut self.operands {
                let found = op.skip_doc(docno)?;
                max_seen = max_seen.max(found);
            }
            let mut all_here = true;
            for op in &mut self.operands {
                if op.skip_doc(max_seen)? != max_seen {
                    all_here = false;
                    break;
                }
            }
            if all_here && self.doc_matches() {
                return Some(max_seen);
            }
            docno = max_seen + 1;
        }
    }

    fn skip_pos(&mut self, firstpos: u32) -> Option<u32> {
        self.operands.last_mut().and_then(|op| op.skip_pos(firstpos))
    }

    fn document_frequency(&self) -> u64 {
        self.operands.iter().map(|o| o.document_frequency()).min().unwrap_or(0)
    }

    fn feature_id(&self) -> (u32, u32) {
        self.operands.first().map(|o| o.feature_id()).unwrap_or((0, 0))
    }

    fn current_positions(&self) -> &[u32] {
        self.operands.last().map(|o| o.current_positions()).unwrap_or(&[])
    }
}

/// Matches docs the left operand matches and the right does not.
pub struct Difference<'a> {
    left: Box<dyn PostingIterator + 'a>,
    right: Box<dyn PostingIterator + 'a>,
}

impl<'a> Difference<'a> {
    pub fn new(left: Box<dyn PostingIterator + 'a>, right: Box<dyn PostingIterator + 'a>) -> Self {
        Difference { left, right }
    }
}

impl<'a> PostingIterator for Difference<'a> {
    fn skip_doc(&mut self, mut docno: u32) -> Option<u32> {
        loop {
            let found = self.left.skip_doc(docno)?;
            match self.right.skip_doc(found) {
                Some(r) if r == found => {
                    docno = found + 1;
                }
                _ => return Some(found),
            }
        }
    }

    fn skip_pos(&mut self, firstpos: u32) -> Option<u32> {
        self.left.skip_pos(firstpos)
    }

    fn document_frequency(&self) -> u64 {
        self.left.document_frequency()
    }

    fn feature_id(&self) -> (u32, u32) {
        self.left.feature_id()
    }

    fn current_positions(&self) -> &[u32] {
        self.left.current_positions()
    }
}

/// Matches docs at least `k` of the operands match (spec §4.8's join
/// cardinality parameter: `k = operands.len()` is `Intersect`, `k = 1` is
/// `Union`). Generalizes `Intersect`'s re-query-every-operand-per-candidate
/// loop with a threshold instead of requiring unanimous agreement.
pub struct KOfN<'a> {
    operands: Vec<Box<dyn PostingIterator + 'a>>,
    k: usize,
}

impl<'a> KOfN<'a> {
    pub fn new(operands: Vec<Box<dyn PostingIterator + 'a>>, k: usize) -> Self {
        KOfN { operands, k: k.max(1) }
    }
}

impl<'a> PostingIterator for KOfN<'a> {
    fn skip_doc(&mut self, mut docno: u32) -> Option<u32> {
        if self.operands.len() < self.k {
            return None;
        }
        loop {
            let mut found = Vec::with_capacity(self.operands.len());
            for op in &mut self.operands {
                if let Some(d) = op.skip_doc(docno) {
                    found.push(d);
                }
            }
            if found.len() < self.k {
                return None;
            }
            let min = *found.iter().min().unwrap();
            let count = found.iter().filter(|&&d| d == min).count();
            if count >= self.k {
                return Some(min);
            }
            docno = min + 1;
        }
    }

    fn skip_pos(&mut self, firstpos: u32) -> Option<u32> {
        self.operands.iter_mut().filter_map(|op| op.skip_pos(firstpos)).min()
    }

    fn document_frequency(&self) -> u64 {
        let total: u64 = self.operands.iter().map(|o| o.document_frequency()).sum();
        total / self.k as u64
    }

    fn feature_id(&self) -> (u32, u32) {
        self.operands.first().map(|o| o.feature_id()).unwrap_or((0, 0))
    }

    fn current_positions(&self) -> &[u32] {
        self.operands.iter().map(|o| o.current_positions()).find(|p| !p.is_empty()).unwrap_or(&[])
    }
}

/// Loads the `(source,sink)` interval list stored for one document under the
/// struct-index family (spec §4.8, "Structure-bounded variants").
pub fn load_struct_block(store: &dyn KvStore, docno: u32) -> Result<Option<StructBlock>> {
    let adapter = SimpleAdapter::new(families::STRUCT_INDEX);
    match adapter.load(store, &[docno]) {
        Some(bytes) => Ok(Some(StructBlock::decode(&bytes)?)),
        None => Ok(None),
    }
}

/// Structure-bounded variant of a join combinator: a wrapped doc only
/// matches if every position the inner iterator currently holds for that doc
/// lies inside a single structure interval (e.g. the same sentence),
/// consumed from the struct block index rather than recomputed here.
pub struct StructureBounded<'a> {
    inner: Box<dyn PostingIterator + 'a>,
    struct_for_doc: Box<dyn FnMut(u32) -> Result<Option<StructBlock>> + 'a>,
}

impl<'a> StructureBounded<'a> {
    pub fn new(
        inner: Box<dyn PostingIterator + 'a>,
        struct_for_doc: impl FnMut(u32) -> Result<Option<StructBlock>> + 'a,
    ) -> Self {
        StructureBounded { inner, struct_for_doc: Box::new(struct_for_doc) }
    }
}

impl<'a> PostingIterator for StructureBounded<'a> {
    fn skip_doc(&mut self, mut docno: u32) -> Option<u32> {
        loop {
            let found = self.inner.skip_doc(docno)?;
            let bounded = match (self.struct_for_doc)(found).ok()? {
                Some(block) => block.bounds_all(self.inner.current_positions()),
                None => false,
            };
            if bounded {
                return Some(found);
            }
            docno = found + 1;
        }
    }

    fn skip_pos(&mut self, firstpos: u32) -> Option<u32> {
        self.inner.skip_pos(firstpos)
    }

    fn document_frequency(&self) -> u64 {
        self.inner.document_frequency()
    }

    fn feature_id(&self) -> (u32, u32) {
        self.inner.feature_id()
    }

    fn current_positions(&self) -> &[u32] {
        self.inner.current_positions()
    }
}

/// Wraps a `Acl`/`UserAcl` boolean chain as a posting iterator with no
/// position information, for ACL-restricted evaluation (spec §4.8, §3.7).
pub struct InvertedAclIterator<'a> {
    store: &'a dyn KvStore,
    adapter: ChainAdapter,
    fixed: [u32; 1],
    block: Option<BooleanBlock>,
}

impl<'a> InvertedAclIterator<'a> {
    pub fn new(store: &'a dyn KvStore, user_no: u32) -> Self {
        InvertedAclIterator { store, adapter: ChainAdapter::new(families::USER_ACL), fixed: [user_no], block: None }
    }

    fn load(&mut self, docno: u32) -> Result<bool> {
        match self.adapter.load_upper_bound(self.store, &self.fixed, docno)? {
            Some((_, bytes)) => {
                self.block = Some(BooleanBlock::decode(&bytes)?);
                Ok(true)
            }
            None => {
                self.block = None;
                Ok(false)
            }
        }
    }
}

impl<'a> PostingIterator for InvertedAclIterator<'a> {
    fn skip_doc(&mut self, mut docno: u32) -> Option<u32> {
        loop {
            if let Some(block) = &self.block
                && docno <= block.block_id()
                    && let Some(found) = block.iter().find(|&m| m >= docno) {
                        return Some(found);
                    }
            if !self.load(docno).ok()? {
                return None;
            }
            if let Some(block) = &self.block {
                docno = docno.max(block.iter().next().unwrap_or(docno));
            }
        }
    }

    fn skip_pos(&mut self, _firstpos: u32) -> Option<u32> {
        None
    }

    fn document_frequency(&self) -> u64 {
        0
    }

    fn feature_id(&self) -> (u32, u32) {
        (0, self.fixed[0])
    }

    fn current_positions(&self) -> &[u32] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::memory::MemoryStore;
    use crate::merge::{apply_posting_deltas, FillPolicy};
    use crate::txmap::PostingDelta;

    fn seed_term(store: &MemoryStore, type_no: u32, term_no: u32, docs: &[(u32, Vec<u32>)]) {
        let adapter = ChainAdapter::new(families::POSINFO);
        let policy = FillPolicy::default();
        let mut tx = store.transaction();
        let deltas = docs
            .iter()
            .map(|(d, p)| PostingDelta::Insert { docno: crate::ids::DocNo(*d), positions: p.clone() })
            .collect();
        apply_posting_deltas(&adapter, store, &mut *tx, &[type_no, term_no], deltas, &policy).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn term_iterator_skips_to_ceiling() {
        let store = MemoryStore::new();
        seed_term(&store, 1, 1, &[(1, vec![1]), (5, vec![2]), (9, vec![3])]);
        let mut it = TermIterator::new(&store, TermType(1), TermValue(1), 3);
        assert_eq!(it.skip_doc(2), Some(5));
        assert_eq!(it.skip_doc(6), Some(9));
        assert_eq!(it.skip_doc(10), None);
    }

    #[test]
    fn union_returns_lowest_match_across_operands() {
        let store = MemoryStore::new();
        seed_term(&store, 1, 1, &[(1, vec![1]), (9, vec![1])]);
        seed_term(&store, 1, 2, &[(5, vec![1])]);
        let a = Box::new(TermIterator::new(&store, TermType(1), TermValue(1), 2));
        let b = Box::new(TermIterator::new(&store, TermType(1), TermValue(2), 1));
        let mut union = Union::new(vec![a, b]);
        assert_eq!(union.skip_doc(2), Some(5));
        assert_eq!(union.skip_doc(6), Some(9));
    }

    #[test]
    fn intersect_requires_every_operand() {
        let store = MemoryStore::new();
        seed_term(&store, 1, 1, &[(1, vec![1]), (5, vec![1]), (9, vec![1])]);
        seed_term(&store, 1, 2, &[(5, vec![1]), (9, vec![1])]);
        let a = Box::new(TermIterator::new(&store, TermType(1), TermValue(1), 3));
        let b = Box::new(TermIterator::new(&store, TermType(1), TermValue(2), 2));
        let mut inter = Intersect::new(vec![a, b]);
        assert_eq!(inter.skip_doc(1), Some(5));
        assert_eq!(inter.skip_doc(6), Some(9));
    }

    #[test]
    fn difference_excludes_right_operand_matches() {
        let store = MemoryStore::new();
        seed_term(&store, 1, 1, &[(1, vec![1]), (5, vec![1]), (9, vec![1])]);
        seed_term(&store, 1, 2, &[(5, vec![1])]);
        let a = Box::new(TermIterator::new(&store, TermType(1), TermValue(1), 3));
        let b = Box::new(TermIterator::new(&store, TermType(1), TermValue(2), 1));
        let mut diff = Difference::new(a, b);
        assert_eq!(diff.skip_doc(1), Some(1));
        assert_eq!(diff.skip_doc(2), Some(9));
    }

    #[test]
    fn union_of_single_iterator_matches_that_iterator() {
        let store = MemoryStore::new();
        seed_term(&store, 1, 1, &[(1, vec![1]), (3, vec![1])]);
        let a = Box::new(TermIterator::new(&store, TermType(1), TermValue(1), 2));
        let mut lone = TermIterator::new(&store, TermType(1), TermValue(1), 2);
        let mut union = Union::new(vec![a]);
        assert_eq!(union.skip_doc(1), lone.skip_doc(1));
    }

    #[test]
    fn k_of_n_matches_docs_satisfying_threshold_but_not_all() {
        let store = MemoryStore::new();
        // doc 1 in all three, doc 2 in two, doc 3 in one only.
        seed_term(&store, 1, 1, &[(1, vec![1]), (2, vec![1]), (3, vec![1])]);
        seed_term(&store, 1, 2, &[(1, vec![1]), (2, vec![1])]);
        seed_term(&store, 1, 3, &[(1, vec![1])]);
        let ops: Vec<Box<dyn PostingIterator>> = vec![
            Box::new(TermIterator::new(&store, TermType(1), TermValue(1), 3)),
            Box::new(TermIterator::new(&store, TermType(1), TermValue(2), 2)),
            Box::new(TermIterator::new(&store, TermType(1), TermValue(3), 1)),
        ];
        let mut two_of_three = KOfN::new(ops, 2);
        assert_eq!(two_of_three.skip_doc(1), Some(1));
        assert_eq!(two_of_three.skip_doc(2), Some(2));
        assert_eq!(two_of_three.skip_doc(3), None, "doc 3 only matches one operand, below the threshold");
    }

    #[test]
    fn k_of_n_with_k_equal_to_operand_count_matches_intersect() {
        let store = MemoryStore::new();
        seed_term(&store, 1, 1, &[(1, vec![1]), (5, vec![1]), (9, vec![1])]);
        seed_term(&store, 1, 2, &[(5, vec![1]), (9, vec![1])]);
        let ops: Vec<Box<dyn PostingIterator>> = vec![
            Box::new(TermIterator::new(&store, TermType(1), TermValue(1), 3)),
            Box::new(TermIterator::new(&store, TermType(1), TermValue(2), 2)),
        ];
        let mut all_of_two = KOfN::new(ops, 2);
        assert_eq!(all_of_two.skip_doc(1), Some(5));
        assert_eq!(all_of_two.skip_doc(6), Some(9));
    }

    fn seed_struct(store: &MemoryStore, docs: &[(u32, Vec<(u32, u32)>)]) {
        let adapter = SimpleAdapter::new(families::STRUCT_INDEX);
        let mut tx = store.transaction();
        for (docno, intervals) in docs {
            adapter.store(&mut *tx, &[*docno], &StructBlock::new(intervals.clone()).encode());
        }
        tx.commit().unwrap();
    }

    #[test]
    fn structure_bounded_rejects_a_match_outside_every_interval() {
        let store = MemoryStore::new();
        // doc 1: term occurs at position 10, outside either sentence interval.
        // doc 2: term occurs at position 1, inside [0,3].
        seed_term(&store, 1, 1, &[(1, vec![10]), (2, vec![1])]);
        seed_struct(&store, &[(1, vec![(0, 2), (3, 6)]), (2, vec![(0, 3)])]);

        let term = Box::new(TermIterator::new(&store, TermType(1), TermValue(1), 2));
        let mut bounded = StructureBounded::new(term, |docno| load_struct_block(&store, docno));

        assert_eq!(bounded.skip_doc(1), Some(2));
        assert_eq!(bounded.skip_doc(3), None);
    }
}
