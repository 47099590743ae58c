//! C7 — Block Merge Writers (spec §4.7).
//!
//! Applies a batch of per-chain deltas against the existing block chain:
//! locate the target block (`seek_upper_bound`, or the tail block for a
//! fresh max, or a brand-new block for an empty chain), mutate it, then
//! split if it now exceeds `MaxBlockSize` or fold it into its right
//! neighbor if a deletion left it under `MinimumBlockFillRatio`. An empty
//! result after mutation removes the block's key entirely rather than
//! writing a zero-length block.

use crate::adapters::ChainAdapter;
use crate::codec::boolean_block::{BooleanBlock, MergeRange};
use crate::codec::forward_block::ForwardBlock;
use crate::codec::posting_block::PostingBlock;
use crate::error::Result;
use crate::kv::{KvStore, Writer};
use crate::txmap::PostingDelta;

#[derive(Debug, Clone, Copy)]
pub struct FillPolicy {
    pub max_block_size: usize,
    pub min_fill_ratio: f64,
}

impl Default for FillPolicy {
    fn default() -> Self {
        FillPolicy { max_block_size: 1024, min_fill_ratio: 0.25 }
    }
}

impl FillPolicy {
    fn min_count(&self) -> usize {
        (self.min_fill_ratio * self.max_block_size as f64).ceil() as usize
    }
}

fn docno_of(delta: &PostingDelta) -> u32 {
    match delta {
        PostingDelta::Insert { docno, .. } => docno.value(),
        PostingDelta::Delete { docno } => docno.value(),
    }
}

/// Apply posting-chain deltas (spec §4.7, used by Posinfo).
///
/// Loads the whole chain once into a sorted working copy and applies every
/// delta in the batch against that copy, never against `store` again: a
/// later delta in the same batch must see an earlier delta's split/merge,
/// which only exists in `writer` and is invisible to `store` until commit.
pub fn apply_posting_deltas(
    adapter: &ChainAdapter,
    store: &dyn KvStore,
    writer: &mut dyn Writer,
    fixed: &[u32],
    mut deltas: Vec<PostingDelta>,
    policy: &FillPolicy,
) -> Result<()> {
    deltas.sort_by_key(docno_of);

    let mut working: Vec<PostingBlock> =
        adapter.iter_chain(store, fixed).map(|(_, bytes)| PostingBlock::decode(&bytes)).collect::<Result<_>>()?;
    let original_keys: Vec<u32> = working.iter().map(|b| b.block_id()).collect();

    for delta in deltas {
        let target_docno = docno_of(&delta);
        let mut block = match posting_target_index(&working, target_docno) {
            Some(i) => working.remove(i),
            None => PostingBlock::new(),
        };

        match delta {
            PostingDelta::Insert { docno, positions } => block.insert(docno.value(), positions),
            PostingDelta::Delete { docno } => {
                block.remove(docno.value());
            }
        }

        if block.is_empty() {
            continue;
        }

        if block.len() < policy.min_count()
            && let Some(next_idx) = posting_ceiling_index(&working, block.block_id() + 1) {
                let next = working.remove(next_idx);
                for (d, p) in next.doc_ids.iter().zip(next.positions.iter()) {
                    block.insert(*d, p.clone());
                }
            }

        if block.len() > policy.max_block_size {
            let (left, right) = block.split();
            posting_insert_sorted(&mut working, left);
            posting_insert_sorted(&mut working, right);
        } else {
            posting_insert_sorted(&mut working, block);
        }
    }

    write_posting_chain(adapter, writer, fixed, original_keys, working);
    Ok(())
}

/// Smallest index whose `block_id() >= docno`, or `None` if every block's id
/// is smaller (the chain's tail should take `docno`).
fn posting_ceiling_index(working: &[PostingBlock], docno: u32) -> Option<usize> {
    let idx = working.partition_point(|b| b.block_id() < docno);
    (idx < working.len()).then_some(idx)
}

fn posting_target_index(working: &[PostingBlock], docno: u32) -> Option<usize> {
    posting_ceiling_index(working, docno).or_else(|| (!working.is_empty()).then(|| working.len() - 1))
}

fn posting_insert_sorted(working: &mut Vec<PostingBlock>, block: PostingBlock) {
    let pos = working.partition_point(|b| b.block_id() < block.block_id());
    working.insert(pos, block);
}

fn write_posting_chain(
    adapter: &ChainAdapter,
    writer: &mut dyn Writer,
    fixed: &[u32],
    original_keys: Vec<u32>,
    working: Vec<PostingBlock>,
) {
    let final_keys: std::collections::HashSet<u32> = working.iter().map(|b| b.block_id()).collect();
    for key in original_keys {
        if !final_keys.contains(&key) {
            adapter.remove(writer, fixed, key);
        }
    }
    for block in &working {
        adapter.store(writer, fixed, block.block_id(), &block.encode());
    }
}

/// Apply boolean-chain merge ranges (spec §4.7, used by DocList/Acl/UserAcl).
///
/// Same working-copy treatment as [`apply_posting_deltas`]: the whole chain
/// is loaded once and every merge range in the batch is folded into that
/// copy before anything is written back.
pub fn apply_boolean_merges(
    adapter: &ChainAdapter,
    store: &dyn KvStore,
    writer: &mut dyn Writer,
    fixed: &[u32],
    merges: &[MergeRange],
    policy: &FillPolicy,
) -> Result<()> {
    let mut working: Vec<BooleanBlock> =
        adapter.iter_chain(store, fixed).map(|(_, bytes)| BooleanBlock::decode(&bytes)).collect::<Result<_>>()?;
    let original_keys: Vec<u32> = working.iter().map(|b| b.block_id()).collect();

    for m in merges {
        let mut block = match boolean_target_index(&working, m.from) {
            Some(i) => working.remove(i),
            None => BooleanBlock::new(),
        };

        block = block.merge(std::slice::from_ref(m));

        if block.is_empty() {
            continue;
        }

        if block.len() > policy.max_block_size {
            let (left, right) = block.split();
            boolean_insert_sorted(&mut working, left);
            boolean_insert_sorted(&mut working, right);
        } else {
            boolean_insert_sorted(&mut working, block);
        }
    }

    let final_keys: std::collections::HashSet<u32> = working.iter().map(|b| b.block_id()).collect();
    for key in original_keys {
        if !final_keys.contains(&key) {
            adapter.remove(writer, fixed, key);
        }
    }
    for block in &working {
        adapter.store(writer, fixed, block.block_id(), &block.encode());
    }
    Ok(())
}

fn boolean_ceiling_index(working: &[BooleanBlock], member: u32) -> Option<usize> {
    let idx = working.partition_point(|b| b.block_id() < member);
    (idx < working.len()).then_some(idx)
}

fn boolean_target_index(working: &[BooleanBlock], member: u32) -> Option<usize> {
    boolean_ceiling_index(working, member).or_else(|| (!working.is_empty()).then(|| working.len() - 1))
}

fn boolean_insert_sorted(working: &mut Vec<BooleanBlock>, block: BooleanBlock) {
    let pos = working.partition_point(|b| b.block_id() < block.block_id());
    working.insert(pos, block);
}

/// Replace the entire forward-index chain for one document (spec §4.7 used
/// with `fixed = [docno]`; ForwardIndex chains are per-document, so a full
/// replace rather than an incremental merge matches how the rest of the
/// chain family works).
pub fn replace_forward_chain(
    adapter: &ChainAdapter,
    writer: &mut dyn Writer,
    fixed: &[u32],
    terms: Vec<(u32, String)>,
    policy: &FillPolicy,
) -> Result<()> {
    adapter.remove_chain(writer, fixed);
    if terms.is_empty() {
        return Ok(());
    }
    let mut block = ForwardBlock::default();
    let mut blocks = Vec::new();
    for (pos, term) in terms {
        block.append(pos, term)?;
        if block.positions.len() >= policy.max_block_size {
            blocks.push(std::mem::take(&mut block));
        }
    }
    if !block.positions.is_empty() {
        blocks.push(block);
    }
    for b in blocks {
        adapter.store(writer, fixed, b.block_id(), &b.encode());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::families;
    use crate::ids::DocNo;
    use crate::kv::memory::MemoryStore;

    #[test]
    fn small_max_block_size_splits_on_overflow() {
        let store = MemoryStore::new();
        let adapter = ChainAdapter::new(families::POSINFO);
        let fixed = [1u32, 1u32];
        let policy = FillPolicy { max_block_size: 4, min_fill_ratio: 0.0 };

        let mut tx = store.transaction();
        let deltas: Vec<_> = (1..=6u32)
            .map(|d| PostingDelta::Insert { docno: DocNo(d), positions: vec![1] })
            .collect();
        apply_posting_deltas(&adapter, &store, &mut *tx, &fixed, deltas, &policy).unwrap();
        tx.commit().unwrap();

        let chain: Vec<_> = adapter.iter_chain(&store, &fixed).collect();
        assert!(chain.len() >= 2, "expected the 6-doc insert to split across blocks");
        let total: usize = chain
            .iter()
            .map(|(_, bytes)| PostingBlock::decode(bytes).unwrap().len())
            .sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn delete_that_empties_sole_block_removes_the_key() {
        let store = MemoryStore::new();
        let adapter = ChainAdapter::new(families::POSINFO);
        let fixed = [2u32, 2u32];
        let policy = FillPolicy::default();

        let mut tx = store.transaction();
        apply_posting_deltas(
            &adapter,
            &store,
            &mut *tx,
            &fixed,
            vec![PostingDelta::Insert { docno: DocNo(1), positions: vec![1] }],
            &policy,
        )
        .unwrap();
        tx.commit().unwrap();

        let mut tx = store.transaction();
        apply_posting_deltas(&adapter, &store, &mut *tx, &fixed, vec![PostingDelta::Delete { docno: DocNo(1) }], &policy).unwrap();
        tx.commit().unwrap();

        assert!(adapter.iter_chain(&store, &fixed).next().is_none());
    }

    #[test]
    fn batched_inserts_into_an_existing_block_keep_every_docno() {
        let store = MemoryStore::new();
        let adapter = ChainAdapter::new(families::POSINFO);
        let fixed = [3u32, 3u32];
        let policy = FillPolicy::default();

        let mut tx = store.transaction();
        let seed: Vec<_> = [1u32, 3, 5]
            .into_iter()
            .map(|d| PostingDelta::Insert { docno: DocNo(d), positions: vec![1] })
            .collect();
        apply_posting_deltas(&adapter, &store, &mut *tx, &fixed, seed, &policy).unwrap();
        tx.commit().unwrap();

        let mut tx = store.transaction();
        let batch = vec![
            PostingDelta::Insert { docno: DocNo(4), positions: vec![1] },
            PostingDelta::Insert { docno: DocNo(2), positions: vec![1] },
        ];
        apply_posting_deltas(&adapter, &store, &mut *tx, &fixed, batch, &policy).unwrap();
        tx.commit().unwrap();

        let chain: Vec<_> = adapter.iter_chain(&store, &fixed).collect();
        let mut docs: Vec<u32> =
            chain.iter().flat_map(|(_, bytes)| PostingBlock::decode(bytes).unwrap().doc_ids).collect();
        docs.sort_unstable();
        assert_eq!(docs, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn batched_acl_grants_into_an_existing_block_keep_every_member() {
        let store = MemoryStore::new();
        let adapter = ChainAdapter::new(families::DOC_LIST);
        let fixed = [7u32];
        let policy = FillPolicy::default();

        let mut tx = store.transaction();
        apply_boolean_merges(
            &adapter,
            &store,
            &mut *tx,
            &fixed,
            &[MergeRange { from: 1, to: 1, is_member: true }, MergeRange { from: 5, to: 5, is_member: true }],
            &policy,
        )
        .unwrap();
        tx.commit().unwrap();

        let mut tx = store.transaction();
        apply_boolean_merges(
            &adapter,
            &store,
            &mut *tx,
            &fixed,
            &[MergeRange { from: 4, to: 4, is_member: true }, MergeRange { from: 2, to: 2, is_member: true }],
            &policy,
        )
        .unwrap();
        tx.commit().unwrap();

        let chain: Vec<_> = adapter.iter_chain(&store, &fixed).collect();
        let mut members: Vec<u32> =
            chain.iter().flat_map(|(_, bytes)| BooleanBlock::decode(bytes).unwrap().iter().collect::<Vec<_>>()).collect();
        members.sort_unstable();
        assert_eq!(members, vec![1, 2, 4, 5]);
    }

    #[test]
    fn boolean_merge_adds_member() {
        let store = MemoryStore::new();
        let adapter = ChainAdapter::new(families::DOC_LIST);
        let fixed = [9u32];
        let policy = FillPolicy::default();

        let mut tx = store.transaction();
        apply_boolean_merges(&adapter, &store, &mut *tx, &fixed, &[MergeRange { from: 3, to: 3, is_member: true }], &policy).unwrap();
        tx.commit().unwrap();

        let (_, bytes) = adapter.load_first(&store, &fixed).unwrap();
        assert!(BooleanBlock::decode(&bytes).unwrap().contains(3));
    }
}
