//! C9.3 — ranked-list merge (spec §4.9.3).
//!
//! Fan-in for a distributed query: each peer returns its own top-K
//! [`RankedResult`] list; merging them is a K-way merge by the same
//! tie-break rule the local ranker uses, so a merged list is
//! indistinguishable from what a single ranker over the union of postings
//! would have produced.

use super::ranker::{RankedResult, Ranker};

pub fn merge_ranked_lists(lists: Vec<Vec<RankedResult>>, max_rank: usize) -> Vec<RankedResult> {
    let mut ranker = Ranker::new(max_rank);
    for list in lists {
        for r in list {
            ranker.push(r.docno, r.weight);
        }
    }
    ranker.result(0, max_rank)
}
