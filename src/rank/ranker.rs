//! C9.2 — ranker (spec §4.9.2).
//!
//! Two backing structures for the same top-K contract, chosen by `max_rank`:
//! a small bounded array kept sorted by insertion for `max_rank <= 128`
//! (the common "give me the top 10" case, where a linear insert is cheaper
//! than heap bookkeeping), and a min-heap for larger `max_rank` so a push
//! that doesn't make the cut costs O(log k) instead of O(k).
//!
//! Ties within `WEIGHT_EPSILON` of each other break by docno, lower wins —
//! this keeps ranked-list merge (below) deterministic across peers that
//! compute the same weight with different floating-point rounding.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

pub const WEIGHT_EPSILON: f64 = 1e-9;
const SMALL_RANK_THRESHOLD: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedResult {
    pub docno: u32,
    pub weight: f64,
}

/// `Greater` means `self` ranks strictly better than `other`.
fn rank_cmp(a: &RankedResult, b: &RankedResult) -> Ordering {
    if (a.weight - b.weight).abs() < WEIGHT_EPSILON {
        b.docno.cmp(&a.docno)
    } else {
        a.weight.partial_cmp(&b.weight).unwrap_or(Ordering::Equal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapEntry(RankedResult);

impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        rank_cmp(&self.0, &other.0)
    }
}

enum Backing {
    Array(Vec<RankedResult>),
    Heap(BinaryHeap<std::cmp::Reverse<HeapEntry>>),
}

pub struct Ranker {
    max_rank: usize,
    backing: Backing,
}

impl Ranker {
    pub fn new(max_rank: usize) -> Self {
        let backing = if max_rank <= SMALL_RANK_THRESHOLD {
            Backing::Array(Vec::with_capacity(max_rank))
        } else {
            Backing::Heap(BinaryHeap::with_capacity(max_rank))
        };
        Ranker { max_rank, backing }
    }

    pub fn push(&mut self, docno: u32, weight: f64) {
        if self.max_rank == 0 {
            return;
        }
        let candidate = RankedResult { docno, weight };
        match &mut self.backing {
            Backing::Array(arr) => {
                let pos = arr.partition_point(|r| rank_cmp(r, &candidate) == Ordering::Greater);
                arr.insert(pos, candidate);
                arr.truncate(self.max_rank);
            }
            Backing::Heap(heap) => {
                if heap.len() < self.max_rank {
                    heap.push(std::cmp::Reverse(HeapEntry(candidate)));
                } else if let Some(std::cmp::Reverse(worst)) = heap.peek()
                    && rank_cmp(&candidate, &worst.0) == Ordering::Greater {
                        heap.pop();
                        heap.push(std::cmp::Reverse(HeapEntry(candidate)));
                    }
            }
        }
    }

    /// Best-to-worst results, `first_rank`-based pagination (spec §4.9.2).
    pub fn result(&self, first_rank: usize, count: usize) -> Vec<RankedResult> {
        let mut all: Vec<RankedResult> = match &self.backing {
            Backing::Array(arr) => arr.clone(),
            Backing::Heap(heap) => heap.iter().map(|r| r.0 .0).collect(),
        };
        all.sort_by(|a, b| rank_cmp(b, a));
        all.into_iter().skip(first_rank).take(count).collect()
    }

    pub fn len(&self) -> usize {
        match &self.backing {
            Backing::Array(arr) => arr.len(),
            Backing::Heap(heap) => heap.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_ranker_keeps_top_k_sorted_descending() {
        let mut r = Ranker::new(3);
        for (d, w) in [(1, 0.5), (2, 0.9), (3, 0.1), (4, 0.7), (5, 0.95)] {
            r.push(d, w);
        }
        let top = r.result(0, 10);
        assert_eq!(top.iter().map(|r| r.docno).collect::<Vec<_>>(), vec![5, 2, 4]);
    }

    #[test]
    fn large_ranker_matches_small_ranker_semantics() {
        let mut small = Ranker::new(3);
        let mut large = Ranker::new(200);
        for (d, w) in [(1, 0.5), (2, 0.9), (3, 0.1), (4, 0.7), (5, 0.95), (6, 0.2)] {
            small.push(d, w);
            large.push(d, w);
        }
        let top_small: Vec<_> = small.result(0, 3).iter().map(|r| r.docno).collect();
        let top_large: Vec<_> = large.result(0, 3).iter().map(|r| r.docno).collect();
        assert_eq!(top_small, top_large);
    }

    #[test]
    fn equal_weight_ties_favor_lower_docno() {
        let mut r = Ranker::new(2);
        r.push(10, 0.5);
        r.push(3, 0.5);
        let top = r.result(0, 2);
        assert_eq!(top[0].docno, 3);
    }

    #[test]
    fn pagination_skips_first_rank() {
        let mut r = Ranker::new(5);
        for (d, w) in [(1, 1.0), (2, 0.9), (3, 0.8), (4, 0.7)] {
            r.push(d, w);
        }
        let page = r.result(2, 2);
        assert_eq!(page.iter().map(|r| r.docno).collect::<Vec<_>>(), vec![3, 4]);
    }
}
