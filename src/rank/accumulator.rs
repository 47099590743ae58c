//! C9 — Accumulator (spec §4.9).
//!
//! Drives a set of selector iterators (candidate docs, contribute no weight)
//! and a set of weighting tuples `(iterator, function, factor)` in ascending
//! docno order, feeding each surviving document's score into a [`Ranker`].

use crate::iter::PostingIterator;

use super::ranker::Ranker;
use super::weighting::{CollectionStats, Weighting};

/// One `(iterator, function, factor)` triple from spec §4.9's weighting set.
pub struct WeightedFeature<'a> {
    pub iterator: Box<dyn PostingIterator + 'a>,
    pub weighting: Box<dyn Weighting>,
    pub factor: f64,
}

/// Runs the accumulator loop and reports how many documents were visited vs.
/// actually ranked (spec §4.9's `nof_visited`/`nof_ranked`, consumed by the
/// ranked-list merge in §4.9's "Ranked-list merge").
#[derive(Debug, Default, Clone, Copy)]
pub struct AccumulatorStats {
    pub nof_visited: u64,
    pub nof_ranked: u64,
}

/// `metadata_filter(docno) -> bool` gates which visited documents are
/// actually scored and handed to the ranker; pass `|_| true` to rank every
/// visited document.
pub fn run<'a>(
    selectors: &mut [Box<dyn PostingIterator + 'a>],
    weights: &mut [WeightedFeature<'a>],
    stats: CollectionStats,
    metadata_filter: impl Fn(u32) -> bool,
    ranker: &mut Ranker,
) -> AccumulatorStats {
    let mut totals = AccumulatorStats::default();
    let mut current = 0u32;

    loop {
        let next = current + 1;
        let Some(d) = selectors.iter_mut().filter_map(|s| s.skip_doc(next)).min() else {
            break;
        };

        totals.nof_visited += 1;
        let mut weight = 0.0;
        for feature in weights.iter_mut() {
            if feature.iterator.skip_doc(d) == Some(d) {
                weight += feature.factor * feature.weighting.score(feature.iterator.as_mut(), d, stats);
            }
        }

        if metadata_filter(d) {
            totals.nof_ranked += 1;
            ranker.push(d, weight);
        }

        current = d;
    }

    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{families, ChainAdapter};
    use crate::ids::DocNo;
    use crate::kv::memory::MemoryStore;
    use crate::kv::KvStore;
    use crate::merge::{apply_posting_deltas, FillPolicy};
    use crate::rank::weighting::{Constant, Frequency};
    use crate::txmap::PostingDelta;
    use crate::iter::TermIterator;
    use crate::ids::{TermType, TermValue};

    fn seed(store: &MemoryStore, type_no: u32, term_no: u32, docs: &[(u32, Vec<u32>)]) {
        let adapter = ChainAdapter::new(families::POSINFO);
        let policy = FillPolicy::default();
        let mut tx = store.transaction();
        let deltas = docs
            .iter()
            .map(|(d, p)| PostingDelta::Insert { docno: DocNo(*d), positions: p.clone() })
            .collect();
        apply_posting_deltas(&adapter, store, &mut *tx, &[type_no, term_no], deltas, &policy).unwrap();
        tx.commit().unwrap();
    }

    fn stats() -> CollectionStats {
        CollectionStats { nof_docs: 2, doc_length: 1.0, avg_doc_length: 1.0 }
    }

    #[test]
    fn ranks_every_visited_document_with_no_filter() {
        let store = MemoryStore::new();
        seed(&store, 1, 1, &[(1, vec![1, 2, 3]), (2, vec![1])]);

        let mut selectors: Vec<Box<dyn PostingIterator>> =
            vec![Box::new(TermIterator::new(&store, TermType(1), TermValue(1), 2))];
        let mut weights = vec![WeightedFeature {
            iterator: Box::new(TermIterator::new(&store, TermType(1), TermValue(1), 2)),
            weighting: Box::new(Frequency),
            factor: 1.0,
        }];

        let mut ranker = Ranker::new(10);
        let totals = run(&mut selectors, &mut weights, stats(), |_| true, &mut ranker);

        assert_eq!(totals.nof_visited, 2);
        assert_eq!(totals.nof_ranked, 2);
        let results = ranker.result(0, 10);
        assert_eq!(results[0].docno, 1);
        assert_eq!(results[0].weight, 3.0);
        assert_eq!(results[1].docno, 2);
        assert_eq!(results[1].weight, 1.0);
    }

    #[test]
    fn metadata_filter_excludes_visited_documents_from_the_ranking() {
        let store = MemoryStore::new();
        seed(&store, 1, 1, &[(1, vec![1]), (2, vec![1])]);

        let mut selectors: Vec<Box<dyn PostingIterator>> =
            vec![Box::new(TermIterator::new(&store, TermType(1), TermValue(1), 2))];
        let mut weights = vec![WeightedFeature {
            iterator: Box::new(TermIterator::new(&store, TermType(1), TermValue(1), 2)),
            weighting: Box::new(Constant { value: 1.0 }),
            factor: 1.0,
        }];

        let mut ranker = Ranker::new(10);
        let totals = run(&mut selectors, &mut weights, stats(), |d| d == 2, &mut ranker);

        assert_eq!(totals.nof_visited, 2);
        assert_eq!(totals.nof_ranked, 1);
        assert_eq!(ranker.result(0, 10)[0].docno, 2);
    }
}
