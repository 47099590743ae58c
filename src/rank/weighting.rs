//! C9.1 — weighting functions (spec §4.9.1).
//!
//! A `Weighting` scores one document given the feature's posting state and
//! collection statistics; the ranker (below) is agnostic to which weighting
//! produced the number it sorts on.

use crate::iter::PostingIterator;

#[derive(Debug, Clone, Copy)]
pub struct CollectionStats {
    pub nof_docs: u64,
    pub doc_length: f64,
    pub avg_doc_length: f64,
}

pub trait Weighting {
    fn score(&self, it: &mut dyn PostingIterator, docno: u32, stats: CollectionStats) -> f64;
    fn name(&self) -> &str;
}

/// Always contributes `value` regardless of the document matched — used for
/// boolean-only feature boosts.
pub struct Constant {
    pub value: f64,
}

impl Weighting for Constant {
    fn score(&self, _it: &mut dyn PostingIterator, _docno: u32, _stats: CollectionStats) -> f64 {
        self.value
    }
    fn name(&self) -> &str {
        "constant"
    }
}

/// Raw term frequency within the document.
pub struct Frequency;

impl Weighting for Frequency {
    fn score(&self, it: &mut dyn PostingIterator, docno: u32, _stats: CollectionStats) -> f64 {
        if it.skip_doc(docno) == Some(docno) {
            it.current_positions().len() as f64
        } else {
            0.0
        }
    }
    fn name(&self) -> &str {
        "frequency"
    }
}

/// Okapi BM25 (spec §4.9.1): `idf * tf * (k1+1) / (tf + k1*(1-b+b*dl/avgdl))`.
pub struct Bm25 {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25 {
    fn default() -> Self {
        Bm25 { k1: 1.2, b: 0.75 }
    }
}

impl Weighting for Bm25 {
    fn score(&self, it: &mut dyn PostingIterator, docno: u32, stats: CollectionStats) -> f64 {
        if it.skip_doc(docno) != Some(docno) {
            return 0.0;
        }
        let tf = it.current_positions().len() as f64;
        if tf == 0.0 {
            return 0.0;
        }
        let df = it.document_frequency().max(1) as f64;
        let idf = ((stats.nof_docs as f64 - df + 0.5) / (df + 0.5)).ln();
        let avgdl = stats.avg_doc_length.max(1.0);
        let numerator = idf * tf * (self.k1 + 1.0);
        let denominator = tf + self.k1 * (1.0 - self.b + self.b * (stats.doc_length / avgdl));
        numerator / denominator
    }

    fn name(&self) -> &str {
        "bm25"
    }
}
