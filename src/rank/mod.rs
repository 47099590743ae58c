//! C9 — Accumulator + Ranker (spec §4.9).

pub mod accumulator;
pub mod merge_ranks;
pub mod ranker;
pub mod summarizer;
pub mod weighting;

pub use accumulator::{AccumulatorStats, WeightedFeature};
pub use ranker::{RankedResult, Ranker};
pub use weighting::Weighting;
