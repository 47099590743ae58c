//! C10 — Statistics Propagation (spec §4.10).
//!
//! A committing transaction builds a [`StatisticsMessage`] (df deltas plus a
//! `NofDocs` delta) tagged with a storage-local, commit-lock-ordered
//! timestamp. A peer-side [`StatisticsStorage`] aggregates incoming messages
//! into the global view it serves to the distributed query evaluator;
//! `put_message` is idempotent per `(storage_id, timestamp)` so a redelivered
//! message cannot double-count.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One df or `NofDocs` change, signed, as emitted by a single commit.
///
/// `timestamp` is the storage-local [`Clock`] tick used for ordering and
/// idempotence; `generated_at` is a wall-clock stamp carried only for
/// display/monitoring at a receiving peer, never compared for ordering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatisticsMessage {
    pub storage_id: String,
    pub timestamp: u64,
    pub generated_at: DateTime<Utc>,
    pub nof_docs_delta: i64,
    /// `(type_no, term_no) -> signed df delta`.
    pub df_delta: BTreeMap<(u32, u32), i64>,
}

impl StatisticsMessage {
    pub fn is_empty(&self) -> bool {
        self.nof_docs_delta == 0 && self.df_delta.values().all(|&d| d == 0)
    }
}

/// A full point-in-time view, used to seed a newly joined peer instead of
/// replaying every delta message from scratch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub storage_id: String,
    pub timestamp: u64,
    pub nof_docs: u64,
    pub df: BTreeMap<(u32, u32), u64>,
}

/// Monotonic per-storage commit counter; handed to every transaction at
/// commit time under the commit lock so timestamps never go backwards or
/// collide (spec §4.6, §4.10).
#[derive(Default)]
pub struct Clock {
    next: u64,
}

impl Clock {
    pub fn tick(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}

/// Peer-side aggregator: sums every message it has accepted from each known
/// source storage into one collection-wide view.
#[derive(Default)]
pub struct StatisticsStorage {
    nof_docs: u64,
    df: BTreeMap<(u32, u32), i64>,
    seen: HashSet<(String, u64)>,
}

impl StatisticsStorage {
    pub fn new() -> Self {
        StatisticsStorage::default()
    }

    pub fn put_snapshot(&mut self, snapshot: StatisticsSnapshot) {
        if !self.seen.insert((snapshot.storage_id.clone(), snapshot.timestamp)) {
            return;
        }
        self.nof_docs = self.nof_docs.saturating_add(snapshot.nof_docs);
        for (term, df) in snapshot.df {
            *self.df.entry(term).or_insert(0) += df as i64;
        }
    }

    /// Apply a delta message; ignored if `(storage_id, timestamp)` was
    /// already applied (spec §4.10 idempotence).
    pub fn put_message(&mut self, message: StatisticsMessage) {
        if !self.seen.insert((message.storage_id.clone(), message.timestamp)) {
            return;
        }
        self.nof_docs = (self.nof_docs as i64 + message.nof_docs_delta).max(0) as u64;
        for (term, delta) in message.df_delta {
            *self.df.entry(term).or_insert(0) += delta;
        }
    }

    pub fn document_frequency(&self, type_no: u32, term_no: u32) -> u64 {
        self.df.get(&(type_no, term_no)).copied().unwrap_or(0).max(0) as u64
    }

    pub fn nof_documents(&self) -> u64 {
        self.nof_docs
    }

    pub fn storage_timestamp(&self, storage_id: &str) -> Option<u64> {
        self.seen.iter().filter(|(id, _)| id == storage_id).map(|(_, ts)| *ts).max()
    }
}
