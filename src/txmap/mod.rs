//! C6 — Transaction Maps (spec §4.6).
//!
//! In-memory staging for one transaction's document edits, keyed by final
//! `DocNo`/`AttribNo`/`TermType`/`TermValue` ids (allocation, C5, has already
//! run by the time anything is inserted here). The façade (C11) drains these
//! maps at commit time, handing the posting-level deltas to the block merge
//! writers (C7) and the scalar writes straight to the KV transaction.

use std::collections::BTreeMap;

use crate::codec::inverse_block::InverseTermEntry;
use crate::ids::{AttribNo, DocNo, Position, TermType, TermValue};
use crate::model::NumericValue;

/// One posting change for a single `(type, term)` chain.
#[derive(Debug, Clone)]
pub enum PostingDelta {
    Insert { docno: DocNo, positions: Vec<Position> },
    Delete { docno: DocNo },
}

#[derive(Debug, Default)]
pub struct TransactionMaps {
    /// `(type, term) -> ordered deltas`, applied to the Posinfo chain and
    /// folded into the DocFrequency delta below.
    pub postings: BTreeMap<(TermType, TermValue), Vec<PostingDelta>>,
    /// Net document-frequency change per term, `+1`/`-1` per touched doc.
    pub df_delta: BTreeMap<(TermType, TermValue), i64>,
    /// `docno -> attribute writes` (`None` value means remove).
    pub attributes: BTreeMap<(DocNo, AttribNo), Option<String>>,
    /// `docno -> (column, value)` metadata writes.
    pub metadata: BTreeMap<DocNo, Vec<(usize, NumericValue)>>,
    /// `(docno, type) -> forward-index (position, term) pairs`.
    pub forward: BTreeMap<(DocNo, u32), Vec<(Position, String)>>,
    /// `docno -> granted user numbers` for the Acl/UserAcl paired chains.
    pub acl_grants: BTreeMap<DocNo, Vec<u32>>,
    pub acl_revoke_all: Vec<DocNo>,
    /// Inverse-term block replacement staged per doc (built from the
    /// postings above once every term for that doc is known).
    pub inverse: BTreeMap<DocNo, Vec<InverseTermEntry>>,
    /// Docs being newly created this transaction (net `+1` to `NofDocs`) vs.
    /// deleted (`-1`).
    pub docs_added: i64,
    /// `docno -> struct-block replacement` (`None` clears it, e.g. on delete).
    pub struct_intervals: BTreeMap<DocNo, Option<Vec<(u32, u32)>>>,
}

impl TransactionMaps {
    pub fn new() -> Self {
        TransactionMaps::default()
    }

    pub fn insert_posting(&mut self, term: (TermType, TermValue), docno: DocNo, positions: Vec<Position>) {
        *self.df_delta.entry(term).or_insert(0) += 1;
        self.postings.entry(term).or_default().push(PostingDelta::Insert { docno, positions: positions.clone() });
        self.inverse.entry(docno).or_default().push(InverseTermEntry {
            type_no: term.0.value(),
            term_no: term.1.value(),
            ff: positions.len() as u32,
            first_pos: positions.first().copied().unwrap_or(0),
        });
    }

    pub fn delete_posting(&mut self, term: (TermType, TermValue), docno: DocNo) {
        *self.df_delta.entry(term).or_insert(0) -= 1;
        self.postings.entry(term).or_default().push(PostingDelta::Delete { docno });
    }

    pub fn set_attribute(&mut self, docno: DocNo, attrib: AttribNo, value: String) {
        self.attributes.insert((docno, attrib), Some(value));
    }

    pub fn remove_attribute(&mut self, docno: DocNo, attrib: AttribNo) {
        self.attributes.insert((docno, attrib), None);
    }

    pub fn set_metadata(&mut self, docno: DocNo, column: usize, value: NumericValue) {
        self.metadata.entry(docno).or_default().push((column, value));
    }

    pub fn set_forward(&mut self, docno: DocNo, type_no: u32, terms: Vec<(Position, String)>) {
        self.forward.insert((docno, type_no), terms);
    }

    pub fn grant_acl(&mut self, docno: DocNo, users: Vec<u32>) {
        self.acl_grants.entry(docno).or_default().extend(users);
    }

    pub fn revoke_all_acl(&mut self, docno: DocNo) {
        self.acl_revoke_all.push(docno);
    }

    pub fn set_struct_intervals(&mut self, docno: DocNo, intervals: Vec<(u32, u32)>) {
        self.struct_intervals.insert(docno, Some(intervals));
    }

    pub fn clear_struct_intervals(&mut self, docno: DocNo) {
        self.struct_intervals.insert(docno, None);
    }

    pub fn mark_document_added(&mut self) {
        self.docs_added += 1;
    }

    pub fn mark_document_deleted(&mut self) {
        self.docs_added -= 1;
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
            && self.attributes.is_empty()
            && self.metadata.is_empty()
            && self.forward.is_empty()
            && self.acl_grants.is_empty()
            && self.acl_revoke_all.is_empty()
            && self.docs_added == 0
            && self.struct_intervals.is_empty()
    }
}
