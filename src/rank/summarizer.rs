//! C9.4 — summarizer (spec §4.9.4).
//!
//! Stateless, per-document dispatch: given a docno, a summarizer reads
//! whatever store-backed value it names and returns zero or more
//! `(name, value)` pairs to attach to a ranked result. Summarizers never see
//! each other and never see the ranker's weight.

use crate::adapters::{families, ChainAdapter, SimpleAdapter};
use crate::codec::forward_block::ForwardBlock;
use crate::ids::{AttribNo, DocNo};
use crate::kv::KvStore;

pub trait Summarizer {
    fn summarize(&self, store: &dyn KvStore, docno: DocNo) -> Vec<(String, String)>;
}

/// Echoes a single stored document attribute (e.g. `title`).
pub struct AttributeSummarizer {
    pub field_name: String,
    pub attrib: AttribNo,
}

impl Summarizer for AttributeSummarizer {
    fn summarize(&self, store: &dyn KvStore, docno: DocNo) -> Vec<(String, String)> {
        let adapter = SimpleAdapter::new(families::DOC_ATTRIBUTE);
        match adapter.load(store, &[docno.value(), self.attrib.value()]) {
            Some(bytes) => match String::from_utf8(bytes) {
                Ok(v) => vec![(self.field_name.clone(), v)],
                Err(_) => Vec::new(),
            },
            None => Vec::new(),
        }
    }
}

/// Concatenates the forward-index terms around the document's matched
/// positions into a short excerpt.
pub struct ForwardExcerptSummarizer {
    pub field_name: String,
    pub type_no: u32,
    pub window: usize,
}

impl Summarizer for ForwardExcerptSummarizer {
    fn summarize(&self, store: &dyn KvStore, docno: DocNo) -> Vec<(String, String)> {
        let adapter = ChainAdapter::new(families::FORWARD_INDEX);
        let fixed = [docno.value(), self.type_no];
        let mut terms: Vec<String> = Vec::new();
        for (_, bytes) in adapter.iter_chain(store, &fixed) {
            if let Ok(block) = ForwardBlock::decode(&bytes) {
                terms.extend(block.terms.iter().take(self.window.saturating_sub(terms.len())).cloned());
            }
            if terms.len() >= self.window {
                break;
            }
        }
        if terms.is_empty() {
            Vec::new()
        } else {
            vec![(self.field_name.clone(), terms.join(" "))]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::memory::MemoryStore;

    #[test]
    fn attribute_summarizer_reads_stored_value() {
        let store = MemoryStore::new();
        let adapter = SimpleAdapter::new(families::DOC_ATTRIBUTE);
        let mut tx = store.transaction();
        adapter.store(&mut *tx, &[7, 1], b"Hello World");
        tx.commit().unwrap();

        let s = AttributeSummarizer { field_name: "title".into(), attrib: AttribNo(1) };
        assert_eq!(s.summarize(&store, DocNo(7)), vec![("title".to_string(), "Hello World".to_string())]);
    }

    #[test]
    fn forward_excerpt_reads_terms_in_window() {
        let store = MemoryStore::new();
        let adapter = ChainAdapter::new(families::FORWARD_INDEX);
        let mut block = crate::codec::forward_block::ForwardBlock::default();
        block.append(1, "the".into()).unwrap();
        block.append(2, "quick".into()).unwrap();
        block.append(3, "fox".into()).unwrap();
        let mut tx = store.transaction();
        adapter.store(&mut *tx, &[3, 1], block.block_id(), &block.encode());
        tx.commit().unwrap();

        let s = ForwardExcerptSummarizer { field_name: "excerpt".into(), type_no: 1, window: 2 };
        let out = s.summarize(&store, DocNo(3));
        assert_eq!(out, vec![("excerpt".to_string(), "the quick".to_string())]);
    }
}
