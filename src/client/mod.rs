//! C11 — Storage Client Façade (spec §4.11, §4.6).
//!
//! `Storage` is the single entry point an embedder holds: it owns the KV
//! handle, the pinned metadata schema, the metadata block cache, the id
//! allocators, and the commit lock that serializes every transaction's
//! rename-and-write pipeline. `Transaction` batches document edits and
//! commits them as one atomic KV write plus one statistics message.

pub mod checker;
pub mod dump;
pub mod transaction;

use std::sync::Arc;

use log::info;
use parking_lot::Mutex;

use crate::adapters::{families, variables, ChainAdapter, NameDictionary, SimpleAdapter};
use crate::alloc::{DeferredNameResolver, ImmediateAllocator};
use crate::cache::MetaDataCache;
use crate::codec::metadata_block::{block_no, row_index, MetaDataBlock};
use crate::config::StorageConfig;
use crate::error::Result;
use crate::ids::{DocNo, TermType, TermValue};
use crate::iter::{PostingIterator, TermIterator};
use crate::kv::memory::MemoryStore;
use crate::kv::KvStore;
use crate::merge::FillPolicy;
use crate::model::{MetaDataSchema, NumericValue};
use crate::stats::{Clock, StatisticsStorage};

pub use transaction::Transaction;

pub struct Storage {
    pub(crate) store: Arc<dyn KvStore>,
    pub schema: MetaDataSchema,
    pub acl: bool,
    pub metadata_block_size: u32,
    pub cache: MetaDataCache,
    pub(crate) fill_policy: FillPolicy,
    pub(crate) type_alloc: ImmediateAllocator,
    pub(crate) attrib_alloc: ImmediateAllocator,
    pub(crate) user_alloc: ImmediateAllocator,
    pub(crate) term_resolver: DeferredNameResolver,
    pub(crate) doc_resolver: DeferredNameResolver,
    pub(crate) commit_lock: Mutex<Clock>,
    pub(crate) peer_stats: Mutex<StatisticsStorage>,
    pub(crate) storage_id: String,
}

impl Storage {
    fn assemble(store: Arc<dyn KvStore>, config: &StorageConfig) -> Arc<Storage> {
        Arc::new(Storage {
            store,
            schema: config.metadata.clone(),
            acl: config.acl,
            metadata_block_size: crate::codec::metadata_block::DEFAULT_BLOCK_SIZE,
            cache: MetaDataCache::default(),
            fill_policy: match config.max_block_size {
                Some(max_block_size) => FillPolicy { max_block_size, ..FillPolicy::default() },
                None => FillPolicy::default(),
            },
            type_alloc: ImmediateAllocator::new(families::TERM_TYPE, &variables::TYPE_NO),
            attrib_alloc: ImmediateAllocator::new(families::ATTRIB_KEY, &variables::ATTRIB_NO),
            user_alloc: ImmediateAllocator::new(families::USER_NAME, &variables::USER_NO),
            term_resolver: DeferredNameResolver::new(families::TERM_VALUE, &variables::TERM_NO),
            doc_resolver: DeferredNameResolver::new(families::DOC_ID, &variables::DOC_NO),
            commit_lock: Mutex::new(Clock::default()),
            peer_stats: Mutex::new(StatisticsStorage::new()),
            storage_id: config.path.clone(),
        })
    }

    /// Create a fresh storage. The concrete KV engine is out of scope (spec
    /// §1 Non-goals); this façade is backed by the in-memory reference
    /// implementation (C1) regardless of `config.path`.
    pub fn create_storage(config: &StorageConfig) -> Result<Arc<Storage>> {
        info!("creating storage at {}", config.path);
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        variables::VERSION.write_imm(store.as_ref(), 1);
        Ok(Storage::assemble(store, config))
    }

    pub fn open_storage(config: &StorageConfig) -> Result<Arc<Storage>> {
        info!("opening storage at {}", config.path);
        Storage::create_storage(config)
    }

    fn kv(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    pub fn begin_transaction(self: &Arc<Self>) -> Transaction {
        Transaction::new(Arc::clone(self))
    }

    pub fn nof_documents(&self) -> u64 {
        variables::NOF_DOCS.get(self.kv()).unwrap_or(0)
    }

    pub fn document_frequency(&self, type_no: TermType, term_no: TermValue) -> u64 {
        let adapter = SimpleAdapter::new(families::DOC_FREQUENCY);
        adapter
            .load(self.kv(), &[type_no.value(), term_no.value()])
            .map(|bytes| u32::from_be_bytes(bytes.try_into().unwrap()) as u64)
            .unwrap_or(0)
    }

    pub fn lookup_docno(&self, docid: &str) -> Option<DocNo> {
        self.doc_resolver.lookup(self.kv(), docid).map(DocNo)
    }

    pub fn lookup_term_value(&self, value: &str) -> Option<TermValue> {
        self.term_resolver.lookup(self.kv(), value).map(TermValue)
    }

    pub fn lookup_term_type(&self, name: &str) -> Option<TermType> {
        self.type_alloc.get(self.kv(), name).map(TermType)
    }

    pub fn lookup_user(&self, name: &str) -> Option<u32> {
        self.user_alloc.get(self.kv(), name)
    }

    pub fn term_iterator(&self, type_no: TermType, term_no: TermValue) -> TermIterator<'_> {
        let df = self.document_frequency(type_no, term_no);
        TermIterator::new(self.kv(), type_no, term_no, df)
    }

    /// `block_id`s of a term's posting chain in ascending order (spec §3.2),
    /// for callers inspecting merge behavior rather than just iterating postings.
    pub fn posting_chain_block_ids(&self, type_no: TermType, term_no: TermValue) -> Vec<u32> {
        ChainAdapter::new(families::POSINFO)
            .iter_chain(self.kv(), &[type_no.value(), term_no.value()])
            .map(|(block_id, _)| block_id)
            .collect()
    }

    /// Docnos granted to `user_no`, ascending, read through the inverse ACL
    /// chain (spec §4.8 `InvertedAclIterator`).
    pub fn acl_members_of_user(&self, user_no: u32) -> Vec<u32> {
        let mut it = crate::iter::InvertedAclIterator::new(self.kv(), user_no);
        let mut out = Vec::new();
        let mut next = 0u32;
        while let Some(d) = it.skip_doc(next) {
            out.push(d);
            next = d + 1;
        }
        out
    }

    pub fn metadata(&self, docno: DocNo, column: &str) -> Result<Option<NumericValue>> {
        let Some(col) = self.schema.column_index(column) else { return Ok(None) };
        let block_size = self.metadata_block_size;
        let bn = block_no(docno.value(), block_size);
        let schema = &self.schema;
        let store = self.kv();
        let block = self.cache.get_or_load(bn, schema, || {
            let adapter = SimpleAdapter::new(families::DOC_METADATA);
            match adapter.load(store, &[bn]) {
                Some(bytes) => Ok(Some(MetaDataBlock::decode(&bytes, schema, block_size)?)),
                None => Ok(None),
            }
        })?;
        Ok(block.map(|b| b.get(&self.schema, row_index(docno.value(), block_size), col)))
    }

    /// The structure intervals stored for `docno`, if any (spec §4.8,
    /// "Structure-bounded variants"), for building a [`crate::iter::StructureBounded`]
    /// join over this storage's term iterators.
    pub fn struct_intervals(&self, docno: DocNo) -> Result<Option<crate::codec::struct_block::StructBlock>> {
        crate::iter::load_struct_block(self.kv(), docno.value())
    }

    pub fn lookup_attribute(&self, docno: DocNo, name: &str) -> Option<String> {
        let attrib_no = self.attrib_alloc.get(self.kv(), name)?;
        let adapter = SimpleAdapter::new(families::DOC_ATTRIBUTE);
        adapter.load(self.kv(), &[docno.value(), attrib_no]).and_then(|b| String::from_utf8(b).ok())
    }

    pub fn acl_chain(&self) -> ChainAdapter {
        ChainAdapter::new(families::ACL)
    }

    pub fn user_acl_chain(&self) -> ChainAdapter {
        ChainAdapter::new(families::USER_ACL)
    }

    pub fn name_dictionary(&self, family: u8) -> NameDictionary {
        NameDictionary::new(family)
    }

    /// Fold a statistics message from another storage into this storage's
    /// peer view (spec §4.10). Local quantities (`nof_documents`,
    /// `document_frequency`) always reflect this storage alone; the
    /// collection-wide view used by a distributed evaluator is this storage's
    /// local counts plus every peer's aggregated contribution.
    pub fn apply_peer_statistics(&self, message: crate::stats::StatisticsMessage) {
        self.peer_stats.lock().put_message(message);
    }

    pub fn collection_nof_documents(&self) -> u64 {
        self.nof_documents() + self.peer_stats.lock().nof_documents()
    }

    pub fn collection_document_frequency(&self, type_no: TermType, term_no: TermValue) -> u64 {
        self.document_frequency(type_no, term_no) + self.peer_stats.lock().document_frequency(type_no.value(), term_no.value())
    }
}

/// Walk every stored key and report families whose bytes fail to decode
/// under their own codec (spec §4.11.6). Logs each finding at `warn` level
/// and returns the same list for a caller that wants a non-interactive
/// report.
pub fn check_storage(storage: &Storage) -> Result<Vec<String>> {
    use crate::codec::{boolean_block::BooleanBlock, forward_block::ForwardBlock, inverse_block::InverseTermBlock, posting_block::PostingBlock};

    let mut problems = Vec::new();
    for entry in dump::DumpIterator::new(storage) {
        let entry = entry?;
        let decodes = match entry.family {
            f if f == families::POSINFO => PostingBlock::decode(&entry.value).is_ok(),
            f if f == families::DOC_LIST || f == families::ACL || f == families::USER_ACL => {
                BooleanBlock::decode(&entry.value).is_ok()
            }
            f if f == families::FORWARD_INDEX => ForwardBlock::decode(&entry.value).is_ok(),
            f if f == families::INVERSE_TERM => InverseTermBlock::decode(&entry.value).is_ok(),
            _ => true,
        };
        if !decodes {
            let msg = format!("family {} key {:?} failed to decode", entry.family, entry.key);
            log::warn!("{msg}");
            problems.push(msg);
        }
    }
    Ok(problems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentEdit, NumericValue};

    fn config() -> StorageConfig {
        StorageConfig::parse("path=mem;metadata=doclen u32").unwrap()
    }

    #[test]
    fn create_open_roundtrip_one_document() {
        let storage = Storage::create_storage(&config()).unwrap();
        let mut tx = storage.begin_transaction();
        let mut edit = DocumentEdit::new("doc-1");
        edit.add_term("word", "hello", 1).add_term("word", "world", 2).set_metadata("doclen", NumericValue::U32(2));
        tx.insert_document(edit);
        tx.commit().unwrap();

        assert_eq!(storage.nof_documents(), 1);
        let docno = storage.lookup_docno("doc-1").unwrap();
        assert_eq!(storage.metadata(docno, "doclen").unwrap(), Some(NumericValue::U32(2)));

        let type_no = storage.lookup_term_type("word").unwrap();
        let term_no = storage.lookup_term_value("hello").unwrap();
        assert_eq!(storage.document_frequency(type_no, term_no), 1);
        let mut it = storage.term_iterator(type_no, term_no);
        use crate::iter::PostingIterator;
        assert_eq!(it.skip_doc(docno.value()), Some(docno.value()));
    }

    #[test]
    fn check_storage_is_clean_after_a_normal_commit() {
        let storage = Storage::create_storage(&config()).unwrap();
        let mut tx = storage.begin_transaction();
        let mut edit = DocumentEdit::new("doc-1");
        edit.add_term("word", "hello", 1);
        tx.insert_document(edit);
        tx.commit().unwrap();
        assert!(check_storage(&storage).unwrap().is_empty());
    }

    #[test]
    fn peer_statistics_add_to_local_collection_view() {
        use crate::stats::StatisticsMessage;

        let storage = Storage::create_storage(&config()).unwrap();
        let mut tx = storage.begin_transaction();
        let mut edit = DocumentEdit::new("doc-1");
        edit.add_term("word", "hello", 1);
        tx.insert_document(edit);
        tx.commit().unwrap();

        let type_no = storage.lookup_term_type("word").unwrap();
        let term_no = storage.lookup_term_value("hello").unwrap();

        let mut df_delta = std::collections::BTreeMap::new();
        df_delta.insert((type_no.value(), term_no.value()), 3i64);
        storage.apply_peer_statistics(StatisticsMessage {
            storage_id: "peer-1".into(),
            timestamp: 1,
            generated_at: chrono::Utc::now(),
            nof_docs_delta: 3,
            df_delta,
        });

        assert_eq!(storage.nof_documents(), 1);
        assert_eq!(storage.collection_nof_documents(), 4);
        assert_eq!(storage.collection_document_frequency(type_no, term_no), 4);
    }

    #[test]
    fn struct_intervals_round_trip_and_clear_on_delete() {
        let storage = Storage::create_storage(&config()).unwrap();
        let mut tx = storage.begin_transaction();
        let mut edit = DocumentEdit::new("doc-1");
        edit.add_term("word", "hello", 1).add_struct_interval(0, 2).add_struct_interval(3, 6);
        tx.insert_document(edit);
        tx.commit().unwrap();

        let docno = storage.lookup_docno("doc-1").unwrap();
        let block = storage.struct_intervals(docno).unwrap().unwrap();
        assert_eq!(block.intervals, vec![(0, 2), (3, 6)]);

        let mut tx = storage.begin_transaction();
        tx.delete_document("doc-1");
        tx.commit().unwrap();
        assert!(storage.struct_intervals(docno).unwrap().is_none());
    }
}
