//! The staged, not-yet-committed unit of work (spec §4.6).
//!
//! `commit` runs the full pipeline under the storage's commit lock: resolve
//! every deferred id referenced this transaction against the (possibly
//! concurrently updated) name dictionaries, build the KV writer, drain the
//! staged per-chain deltas through the merge writers (C7), update the
//! global variables, commit, then invalidate the metadata cache and hand
//! back the statistics message for the caller to propagate.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::debug;

use crate::adapters::{families, variables, ChainAdapter, SimpleAdapter};
use crate::codec::boolean_block::MergeRange;
use crate::codec::inverse_block::InverseTermBlock;
use crate::codec::metadata_block::{block_no, row_index, MetaDataBlock};
use crate::error::{Error, Result};
use crate::ids::{AttribNo, DocNo, TermType, TermValue};
use crate::merge::{apply_boolean_merges, apply_posting_deltas, replace_forward_chain};
use crate::model::{DocumentEdit, NumericValue};
use crate::stats::StatisticsMessage;
use crate::txmap::TransactionMaps;

use super::Storage;

pub struct Transaction {
    storage: Arc<Storage>,
    edits: Vec<DocumentEdit>,
    deletes: Vec<String>,
}

impl Transaction {
    pub(crate) fn new(storage: Arc<Storage>) -> Self {
        Transaction { storage, edits: Vec::new(), deletes: Vec::new() }
    }

    pub fn insert_document(&mut self, edit: DocumentEdit) -> &mut Self {
        self.edits.push(edit);
        self
    }

    pub fn delete_document(&mut self, docid: impl Into<String>) -> &mut Self {
        self.deletes.push(docid.into());
        self
    }

    pub fn commit(self) -> Result<StatisticsMessage> {
        let storage = self.storage;
        let mut clock = storage.commit_lock.lock();

        if self.edits.is_empty() && self.deletes.is_empty() {
            return Ok(StatisticsMessage {
                storage_id: storage.storage_id.clone(),
                timestamp: clock.tick(),
                generated_at: chrono::Utc::now(),
                nof_docs_delta: 0,
                df_delta: Default::default(),
            });
        }

        let store = storage.kv();
        let existing_doc_ids: HashMap<String, u32> = self
            .edits
            .iter()
            .map(|e| e.docid.clone())
            .chain(self.deletes.iter().cloned())
            .filter_map(|name| storage.doc_resolver.lookup(store, &name).map(|id| (name, id)))
            .collect();

        let mut writer = storage.store.transaction();

        let doc_names: Vec<String> = self.edits.iter().map(|e| e.docid.clone()).chain(self.deletes.iter().cloned()).collect();
        let doc_ids = storage.doc_resolver.resolve_and_stage(store, &mut *writer, &doc_names)?;

        let term_names: Vec<String> =
            self.edits.iter().flat_map(|e| e.terms.iter().map(|t| t.term_value.clone())).collect();
        let term_ids = storage.term_resolver.resolve_and_stage(store, &mut *writer, &term_names)?;

        let mut maps = TransactionMaps::new();

        for docid in &self.deletes {
            let Some(&docno) = existing_doc_ids.get(docid) else {
                continue; // deleting a document that never existed is a no-op
            };
            stage_delete(&storage, &mut maps, DocNo(docno))?;
        }

        for edit in &self.edits {
            let docno = DocNo(doc_ids[&edit.docid]);
            if !existing_doc_ids.contains_key(&edit.docid) {
                maps.mark_document_added();
            }
            stage_insert(&storage, &mut maps, docno, edit, &term_ids)?;
        }

        let nof_docs_delta = maps.docs_added;
        let df_delta_i64 = maps.df_delta.iter().map(|(t, &d)| ((t.0.value(), t.1.value()), d)).collect();

        apply_all(&storage, &mut *writer, maps)?;

        let next_nof_docs = (storage.nof_documents() as i64 + nof_docs_delta).max(0) as u64;
        variables::NOF_DOCS.stage(&mut *writer, next_nof_docs);

        writer.commit()?;

        let timestamp = clock.tick();
        let generated_at = chrono::Utc::now();
        debug!("committed transaction at timestamp {timestamp} ({generated_at})");

        Ok(StatisticsMessage { storage_id: storage.storage_id.clone(), timestamp, generated_at, nof_docs_delta, df_delta: df_delta_i64 })
    }
}

fn stage_delete(storage: &Storage, maps: &mut TransactionMaps, docno: DocNo) -> Result<()> {
    let store = storage.kv();
    let inverse_adapter = SimpleAdapter::new(families::INVERSE_TERM);
    if let Some(bytes) = inverse_adapter.load(store, &[docno.value()]) {
        let block = InverseTermBlock::decode(&bytes)?;
        for entry in &block.entries {
            maps.delete_posting((TermType(entry.type_no), TermValue(entry.term_no)), docno);
        }
    }
    for col in 0..storage.schema.columns.len() {
        maps.set_metadata(docno, col, NumericValue::zero(storage.schema.columns[col].numeric_type));
    }
    if storage.acl {
        maps.revoke_all_acl(docno);
    }
    maps.clear_struct_intervals(docno);
    maps.mark_document_deleted();
    Ok(())
}

fn stage_insert(
    storage: &Storage,
    maps: &mut TransactionMaps,
    docno: DocNo,
    edit: &DocumentEdit,
    term_ids: &HashMap<String, u32>,
) -> Result<()> {
    let store = storage.kv();

    let mut grouped: HashMap<(u32, u32), Vec<u32>> = HashMap::new();
    for t in &edit.terms {
        let (type_no, _) = storage.type_alloc.get_or_create(store, &t.term_type);
        let term_no = term_ids[&t.term_value];
        grouped.entry((type_no, term_no)).or_default().push(t.position);
    }
    let mut forward_by_type: HashMap<u32, Vec<(u32, String)>> = HashMap::new();
    for t in &edit.terms {
        let (type_no, _) = storage.type_alloc.get_or_create(store, &t.term_type);
        forward_by_type.entry(type_no).or_default().push((t.position, t.term_value.clone()));
    }
    for ((type_no, term_no), positions) in grouped {
        maps.insert_posting((TermType(type_no), TermValue(term_no)), docno, positions);
    }
    for (type_no, mut terms) in forward_by_type {
        terms.sort_by_key(|(pos, _)| *pos);
        maps.set_forward(docno, type_no, terms);
    }

    for (name, value) in &edit.attributes {
        let (attrib_no, _) = storage.attrib_alloc.get_or_create(store, name);
        maps.set_attribute(docno, AttribNo(attrib_no), value.clone());
    }

    for (name, value) in &edit.metadata {
        let col = storage
            .schema
            .column_index(name)
            .ok_or_else(|| Error::protocol(format!("unknown metadata column '{name}'")))?;
        maps.set_metadata(docno, col, *value);
    }

    if storage.acl && !edit.acl_users.is_empty() {
        let mut users = Vec::new();
        for name in &edit.acl_users {
            let (user_no, _) = storage.user_alloc.get_or_create(store, name);
            users.push(user_no);
        }
        maps.grant_acl(docno, users);
    }

    if !edit.struct_intervals.is_empty() {
        maps.set_struct_intervals(docno, edit.struct_intervals.clone());
    }

    Ok(())
}

fn apply_all(storage: &Storage, writer: &mut dyn crate::kv::Writer, maps: TransactionMaps) -> Result<()> {
    let store = storage.kv();
    let policy = &storage.fill_policy;
    let mut touched_metadata_blocks = HashSet::new();

    for ((type_no, term_no), deltas) in maps.postings {
        let adapter = ChainAdapter::new(families::POSINFO);
        apply_posting_deltas(&adapter, store, writer, &[type_no.value(), term_no.value()], deltas, policy)?;
    }

    for (term, delta) in maps.df_delta {
        if delta == 0 {
            continue;
        }
        let adapter = SimpleAdapter::new(families::DOC_FREQUENCY);
        let key = [term.0.value(), term.1.value()];
        let current = adapter.load(store, &key).map(|b| u32::from_be_bytes(b.try_into().unwrap()) as i64).unwrap_or(0);
        let next = (current + delta).max(0) as u32;
        adapter.store(writer, &key, &next.to_be_bytes());
    }

    for (docno, entries) in maps.inverse {
        let adapter = SimpleAdapter::new(families::INVERSE_TERM);
        let existing = adapter.load(store, &[docno.value()]).map(|b| InverseTermBlock::decode(&b)).transpose()?;
        let mut all = existing.map(|b| b.entries).unwrap_or_default();
        all.extend(entries);
        adapter.store(writer, &[docno.value()], &InverseTermBlock::new(all).encode());
    }

    for ((docno, attrib), value) in maps.attributes {
        let adapter = SimpleAdapter::new(families::DOC_ATTRIBUTE);
        match value {
            Some(v) => adapter.store(writer, &[docno.value(), attrib.value()], v.as_bytes()),
            None => adapter.remove(writer, &[docno.value(), attrib.value()]),
        }
    }

    for (docno, columns) in maps.metadata {
        let bn = block_no(docno.value(), storage.metadata_block_size);
        touched_metadata_blocks.insert(bn);
        let adapter = SimpleAdapter::new(families::DOC_METADATA);
        let mut block = adapter
            .load(store, &[bn])
            .map(|b| MetaDataBlock::decode(&b, &storage.schema, storage.metadata_block_size))
            .transpose()?
            .unwrap_or_else(|| MetaDataBlock::empty(&storage.schema, storage.metadata_block_size));
        let row = row_index(docno.value(), storage.metadata_block_size);
        for (col, value) in columns {
            block.set(&storage.schema, row, col, value);
        }
        adapter.store(writer, &[bn], &block.encode());
    }

    for (docno, type_no) in maps.forward.keys().map(|(d, t)| (*d, *t)).collect::<HashSet<_>>() {
        if let Some(terms) = maps.forward.get(&(docno, type_no)) {
            let adapter = ChainAdapter::new(families::FORWARD_INDEX);
            replace_forward_chain(&adapter, writer, &[docno.value(), type_no], terms.clone(), policy)?;
        }
    }

    for (docno, intervals) in maps.struct_intervals {
        let adapter = SimpleAdapter::new(families::STRUCT_INDEX);
        match intervals {
            Some(intervals) => adapter.store(writer, &[docno.value()], &crate::codec::struct_block::StructBlock::new(intervals).encode()),
            None => adapter.remove(writer, &[docno.value()]),
        }
    }

    for docno in maps.acl_revoke_all {
        let acl_adapter = ChainAdapter::new(families::ACL);
        for (_, bytes) in acl_adapter.iter_chain(store, &[docno.value()]) {
            let block = crate::codec::boolean_block::BooleanBlock::decode(&bytes)?;
            for user_no in block.iter() {
                let user_adapter = ChainAdapter::new(families::USER_ACL);
                apply_boolean_merges(
                    &user_adapter,
                    store,
                    writer,
                    &[user_no],
                    &[MergeRange { from: docno.value(), to: docno.value(), is_member: false }],
                    policy,
                )?;
            }
        }
        acl_adapter.remove_chain(writer, &[docno.value()]);
    }

    for (docno, users) in maps.acl_grants {
        let acl_adapter = ChainAdapter::new(families::ACL);
        let merges: Vec<MergeRange> = users.iter().map(|&u| MergeRange { from: u, to: u, is_member: true }).collect();
        apply_boolean_merges(&acl_adapter, store, writer, &[docno.value()], &merges, policy)?;
        for user_no in users {
            let user_adapter = ChainAdapter::new(families::USER_ACL);
            apply_boolean_merges(
                &user_adapter,
                store,
                writer,
                &[user_no],
                &[MergeRange { from: docno.value(), to: docno.value(), is_member: true }],
                policy,
            )?;
        }
    }

    storage.cache.invalidate(touched_metadata_blocks);
    Ok(())
}
