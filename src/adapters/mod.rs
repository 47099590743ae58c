//! C3 — Database Adapters (spec §4.3, §3.2).
//!
//! Each adapter composes a key from its family's single-byte prefix plus a
//! `BlockKey` of 1-3 integer components, keeping every family's keyspace
//! disjoint inside the generic ordered store (C1). Integer components are
//! encoded big-endian so byte-lexicographic key order matches numeric order,
//! which is what makes `seek_upper_bound` a valid chain-block locator.

use crate::error::Result;
use crate::kv::{Cursor, KvStore};

pub mod families {
    pub const TERM_TYPE: u8 = 1;
    pub const TERM_VALUE: u8 = 2;
    pub const DOC_ID: u8 = 3;
    pub const USER_NAME: u8 = 4;
    pub const ATTRIB_KEY: u8 = 5;
    pub const VARIABLE: u8 = 6;
    pub const DOC_ATTRIBUTE: u8 = 7;
    pub const DOC_METADATA: u8 = 8;
    pub const METADATA_DESCR: u8 = 9;
    pub const DOC_FREQUENCY: u8 = 10;
    pub const POSINFO: u8 = 11;
    pub const DOC_LIST: u8 = 12;
    pub const USER_ACL: u8 = 13;
    pub const ACL: u8 = 14;
    pub const FORWARD_INDEX: u8 = 15;
    pub const INVERSE_TERM: u8 = 16;
    pub const STRUCT_INDEX: u8 = 17;
}

/// `prefix ++ name` — used by the five name dictionaries and `Variable`.
pub fn name_key(prefix: u8, name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + name.len());
    key.push(prefix);
    key.extend_from_slice(name.as_bytes());
    key
}

/// `prefix ++ component(BE32) ++ component(BE32) ++ ...`
pub fn component_key(prefix: u8, components: &[u32]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 4 * components.len());
    key.push(prefix);
    for c in components {
        key.extend_from_slice(&c.to_be_bytes());
    }
    key
}

fn decode_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes(bytes.try_into().unwrap())
}

/// Read/write a name -> id mapping (`TermType`, `TermValue`, `DocId`,
/// `UserName`, `AttribKey`).
pub struct NameDictionary {
    prefix: u8,
}

impl NameDictionary {
    pub fn new(prefix: u8) -> Self {
        NameDictionary { prefix }
    }

    pub fn get(&self, store: &dyn KvStore, name: &str) -> Option<u32> {
        store.read_value(&name_key(self.prefix, name)).map(|v| decode_u32_be(&v))
    }

    pub fn write_imm(&self, store: &dyn KvStore, name: &str, id: u32) {
        store.write_imm(&name_key(self.prefix, name), &id.to_be_bytes());
    }

    pub fn stage(&self, writer: &mut dyn crate::kv::Writer, name: &str, id: u32) {
        writer.write(&name_key(self.prefix, name), &id.to_be_bytes());
    }
}

/// A singleton numeric global variable (`NofDocs`, `TermNo`, ... per §3.6).
pub struct VariableSlot {
    name: &'static str,
}

impl VariableSlot {
    pub const fn new(name: &'static str) -> Self {
        VariableSlot { name }
    }

    pub fn get(&self, store: &dyn KvStore) -> Option<u64> {
        store
            .read_value(&name_key(families::VARIABLE, self.name))
            .map(|v| u64::from_be_bytes(v.try_into().unwrap()))
    }

    pub fn write_imm(&self, store: &dyn KvStore, value: u64) {
        store.write_imm(&name_key(families::VARIABLE, self.name), &value.to_be_bytes());
    }

    pub fn stage(&self, writer: &mut dyn crate::kv::Writer, value: u64) {
        writer.write(&name_key(families::VARIABLE, self.name), &value.to_be_bytes());
    }
}

pub mod variables {
    use super::VariableSlot;
    pub const TERM_NO: VariableSlot = VariableSlot::new("TermNo");
    pub const TYPE_NO: VariableSlot = VariableSlot::new("TypeNo");
    pub const DOC_NO: VariableSlot = VariableSlot::new("DocNo");
    pub const ATTRIB_NO: VariableSlot = VariableSlot::new("AttribNo");
    pub const USER_NO: VariableSlot = VariableSlot::new("UserNo");
    pub const NOF_DOCS: VariableSlot = VariableSlot::new("NofDocs");
    pub const BYTE_ORDER_MARK: VariableSlot = VariableSlot::new("ByteOrderMark");
    pub const VERSION: VariableSlot = VariableSlot::new("Version");
}

/// A single, non-chained value keyed by 1-2 integer components
/// (`DocAttribute`, `DocMetaData`, `DocFrequency`, `InverseTerm`).
pub struct SimpleAdapter {
    prefix: u8,
}

impl SimpleAdapter {
    pub fn new(prefix: u8) -> Self {
        SimpleAdapter { prefix }
    }

    pub fn key(&self, components: &[u32]) -> Vec<u8> {
        component_key(self.prefix, components)
    }

    pub fn load(&self, store: &dyn KvStore, components: &[u32]) -> Option<Vec<u8>> {
        store.read_value(&self.key(components))
    }

    pub fn store(&self, writer: &mut dyn crate::kv::Writer, components: &[u32], value: &[u8]) {
        writer.write(&self.key(components), value);
    }

    pub fn remove(&self, writer: &mut dyn crate::kv::Writer, components: &[u32]) {
        writer.remove(&self.key(components));
    }

    pub fn remove_subtree(&self, writer: &mut dyn crate::kv::Writer, prefix_components: &[u32]) {
        writer.remove_subtree(&self.key(prefix_components));
    }
}

/// A chained block family (`Posinfo`, `DocList`, `UserAcl`, `Acl`,
/// `ForwardIndex`): keyed by `fixed components ++ last_key`, blocks ordered
/// by `last_key` (spec §3.2, §4.3).
pub struct ChainAdapter {
    prefix: u8,
}

impl ChainAdapter {
    pub fn new(prefix: u8) -> Self {
        ChainAdapter { prefix }
    }

    fn domain(&self, fixed: &[u32]) -> Vec<u8> {
        component_key(self.prefix, fixed)
    }

    fn full_key(&self, fixed: &[u32], last_key: u32) -> Vec<u8> {
        let mut components: Vec<u32> = fixed.to_vec();
        components.push(last_key);
        component_key(self.prefix, &components)
    }

    pub fn store(&self, writer: &mut dyn crate::kv::Writer, fixed: &[u32], last_key: u32, value: &[u8]) {
        writer.write(&self.full_key(fixed, last_key), value);
    }

    pub fn remove(&self, writer: &mut dyn crate::kv::Writer, fixed: &[u32], last_key: u32) {
        writer.remove(&self.full_key(fixed, last_key));
    }

    pub fn remove_chain(&self, writer: &mut dyn crate::kv::Writer, fixed: &[u32]) {
        writer.remove_subtree(&self.domain(fixed));
    }

    /// Locate the unique block whose key range would contain `search_key`,
    /// if present: the block with the smallest `last_key >= search_key`.
    pub fn load_upper_bound(&self, store: &dyn KvStore, fixed: &[u32], search_key: u32) -> Result<Option<(u32, Vec<u8>)>> {
        let mut cursor = store.cursor();
        let probe = self.full_key(fixed, search_key);
        let domain = self.domain(fixed);
        if cursor.seek_upper_bound(&probe, domain.len()) {
            let last_key = decode_u32_be(&cursor.key().unwrap()[domain.len()..]);
            Ok(Some((last_key, cursor.value().unwrap().to_vec())))
        } else {
            Ok(None)
        }
    }

    pub fn load_first(&self, store: &dyn KvStore, fixed: &[u32]) -> Option<(u32, Vec<u8>)> {
        let domain = self.domain(fixed);
        let mut cursor = store.cursor();
        if cursor.seek_first(&domain) {
            let last_key = decode_u32_be(&cursor.key().unwrap()[domain.len()..]);
            Some((last_key, cursor.value().unwrap().to_vec()))
        } else {
            None
        }
    }

    pub fn load_last(&self, store: &dyn KvStore, fixed: &[u32]) -> Option<(u32, Vec<u8>)> {
        let domain = self.domain(fixed);
        let mut cursor = store.cursor();
        if cursor.seek_last(&domain) {
            let last_key = decode_u32_be(&cursor.key().unwrap()[domain.len()..]);
            Some((last_key, cursor.value().unwrap().to_vec()))
        } else {
            None
        }
    }

    /// Iterate every block in the chain in ascending `last_key` order.
    pub fn iter_chain<'a>(&'a self, store: &'a dyn KvStore, fixed: &'a [u32]) -> ChainIter<'a> {
        let domain = self.domain(fixed);
        let cursor = store.cursor();
        ChainIter { cursor, domain, started: false }
    }
}

pub struct ChainIter<'a> {
    cursor: Box<dyn Cursor + 'a>,
    domain: Vec<u8>,
    started: bool,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = (u32, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        let found = if !self.started {
            self.started = true;
            self.cursor.seek_first(&self.domain)
        } else {
            self.cursor.seek_next()
        };
        if !found {
            return None;
        }
        let last_key = decode_u32_be(&self.cursor.key().unwrap()[self.domain.len()..]);
        Some((last_key, self.cursor.value().unwrap().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::memory::MemoryStore;

    #[test]
    fn chain_adapter_round_trips_and_orders_blocks() {
        let store = MemoryStore::new();
        let adapter = ChainAdapter::new(families::POSINFO);
        let fixed = [1u32, 7u32];

        let mut tx = store.transaction();
        adapter.store(&mut *tx, &fixed, 4, b"blk-a");
        adapter.store(&mut *tx, &fixed, 9, b"blk-b");
        tx.commit().unwrap();

        let (id, val) = adapter.load_upper_bound(&store, &fixed, 2).unwrap().unwrap();
        assert_eq!(id, 4);
        assert_eq!(val, b"blk-a");

        let (id, _) = adapter.load_upper_bound(&store, &fixed, 5).unwrap().unwrap();
        assert_eq!(id, 9);

        assert!(adapter.load_upper_bound(&store, &fixed, 10).unwrap().is_none());

        let chain: Vec<_> = adapter.iter_chain(&store, &fixed).collect();
        assert_eq!(chain.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![4, 9]);
    }

    #[test]
    fn chains_with_different_fixed_components_do_not_collide() {
        let store = MemoryStore::new();
        let adapter = ChainAdapter::new(families::POSINFO);
        let mut tx = store.transaction();
        adapter.store(&mut *tx, &[1, 1], 5, b"a");
        adapter.store(&mut *tx, &[1, 2], 5, b"b");
        tx.commit().unwrap();

        assert_eq!(adapter.load_first(&store, &[1, 1]).unwrap().1, b"a");
        assert_eq!(adapter.load_first(&store, &[1, 2]).unwrap().1, b"b");
    }

    #[test]
    fn name_dictionary_round_trip() {
        let store = MemoryStore::new();
        let dict = NameDictionary::new(families::TERM_TYPE);
        dict.write_imm(&store, "word", 1);
        assert_eq!(dict.get(&store, "word"), Some(1));
        assert_eq!(dict.get(&store, "missing"), None);
    }
}
