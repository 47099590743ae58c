//! Reference `KvStore` implementation: an ordered in-memory map guarded by a
//! single lock, with clone-on-write snapshots for cursor isolation. Stands in
//! for "the concrete KV database engine" (spec §1 Non-goals, §4.1).

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use super::{Cursor, KvStore, Writer};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

pub struct MemoryStore {
    data: RwLock<Arc<Map>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore { data: RwLock::new(Arc::new(BTreeMap::new())) }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

enum Op {
    Write(Vec<u8>, Vec<u8>),
    Remove(Vec<u8>),
    RemoveSubtree(Vec<u8>),
}

struct MemoryWriter<'a> {
    store: &'a MemoryStore,
    ops: Vec<Op>,
}

impl<'a> Writer for MemoryWriter<'a> {
    fn write(&mut self, key: &[u8], value: &[u8]) {
        self.ops.push(Op::Write(key.to_vec(), value.to_vec()));
    }

    fn remove(&mut self, key: &[u8]) {
        self.ops.push(Op::Remove(key.to_vec()));
    }

    fn remove_subtree(&mut self, prefix: &[u8]) {
        self.ops.push(Op::RemoveSubtree(prefix.to_vec()));
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let mut guard = self.store.data.write();
        let mut next = (**guard).clone();
        for op in self.ops {
            match op {
                Op::Write(k, v) => {
                    next.insert(k, v);
                }
                Op::Remove(k) => {
                    next.remove(&k);
                }
                Op::RemoveSubtree(prefix) => {
                    let keys: Vec<Vec<u8>> = next
                        .range(prefix.clone()..)
                        .take_while(|(k, _)| k.starts_with(&prefix))
                        .map(|(k, _)| k.clone())
                        .collect();
                    for k in keys {
                        next.remove(&k);
                    }
                }
            }
        }
        *guard = Arc::new(next);
        Ok(())
    }

    fn rollback(self: Box<Self>) {
        // Nothing was ever applied to the shared map; dropping is enough.
    }
}

/// Smallest byte string that is strictly greater than every string with the
/// given prefix, or `None` if the prefix is all `0xff` (no finite upper
/// bound exists).
fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bound = prefix.to_vec();
    while let Some(&last) = bound.last() {
        if last == 0xff {
            bound.pop();
        } else {
            *bound.last_mut().unwrap() += 1;
            return Some(bound);
        }
    }
    None
}

struct MemoryCursor {
    snapshot: Arc<Map>,
    domain: Vec<u8>,
    current: Option<Vec<u8>>,
}

impl Cursor for MemoryCursor {
    fn seek_upper_bound(&mut self, key: &[u8], domain_key_size: usize) -> bool {
        let domain_key_size = domain_key_size.min(key.len());
        self.domain = key[..domain_key_size].to_vec();
        match self.snapshot.range(key.to_vec()..).next() {
            Some((k, _)) if k.starts_with(&self.domain) => {
                self.current = Some(k.clone());
                true
            }
            _ => {
                self.current = None;
                false
            }
        }
    }

    fn seek_first(&mut self, domain_prefix: &[u8]) -> bool {
        self.domain = domain_prefix.to_vec();
        match self.snapshot.range(domain_prefix.to_vec()..).next() {
            Some((k, _)) if k.starts_with(&self.domain) => {
                self.current = Some(k.clone());
                true
            }
            _ => {
                self.current = None;
                false
            }
        }
    }

    fn seek_last(&mut self, domain_prefix: &[u8]) -> bool {
        self.domain = domain_prefix.to_vec();
        let found = match prefix_upper_bound(domain_prefix) {
            Some(upper) => self.snapshot.range(domain_prefix.to_vec()..upper).next_back(),
            None => self.snapshot.range(domain_prefix.to_vec()..).next_back(),
        };
        match found {
            Some((k, _)) => {
                self.current = Some(k.clone());
                true
            }
            None => {
                self.current = None;
                false
            }
        }
    }

    fn seek_next(&mut self) -> bool {
        let Some(cur) = self.current.clone() else { return false };
        let mut next_key = cur;
        next_key.push(0); // smallest key strictly greater than `cur` with `cur` as prefix or not
        match self.snapshot.range(next_key..).next() {
            Some((k, _)) if k.starts_with(&self.domain) => {
                self.current = Some(k.clone());
                true
            }
            _ => {
                self.current = None;
                false
            }
        }
    }

    fn seek_prev(&mut self) -> bool {
        let Some(cur) = self.current.clone() else { return false };
        match self.snapshot.range(..cur).next_back() {
            Some((k, _)) if k.starts_with(&self.domain) => {
                self.current = Some(k.clone());
                true
            }
            _ => {
                self.current = None;
                false
            }
        }
    }

    fn key(&self) -> Option<&[u8]> {
        self.current.as_deref()
    }

    fn value(&self) -> Option<&[u8]> {
        self.current.as_ref().and_then(|k| self.snapshot.get(k)).map(|v| v.as_slice())
    }
}

impl KvStore for MemoryStore {
    fn transaction(&self) -> Box<dyn Writer + '_> {
        Box::new(MemoryWriter { store: self, ops: Vec::new() })
    }

    fn cursor(&self) -> Box<dyn Cursor + '_> {
        let snapshot = self.data.read().clone();
        Box::new(MemoryCursor { snapshot, domain: Vec::new(), current: None })
    }

    fn read_value(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    fn write_imm(&self, key: &[u8], value: &[u8]) {
        let mut guard = self.data.write();
        let mut next = (**guard).clone();
        next.insert(key.to_vec(), value.to_vec());
        *guard = Arc::new(next);
    }

    fn remove_imm(&self, key: &[u8]) {
        let mut guard = self.data.write();
        let mut next = (**guard).clone();
        next.remove(key);
        *guard = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_is_atomic_and_ordered() {
        let store = MemoryStore::new();
        let mut tx = store.transaction();
        tx.write(b"a1", b"1");
        tx.write(b"a2", b"2");
        tx.write(b"b1", b"3");
        tx.commit().unwrap();

        let mut cursor = store.cursor();
        assert!(cursor.seek_first(b"a"));
        assert_eq!(cursor.key(), Some(&b"a1"[..]));
        assert!(cursor.seek_next());
        assert_eq!(cursor.key(), Some(&b"a2"[..]));
        assert!(!cursor.seek_next());
    }

    #[test]
    fn cursor_sees_pre_commit_snapshot() {
        let store = MemoryStore::new();
        store.write_imm(b"a1", b"1");
        let cursor = store.cursor();

        let mut tx = store.transaction();
        tx.write(b"a2", b"2");
        tx.commit().unwrap();

        // Cursor opened before the second write does not see it.
        assert_eq!(cursor.value(), None);
        assert_eq!(store.read_value(b"a2"), Some(b"2".to_vec()));
    }

    #[test]
    fn remove_subtree_deletes_prefix_only() {
        let store = MemoryStore::new();
        let mut tx = store.transaction();
        tx.write(b"p\x00a", b"1");
        tx.write(b"p\x00b", b"2");
        tx.write(b"q\x00a", b"3");
        tx.commit().unwrap();

        let mut tx = store.transaction();
        tx.remove_subtree(b"p\x00");
        tx.commit().unwrap();

        assert_eq!(store.read_value(b"p\x00a"), None);
        assert_eq!(store.read_value(b"q\x00a"), Some(b"3".to_vec()));
    }

    #[test]
    fn rollback_on_drop_discards_writes() {
        let store = MemoryStore::new();
        {
            let mut tx = store.transaction();
            tx.write(b"a", b"1");
            // dropped without commit
            drop(tx);
        }
        assert_eq!(store.read_value(b"a"), None);
    }
}
