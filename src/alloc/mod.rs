//! C5 — Key Allocators (spec §4.5).
//!
//! `TermType`/`UserNo`/`AttribNo` are immediate: a short allocator mutex
//! guards "look up, assign-if-absent, write synchronously" outside the
//! enclosing transaction. `TermValue`/`DocNo` are deferred: new names are
//! resolved to final ids — under the commit lock, as part of the same KV
//! transaction — only when the transaction commits, via
//! [`DeferredNameResolver::resolve_and_stage`].

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::adapters::{NameDictionary, VariableSlot};
use crate::error::Result;
use crate::kv::{KvStore, Writer};

/// Immediate allocator: `get_or_create` is synchronous and visible to every
/// reader before it returns, independent of any enclosing transaction.
pub struct ImmediateAllocator {
    dict: NameDictionary,
    counter: &'static VariableSlot,
    lock: Mutex<()>,
}

impl ImmediateAllocator {
    pub fn new(prefix: u8, counter: &'static VariableSlot) -> Self {
        ImmediateAllocator { dict: NameDictionary::new(prefix), counter, lock: Mutex::new(()) }
    }

    /// Returns `(id, is_new)`.
    pub fn get_or_create(&self, store: &dyn KvStore, name: &str) -> (u32, bool) {
        let _guard = self.lock.lock();
        if let Some(id) = self.dict.get(store, name) {
            return (id, false);
        }
        let next = self.counter.get(store).unwrap_or(0) as u32 + 1;
        self.dict.write_imm(store, name, next);
        self.counter.write_imm(store, next as u64);
        (next, true)
    }

    pub fn get(&self, store: &dyn KvStore, name: &str) -> Option<u32> {
        self.dict.get(store, name)
    }
}

/// Resolves a batch of new names for a deferred family to final ids, under
/// the commit lock, staging the name->id mappings and the updated counter
/// into the same KV transaction as every other commit write (spec §4.5,
/// §4.6 step 1). Names already known to the store keep their existing id —
/// "collisions with existing names are detected under the commit lock and
/// the existing id is substituted".
pub struct DeferredNameResolver {
    dict: NameDictionary,
    counter: &'static VariableSlot,
}

impl DeferredNameResolver {
    pub fn new(prefix: u8, counter: &'static VariableSlot) -> Self {
        DeferredNameResolver { dict: NameDictionary::new(prefix), counter }
    }

    pub fn lookup(&self, store: &dyn KvStore, name: &str) -> Option<u32> {
        self.dict.get(store, name)
    }

    /// Resolve every distinct name in `names`, staging writes for any that
    /// are new. Returns the name -> final id map for the whole batch.
    pub fn resolve_and_stage(
        &self,
        store: &dyn KvStore,
        writer: &mut dyn Writer,
        names: &[String],
    ) -> Result<HashMap<String, u32>> {
        let mut resolved = HashMap::new();
        let mut next = self.counter.get(store).unwrap_or(0) as u32;
        for name in names {
            if resolved.contains_key(name) {
                continue;
            }
            let id = if let Some(existing) = self.dict.get(store, name) {
                existing
            } else {
                next += 1;
                self.dict.stage(writer, name, next);
                next
            };
            resolved.insert(name.clone(), id);
        }
        self.counter.stage(writer, next as u64);
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{families, variables};
    use crate::kv::memory::MemoryStore;

    #[test]
    fn immediate_allocator_assigns_once_per_name() {
        let store = MemoryStore::new();
        let alloc = ImmediateAllocator::new(families::TERM_TYPE, &variables::TYPE_NO);
        let (a, is_new_a) = alloc.get_or_create(&store, "word");
        assert!(is_new_a);
        let (b, is_new_b) = alloc.get_or_create(&store, "word");
        assert_eq!(a, b);
        assert!(!is_new_b);
        let (c, _) = alloc.get_or_create(&store, "struct");
        assert_ne!(a, c);
    }

    #[test]
    fn deferred_resolver_reuses_existing_and_assigns_new() {
        let store = MemoryStore::new();
        let resolver = DeferredNameResolver::new(families::TERM_VALUE, &variables::TERM_NO);

        let mut tx = store.transaction();
        let first = resolver
            .resolve_and_stage(&store, &mut *tx, &["hello".into(), "world".into(), "hello".into()])
            .unwrap();
        tx.commit().unwrap();
        assert_eq!(first["hello"], first["hello"]);
        assert_ne!(first["hello"], first["world"]);

        let mut tx = store.transaction();
        let second = resolver.resolve_and_stage(&store, &mut *tx, &["hello".into(), "new".into()]).unwrap();
        tx.commit().unwrap();
        assert_eq!(second["hello"], first["hello"]);
        assert!(!first.values().any(|&v| v == second["new"]));
    }
}
