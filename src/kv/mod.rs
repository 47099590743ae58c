//! C1 — KV Store Interface (spec §4.1).
//!
//! An ordered byte-key/byte-value store with transactional writes and
//! snapshot-isolated cursors. The concrete storage engine is out of scope
//! (spec §1 Non-goals); this module defines the trait boundary plus an
//! in-memory reference implementation used by the rest of the crate and its
//! tests, treating the concrete KV database engine as an external
//! collaborator named only by interface.

pub mod memory;

use crate::error::Result;

/// A writer collects mutations and applies them atomically on `commit`.
/// Dropping without committing is an implicit rollback (spec §4.1).
pub trait Writer {
    fn write(&mut self, key: &[u8], value: &[u8]);
    fn remove(&mut self, key: &[u8]);
    /// Remove every key whose bytes start with `prefix`.
    fn remove_subtree(&mut self, prefix: &[u8]);
    fn commit(self: Box<Self>) -> Result<()>;
    fn rollback(self: Box<Self>);
}

/// A snapshot-isolated cursor over the store as of the moment it was created.
pub trait Cursor {
    /// Seek to the smallest key that is `>= key` and whose first
    /// `domain_key_size` bytes equal `key`'s corresponding prefix; `None` if
    /// no such key exists.
    fn seek_upper_bound(&mut self, key: &[u8], domain_key_size: usize) -> bool;
    fn seek_first(&mut self, domain_prefix: &[u8]) -> bool;
    fn seek_last(&mut self, domain_prefix: &[u8]) -> bool;
    fn seek_next(&mut self) -> bool;
    fn seek_prev(&mut self) -> bool;
    fn key(&self) -> Option<&[u8]>;
    fn value(&self) -> Option<&[u8]>;
}

/// The store handle: opens/creates a database and hands out writers and
/// snapshot cursors.
pub trait KvStore: Send + Sync {
    fn transaction(&self) -> Box<dyn Writer + '_>;
    fn cursor(&self) -> Box<dyn Cursor + '_>;
    fn read_value(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn write_imm(&self, key: &[u8], value: &[u8]);
    fn remove_imm(&self, key: &[u8]);
}
