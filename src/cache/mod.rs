//! C4 — Metadata Block Cache (spec §4.4).
//!
//! A process-wide, read-through cache of decoded [`MetaDataBlock`]s keyed by
//! block number. Bounded by a maximum block count (LRU eviction); lazily
//! filled on first read; invalidated per-block by the committing transaction
//! (last installer wins a race between two readers decoding the same miss).

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::codec::metadata_block::{block_no, MetaDataBlock};
use crate::error::Result;
use crate::model::MetaDataSchema;

pub const DEFAULT_MAX_BLOCKS: usize = 256;

pub struct MetaDataCache {
    entries: Mutex<LruCache<u32, Arc<MetaDataBlock>>>,
}

impl MetaDataCache {
    pub fn new(max_blocks: usize) -> Self {
        let cap = NonZeroUsize::new(max_blocks.max(1)).unwrap();
        MetaDataCache { entries: Mutex::new(LruCache::new(cap)) }
    }

    /// Return the cached block for `block_no`, loading and installing it via
    /// `load` on a miss. If two callers race on the same miss, the cache
    /// keeps whichever decoded block is installed last; both see a
    /// consistent (if momentarily duplicated) result.
    ///
    /// A hit is checked against `schema` before being returned: the cache is
    /// process-wide and keyed only by block number, so a block decoded under
    /// one schema must never be handed back to a caller reading under a
    /// different one (row width drifting out from under a cached block
    /// would silently misread every column after the drift).
    pub fn get_or_load(
        &self,
        block_no: u32,
        schema: &MetaDataSchema,
        load: impl FnOnce() -> Result<Option<MetaDataBlock>>,
    ) -> Result<Option<Arc<MetaDataBlock>>> {
        if let Some(hit) = self.entries.lock().get(&block_no).cloned() {
            assert_schema_compatible(&hit, schema);
            return Ok(Some(hit));
        }
        match load()? {
            Some(block) => {
                let block = Arc::new(block);
                self.entries.lock().put(block_no, block.clone());
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    /// Drop every cached entry for the given block numbers. Called by a
    /// committing transaction for each metadata block it touched.
    pub fn invalidate(&self, block_numbers: impl IntoIterator<Item = u32>) {
        let mut entries = self.entries.lock();
        for b in block_numbers {
            entries.pop(&b);
        }
    }

    pub fn invalidate_docno(&self, docno: u32, block_size: u32) {
        self.invalidate([block_no(docno, block_size)]);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MetaDataCache {
    fn default() -> Self {
        MetaDataCache::new(DEFAULT_MAX_BLOCKS)
    }
}

/// Panics if a cached block's row layout doesn't match `schema`'s. The cache
/// is keyed only by block number, so this is the one place that would catch
/// a block decoded under a stale schema leaking back out of a hit.
fn assert_schema_compatible(block: &MetaDataBlock, schema: &MetaDataSchema) {
    assert_eq!(
        block.row_width,
        schema.row_width(),
        "cached metadata block (row_width={}) does not match the current schema (row_width={})",
        block.row_width,
        schema.row_width(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MetaDataColumn, NumericType, NumericValue};
    use std::cell::Cell;

    fn schema() -> MetaDataSchema {
        MetaDataSchema { columns: vec![MetaDataColumn { name: "doclen".into(), numeric_type: NumericType::U32 }] }
    }

    #[test]
    fn miss_then_hit_loads_once() {
        let cache = MetaDataCache::new(4);
        let schema = schema();
        let loads = Cell::new(0);

        let load = || {
            loads.set(loads.get() + 1);
            let mut block = MetaDataBlock::empty(&schema, 4);
            block.set(&schema, 0, 0, NumericValue::U32(9));
            Ok(Some(block))
        };

        let a = cache.get_or_load(1, &schema, load).unwrap().unwrap();
        assert_eq!(loads.get(), 1);
        let b = cache.get_or_load(1, &schema, || unreachable!("second call must be a cache hit")).unwrap().unwrap();
        assert_eq!(a.get(&schema, 0, 0), b.get(&schema, 0, 0));
    }

    #[test]
    fn invalidate_forces_reload() {
        let cache = MetaDataCache::new(4);
        let schema = schema();
        cache.get_or_load(2, &schema, || Ok(Some(MetaDataBlock::empty(&schema, 4)))).unwrap();
        cache.invalidate([2]);
        assert_eq!(cache.len(), 0);
        let reload_count = Cell::new(0);
        cache
            .get_or_load(2, &schema, || {
                reload_count.set(reload_count.get() + 1);
                Ok(Some(MetaDataBlock::empty(&schema, 4)))
            })
            .unwrap();
        assert_eq!(reload_count.get(), 1);
    }

    #[test]
    #[should_panic(expected = "does not match the current schema")]
    fn hit_with_incompatible_schema_panics() {
        let cache = MetaDataCache::new(4);
        let narrow = schema();
        cache.get_or_load(1, &narrow, || Ok(Some(MetaDataBlock::empty(&narrow, 4)))).unwrap();

        let wide = MetaDataSchema {
            columns: vec![
                MetaDataColumn { name: "doclen".into(), numeric_type: NumericType::U32 },
                MetaDataColumn { name: "score".into(), numeric_type: NumericType::F32 },
            ],
        };
        let _ = cache.get_or_load(1, &wide, || unreachable!("the panic must fire on the cache hit, before any reload"));
    }

    #[test]
    fn evicts_least_recently_used_beyond_capacity() {
        let cache = MetaDataCache::new(2);
        let schema = schema();
        for b in 1..=3u32 {
            cache.get_or_load(b, &schema, || Ok(Some(MetaDataBlock::empty(&schema, 4)))).unwrap();
        }
        assert_eq!(cache.len(), 2);
    }
}
