//! Document consistency checker (spec §4.11.5, supplemented from the
//! original statistics/storage consistency checks — see `original_source`'s
//! storage integrity walk).
//!
//! Compares a `DocumentEdit` against what is actually stored for that
//! docno, returning every field-level mismatch rather than a single
//! pass/fail bit.

use std::collections::HashMap;

use crate::codec::inverse_block::InverseTermBlock;
use crate::ids::DocNo;
use crate::model::DocumentEdit;

use super::Storage;

#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    MissingTerm { term_type: String, term_value: String },
    UnexpectedTerm { type_no: u32, term_no: u32 },
    AttributeMismatch { name: String, expected: String, actual: Option<String> },
    MetadataMismatch { name: String, expected: String, actual: String },
}

pub struct DocumentChecker<'s> {
    storage: &'s Storage,
}

impl<'s> DocumentChecker<'s> {
    pub fn new(storage: &'s Storage) -> Self {
        DocumentChecker { storage }
    }

    pub fn check(&self, docno: DocNo, edit: &DocumentEdit) -> Vec<Mismatch> {
        let mut mismatches = Vec::new();
        let store = self.storage.kv();

        let expected_terms: HashMap<(u32, u32), ()> = edit
            .terms
            .iter()
            .filter_map(|t| {
                let type_no = self.storage.lookup_term_type(&t.term_type)?.value();
                let term_no = self.storage.lookup_term_value(&t.term_value)?.value();
                Some(((type_no, term_no), ()))
            })
            .collect();

        let adapter = crate::adapters::SimpleAdapter::new(crate::adapters::families::INVERSE_TERM);
        let actual_entries = adapter
            .load(store, &[docno.value()])
            .and_then(|b| InverseTermBlock::decode(&b).ok())
            .map(|b| b.entries)
            .unwrap_or_default();

        for t in &edit.terms {
            let known = self.storage.lookup_term_type(&t.term_type).zip(self.storage.lookup_term_value(&t.term_value));
            let present = known
                .map(|(ty, tv)| actual_entries.iter().any(|e| e.type_no == ty.value() && e.term_no == tv.value()))
                .unwrap_or(false);
            if !present {
                mismatches.push(Mismatch::MissingTerm { term_type: t.term_type.clone(), term_value: t.term_value.clone() });
            }
        }
        for e in &actual_entries {
            if !expected_terms.contains_key(&(e.type_no, e.term_no)) {
                mismatches.push(Mismatch::UnexpectedTerm { type_no: e.type_no, term_no: e.term_no });
            }
        }

        for (name, expected_value) in &edit.attributes {
            let actual = self.storage.lookup_attribute(docno, name);
            if actual.as_ref() != Some(expected_value) {
                mismatches.push(Mismatch::AttributeMismatch { name: name.clone(), expected: expected_value.clone(), actual });
            }
        }

        for (name, expected_value) in &edit.metadata {
            if let Ok(Some(actual)) = self.storage.metadata(docno, name)
                && (actual.as_f64() - expected_value.as_f64()).abs() > 1e-6 {
                    mismatches.push(Mismatch::MetadataMismatch {
                        name: name.clone(),
                        expected: format!("{:?}", expected_value),
                        actual: format!("{:?}", actual),
                    });
                }
        }

        mismatches
    }
}
