//! The data model ingested by the core (spec §3).
//!
//! Text analysis happens upstream; documents arrive here already decomposed
//! into typed term occurrences, attributes and metadata values.

use serde::{Deserialize, Serialize};

use crate::ids::Position;

/// One term occurrence inside a document, as handed to the core by the
/// (external) analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermOccurrence {
    pub term_type: String,
    pub term_value: String,
    pub position: Position,
}

impl TermOccurrence {
    pub fn new(term_type: impl Into<String>, term_value: impl Into<String>, position: Position) -> Self {
        TermOccurrence { term_type: term_type.into(), term_value: term_value.into(), position }
    }
}

/// Numeric column types available for a `DocMetaData` schema (spec §3.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F16,
    F32,
}

impl NumericType {
    pub fn width(self) -> usize {
        match self {
            NumericType::I8 | NumericType::U8 => 1,
            NumericType::I16 | NumericType::U16 | NumericType::F16 => 2,
            NumericType::I32 | NumericType::U32 | NumericType::F32 => 4,
        }
    }
}

/// A single column definition in the pinned metadata schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaDataColumn {
    pub name: String,
    pub numeric_type: NumericType,
}

/// The metadata schema, pinned for the lifetime of the storage (spec §3.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaDataSchema {
    pub columns: Vec<MetaDataColumn>,
}

impl MetaDataSchema {
    pub fn row_width(&self) -> usize {
        self.columns.iter().map(|c| c.numeric_type.width()).sum()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn offset_of(&self, index: usize) -> usize {
        self.columns[..index].iter().map(|c| c.numeric_type.width()).sum()
    }
}

/// A numeric metadata value, tagged by the column's declared type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericValue {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    F16(f32),
    F32(f32),
}

impl NumericValue {
    pub fn as_f64(self) -> f64 {
        match self {
            NumericValue::I8(v) => v as f64,
            NumericValue::U8(v) => v as f64,
            NumericValue::I16(v) => v as f64,
            NumericValue::U16(v) => v as f64,
            NumericValue::I32(v) => v as f64,
            NumericValue::U32(v) => v as f64,
            NumericValue::F16(v) => v as f64,
            NumericValue::F32(v) => v as f64,
        }
    }

    pub fn numeric_type(self) -> NumericType {
        match self {
            NumericValue::I8(_) => NumericType::I8,
            NumericValue::U8(_) => NumericType::U8,
            NumericValue::I16(_) => NumericType::I16,
            NumericValue::U16(_) => NumericType::U16,
            NumericValue::I32(_) => NumericType::I32,
            NumericValue::U32(_) => NumericType::U32,
            NumericValue::F16(_) => NumericType::F16,
            NumericValue::F32(_) => NumericType::F32,
        }
    }

    pub fn zero(t: NumericType) -> Self {
        match t {
            NumericType::I8 => NumericValue::I8(0),
            NumericType::U8 => NumericValue::U8(0),
            NumericType::I16 => NumericValue::I16(0),
            NumericType::U16 => NumericValue::U16(0),
            NumericType::I32 => NumericValue::I32(0),
            NumericType::U32 => NumericValue::U32(0),
            NumericType::F16 => NumericValue::F16(0.0),
            NumericType::F32 => NumericValue::F32(0.0),
        }
    }
}

/// A staged, not-yet-committed document edit: the unit the external indexer
/// hands to a transaction (spec §4.6).
#[derive(Debug, Clone, Default)]
pub struct DocumentEdit {
    pub docid: String,
    pub terms: Vec<TermOccurrence>,
    pub attributes: Vec<(String, String)>,
    pub metadata: Vec<(String, NumericValue)>,
    pub acl_users: Vec<String>,
    /// Sorted `(source,sink)` structure intervals (spec §4.8, "Structure-bounded
    /// variants"), supplied by an external structure extractor and simply
    /// stored and later consumed by [`crate::iter::StructureBounded`].
    pub struct_intervals: Vec<(u32, u32)>,
}

impl DocumentEdit {
    pub fn new(docid: impl Into<String>) -> Self {
        DocumentEdit { docid: docid.into(), ..Default::default() }
    }

    pub fn add_term(&mut self, term_type: impl Into<String>, term_value: impl Into<String>, position: Position) -> &mut Self {
        self.terms.push(TermOccurrence::new(term_type, term_value, position));
        self
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn set_metadata(&mut self, name: impl Into<String>, value: NumericValue) -> &mut Self {
        self.metadata.push((name.into(), value));
        self
    }

    pub fn grant_user(&mut self, user: impl Into<String>) -> &mut Self {
        self.acl_users.push(user.into());
        self
    }

    pub fn add_struct_interval(&mut self, source: Position, sink: Position) -> &mut Self {
        self.struct_intervals.push((source, sink));
        self
    }
}

/// Half-precision float encode/decode, round-to-nearest. Used only for the
/// `f16` metadata column type; the crate never computes in `f16`, only
/// stores it, so a simple non-subnormal-aware conversion is sufficient.
pub fn f32_to_f16_bits(v: f32) -> u16 {
    let bits = v.to_bits();
    let sign = (bits >> 16) & 0x8000;
    let exp = ((bits >> 23) & 0xff) as i32 - 127 + 15;
    let mantissa = bits & 0x7f_ffff;
    if exp <= 0 {
        return sign as u16;
    }
    if exp >= 0x1f {
        return (sign | 0x7c00) as u16;
    }
    (sign | ((exp as u32) << 10) | (mantissa >> 13)) as u16
}

pub fn f16_bits_to_f32(bits: u16) -> f32 {
    let sign = (bits & 0x8000) as u32;
    let exp = (bits >> 10) & 0x1f;
    let mantissa = (bits & 0x3ff) as u32;
    let out_bits = if exp == 0 {
        sign << 16
    } else if exp == 0x1f {
        (sign << 16) | 0x7f80_0000 | (mantissa << 13)
    } else {
        let new_exp = (exp as u32) - 15 + 127;
        (sign << 16) | (new_exp << 23) | (mantissa << 13)
    };
    f32::from_bits(out_bits)
}
