//! C2.4.5 — metadata block (spec §4.2.5, §3.5).
//!
//! Row-major, fixed-width rows; `BlockSize` rows per block. Row index within
//! a block is `(docno - 1) mod BlockSize`; block number is `ceil(docno / BlockSize)`.

use crate::error::{Error, Result};
use crate::model::{MetaDataSchema, NumericType, NumericValue, f16_bits_to_f32, f32_to_f16_bits};

pub const DEFAULT_BLOCK_SIZE: u32 = 1024;

pub fn block_no(docno: u32, block_size: u32) -> u32 {
    debug_assert!(docno >= 1);
    (docno - 1) / block_size + 1
}

pub fn row_index(docno: u32, block_size: u32) -> usize {
    ((docno - 1) % block_size) as usize
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaDataBlock {
    pub block_size: u32,
    pub row_width: usize,
    pub rows: Vec<u8>,
}

impl MetaDataBlock {
    pub fn empty(schema: &MetaDataSchema, block_size: u32) -> Self {
        let row_width = schema.row_width();
        MetaDataBlock { block_size, row_width, rows: vec![0u8; row_width * block_size as usize] }
    }

    pub fn encode(&self) -> Vec<u8> {
        self.rows.clone()
    }

    pub fn decode(data: &[u8], schema: &MetaDataSchema, block_size: u32) -> Result<Self> {
        let row_width = schema.row_width();
        let expected = row_width * block_size as usize;
        if data.len() != expected {
            return Err(Error::corrupt(format!(
                "metadata block has {} bytes, expected {expected}",
                data.len()
            )));
        }
        Ok(MetaDataBlock { block_size, row_width, rows: data.to_vec() })
    }

    fn cell_offset(&self, schema: &MetaDataSchema, row: usize, column: usize) -> usize {
        row * self.row_width + schema.offset_of(column)
    }

    pub fn get(&self, schema: &MetaDataSchema, row: usize, column: usize) -> NumericValue {
        let ty = schema.columns[column].numeric_type;
        let off = self.cell_offset(schema, row, column);
        let bytes = &self.rows[off..off + ty.width()];
        match ty {
            NumericType::I8 => NumericValue::I8(bytes[0] as i8),
            NumericType::U8 => NumericValue::U8(bytes[0]),
            NumericType::I16 => NumericValue::I16(i16::from_be_bytes([bytes[0], bytes[1]])),
            NumericType::U16 => NumericValue::U16(u16::from_be_bytes([bytes[0], bytes[1]])),
            NumericType::I32 => NumericValue::I32(i32::from_be_bytes(bytes.try_into().unwrap())),
            NumericType::U32 => NumericValue::U32(u32::from_be_bytes(bytes.try_into().unwrap())),
            NumericType::F16 => NumericValue::F16(f16_bits_to_f32(u16::from_be_bytes([bytes[0], bytes[1]]))),
            NumericType::F32 => NumericValue::F32(f32::from_be_bytes(bytes.try_into().unwrap())),
        }
    }

    pub fn set(&mut self, schema: &MetaDataSchema, row: usize, column: usize, value: NumericValue) {
        let ty = schema.columns[column].numeric_type;
        let off = self.cell_offset(schema, row, column);
        let width = ty.width();
        let encoded: Vec<u8> = match (ty, value) {
            (NumericType::I8, NumericValue::I8(v)) => vec![v as u8],
            (NumericType::U8, NumericValue::U8(v)) => vec![v],
            (NumericType::I16, NumericValue::I16(v)) => v.to_be_bytes().to_vec(),
            (NumericType::U16, NumericValue::U16(v)) => v.to_be_bytes().to_vec(),
            (NumericType::I32, NumericValue::I32(v)) => v.to_be_bytes().to_vec(),
            (NumericType::U32, NumericValue::U32(v)) => v.to_be_bytes().to_vec(),
            (NumericType::F16, NumericValue::F16(v)) => f32_to_f16_bits(v).to_be_bytes().to_vec(),
            (NumericType::F32, NumericValue::F32(v)) => v.to_be_bytes().to_vec(),
            _ => panic!("metadata value type does not match column type"),
        };
        self.rows[off..off + width].copy_from_slice(&encoded);
    }
}
