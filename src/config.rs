//! Storage configuration string parsing (spec §6.1).
//!
//! `key=value;key=value` pairs. The core recognizes a handful of keys and
//! passes everything else through untouched for downstream drivers.

use std::collections::BTreeMap;

use crate::error::{Error, ErrorKind, Result};
use crate::model::{MetaDataColumn, MetaDataSchema, NumericType};

#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub path: String,
    pub metadata: MetaDataSchema,
    pub acl: bool,
    pub cache: Option<String>,
    pub statsproc: Option<String>,
    /// Posting/boolean block fill bound (spec §4.7 Merge); `None` keeps the
    /// merge writer's own default.
    pub max_block_size: Option<usize>,
    /// Unrecognized keys, preserved for downstream drivers.
    pub extra: BTreeMap<String, String>,
}

impl StorageConfig {
    pub fn parse(spec: &str) -> Result<Self> {
        let mut cfg = StorageConfig::default();
        for pair in spec.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::new(ErrorKind::Protocol, format!("malformed config entry: {pair}"))
            })?;
            let key = key.trim();
            let value = value.trim();
            match key {
                "path" => cfg.path = value.to_string(),
                "metadata" => cfg.metadata = parse_metadata(value)?,
                "acl" => cfg.acl = parse_bool(value)?,
                "cache" => cfg.cache = Some(value.to_string()),
                "statsproc" => cfg.statsproc = Some(value.to_string()),
                "maxblocksize" => {
                    cfg.max_block_size = Some(value.parse::<usize>().map_err(|_| {
                        Error::new(ErrorKind::Protocol, format!("not a positive integer: {value}"))
                    })?);
                }
                other => {
                    cfg.extra.insert(other.to_string(), value.to_string());
                }
            }
        }
        Ok(cfg)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(Error::new(ErrorKind::Protocol, format!("not a boolean: {other}"))),
    }
}

/// `<name> <type>` pairs separated by commas, e.g. `"doclen u32,rank u8"`.
fn parse_metadata(value: &str) -> Result<MetaDataSchema> {
    let mut columns = Vec::new();
    for col in value.split(',') {
        let col = col.trim();
        if col.is_empty() {
            continue;
        }
        let mut parts = col.split_whitespace();
        let name = parts.next().ok_or_else(|| {
            Error::new(ErrorKind::Protocol, format!("malformed metadata column: {col}"))
        })?;
        let ty = parts.next().ok_or_else(|| {
            Error::new(ErrorKind::Protocol, format!("missing type for metadata column: {col}"))
        })?;
        let numeric_type = match ty {
            "i8" => NumericType::I8,
            "u8" => NumericType::U8,
            "i16" => NumericType::I16,
            "u16" => NumericType::U16,
            "i32" => NumericType::I32,
            "u32" => NumericType::U32,
            "f16" => NumericType::F16,
            "f32" => NumericType::F32,
            other => return Err(Error::new(ErrorKind::Protocol, format!("unknown metadata type: {other}"))),
        };
        columns.push(MetaDataColumn { name: name.to_string(), numeric_type });
    }
    Ok(MetaDataSchema { columns })
}
