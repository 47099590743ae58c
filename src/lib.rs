pub mod error;
pub mod ids;
pub mod model;
pub mod config;
pub mod kv;
pub mod codec;
pub mod adapters;
pub mod alloc;
pub mod cache;
pub mod txmap;
pub mod merge;
pub mod iter;
pub mod rank;
pub mod stats;
pub mod client;

pub use client::{Storage, Transaction};
pub use error::{Error, Result};
