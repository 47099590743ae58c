//! Identifier types for the data model (spec §3.1).
//!
//! `TermType` and `UserNo`/`AttribNo` are assigned immediately; `TermValue`
//! and `DocNo` are assigned deferred within a transaction and only become
//! final when the committing transaction resolves their names against the
//! store.

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            pub fn value(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self {
                $name(v)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

use std::fmt;

id_type!(TermType);
id_type!(TermValue);
id_type!(DocNo);
id_type!(UserNo);
id_type!(AttribNo);

/// Within-document term position, 1-based per spec §3.1.
pub type Position = u32;
