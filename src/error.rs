use std::fmt;

/// Error classification per the storage core's error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A requested name/id/block does not exist.
    NotFound,
    /// Allocation failure; fatal to the in-flight operation only.
    OutOfMemory,
    /// A block failed structural validation.
    CorruptData,
    /// Attempt to reuse an id or redefine an invariant.
    Conflict,
    /// Caller-contract violation (double commit, teardown iterator use, ...).
    Protocol,
    /// KV driver surfaced an I/O error.
    Io,
    /// Storage version is incompatible with the running software.
    Version,
    /// Storage was created with a different byte order.
    Endianness,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error { kind, context: context.into() }
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, context)
    }

    pub fn corrupt(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::CorruptData, context)
    }

    pub fn conflict(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, context)
    }

    pub fn protocol(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, context)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::Io, err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::new(ErrorKind::CorruptData, format!("bincode: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
