use std::path::PathBuf;

/// Error types for the qqwrysed library.
///
/// Only loading and configuration can fail. Lookups and scrubbing never
/// return errors; a damaged or missing record reads as the null location.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The database file could not be read.
    #[error("failed to read database {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The database header or index bounds are malformed.
    #[error("invalid database: {0}")]
    Format(#[from] FormatError),

    /// Template string is malformed.
    #[error("invalid template: {reason}")]
    InvalidTemplate { reason: String },

    /// The cloak pattern could not be compiled.
    #[error("invalid cloak id")]
    InvalidCloak(#[source] regex::Error),
}

/// Header validation failures detected when a database is loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// The buffer cannot hold the 8-byte header.
    #[error("header needs 8 bytes, buffer has {len}")]
    TooShort { len: usize },

    /// The index end offset precedes the index start offset.
    #[error("index end {end} precedes index start {start}")]
    IndexInverted { start: u32, end: u32 },

    /// An index offset points past the end of the buffer.
    #[error("index offset {offset} exceeds buffer length {len}")]
    IndexOutOfBounds { offset: u32, len: usize },
}

/// Convenience type alias for Results using the library error.
pub type Result<T> = std::result::Result<T, Error>;
