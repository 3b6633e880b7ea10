//! The qqwrysed library: QQWry-style IPv4 range database lookups and
//! in-place address rewriting.
//!
//! A database is a single little-endian file: an 8-byte header holding the
//! start and end offsets of an index table, the index itself (7-byte records
//! sorted by range start), and variable-length data records naming the place
//! each range belongs to.
//!
//! # Examples
//!
//! Looking up addresses and scrubbing text:
//!
//! ```rust,no_run
//! use qqwrysed::{Database, ScrubConfig, Scrubber};
//!
//! # fn main() -> qqwrysed::Result<()> {
//! let db = Database::open_readfile("qqwry.dat")?;
//! println!("{}", db.lookup("61.135.*.*"));
//!
//! let scrubber = Scrubber::new(&db, ScrubConfig::default())?;
//! let out = scrubber.scrub(b"connection from 1.0.0.5 refused");
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod bytes;
pub mod cloak;
pub mod database;
pub mod error;
pub mod input;
pub mod location;
pub mod scrub;
mod search;
pub mod template;
pub mod writer;

pub use crate::cloak::{Cloak, CloakConfig};
pub use crate::database::Database;
pub use crate::error::{Error, FormatError, Result};
pub use crate::location::Location;
pub use crate::scrub::{DecorationCache, ScrubConfig, Scrubber};
pub use crate::template::Template;
pub use crate::writer::ReplaceWriter;
pub use quad_extract::{Extractor, ExtractorBuilder, Tag, Tagged};
