use std::fmt;
use std::fs::File;
use std::net::Ipv4Addr;
use std::path::Path;

use memmap2::Mmap;

use crate::address;
use crate::bytes::{read_u32_le, INDEX_RECORD_LEN};
use crate::error::{Error, FormatError, Result};
use crate::location::{self, Location};
use crate::scrub::{ScrubConfig, Scrubber};
use crate::search;

/// An immutable, indexed range database.
///
/// The buffer is validated once on construction and never modified. Every
/// lookup is a pure function of the buffer, so a `Database` can be shared
/// freely between threads without locking.
///
/// The source can be anything that derefs to bytes: an owned `Vec<u8>`, a
/// memory map, or a borrowed slice.
pub struct Database<S: AsRef<[u8]> = Vec<u8>> {
    source: S,
    index_start: u32,
    index_end: u32,
}

impl<S: AsRef<[u8]>> fmt::Debug for Database<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("len", &self.source.as_ref().len())
            .field("index_start", &self.index_start)
            .field("index_end", &self.index_end)
            .finish()
    }
}

impl Database<Vec<u8>> {
    /// Read the whole file at `path` into memory and load it.
    pub fn open_readfile<P: AsRef<Path>>(path: P) -> Result<Database<Vec<u8>>> {
        let path = path.as_ref();
        let buf = std::fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Database::from_source(buf)?;
        tracing::info!(path = %path.display(), records = db.record_count(), "database loaded");
        Ok(db)
    }
}

impl Database<Mmap> {
    /// Memory-map the file at `path` and load it.
    ///
    /// The file must not be truncated or rewritten while the database is alive.
    pub fn open_mmap<P: AsRef<Path>>(path: P) -> Result<Database<Mmap>> {
        let path = path.as_ref();
        let io_err = |source| Error::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(io_err)?;
        let db = Database::from_source(mmap)?;
        tracing::info!(path = %path.display(), records = db.record_count(), "database mapped");
        Ok(db)
    }
}

impl<S: AsRef<[u8]>> Database<S> {
    /// Validate the header of `source` and wrap it.
    ///
    /// Bytes 0..4 and 4..8 hold the little-endian start and end offsets of
    /// the index table. Both must lie within the buffer and the end must not
    /// precede the start.
    pub fn from_source(source: S) -> Result<Database<S>> {
        let buf = source.as_ref();
        let len = buf.len();
        let (Some(index_start), Some(index_end)) = (read_u32_le(buf, 0), read_u32_le(buf, 4))
        else {
            return Err(FormatError::TooShort { len }.into());
        };
        if index_end < index_start {
            return Err(FormatError::IndexInverted {
                start: index_start,
                end: index_end,
            }
            .into());
        }
        for offset in [index_start, index_end] {
            if offset as usize > len {
                return Err(FormatError::IndexOutOfBounds { offset, len }.into());
            }
        }
        Ok(Database {
            source,
            index_start,
            index_end,
        })
    }

    /// The raw database bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.source.as_ref()
    }

    /// The `(start, end)` byte offsets of the index table.
    #[inline]
    pub fn index_range(&self) -> (u32, u32) {
        (self.index_start, self.index_end)
    }

    /// Number of whole index records between the header offsets.
    #[inline]
    pub fn record_count(&self) -> u32 {
        (self.index_end - self.index_start) / INDEX_RECORD_LEN as u32
    }

    /// Look up an address literal such as `1.2.3.4`, `1.2.*.*` or `16909060`.
    ///
    /// Never fails: a literal that does not parse, or an address outside
    /// every range, resolves to [`Location::Null`].
    ///
    /// ```
    /// # fn main() -> qqwrysed::Result<()> {
    /// let db = qqwrysed::Database::from_source(std::fs::read("tests/data/two-ranges.dat").unwrap())?;
    /// assert_eq!(db.lookup("1.0.0.5").render(), "CN-Beijing");
    /// assert!(db.lookup("1.0.2.1").is_null());
    /// # Ok(())
    /// # }
    /// ```
    #[inline]
    pub fn lookup(&self, literal: &str) -> Location {
        self.lookup_bytes(literal.as_bytes())
    }

    /// Look up an address literal given as raw bytes.
    pub fn lookup_bytes(&self, literal: &[u8]) -> Location {
        match address::parse_literal(literal) {
            Some(addr) => self.lookup_addr(addr),
            None => Location::Null,
        }
    }

    /// Look up an address in its big-endian integer form.
    pub fn lookup_addr(&self, addr: u32) -> Location {
        let buf = self.as_bytes();
        let found = search::search(
            buf,
            self.index_start as usize,
            self.index_end as usize,
            addr,
        )
        .and_then(|offset| location::decode(buf, offset));
        match found {
            Some(loc) => loc,
            None => {
                tracing::trace!(addr = %Ipv4Addr::from(addr), "no location");
                Location::Null
            }
        }
    }

    /// Look up an [`Ipv4Addr`].
    #[inline]
    pub fn lookup_ip(&self, ip: Ipv4Addr) -> Location {
        self.lookup_addr(address::from_octets(ip.octets()))
    }

    /// Rewrite every resolvable address token in `text` as `{country}-{area}`.
    ///
    /// Shorthand for a [`Scrubber`] with the default configuration.
    pub fn scrub(&self, text: &[u8]) -> Vec<u8> {
        match Scrubber::new(self, ScrubConfig::default()) {
            Ok(scrubber) => scrubber.scrub(text),
            Err(err) => {
                tracing::warn!(error = %err, "default scrubber unavailable");
                text.to_vec()
            }
        }
    }
}
