//! Dotted-quad token extraction and tagging engine.
//!
//! `quad-extract` finds IPv4-shaped tokens in unstructured bytes: four
//! period-separated groups of one to three characters. A group may contain the
//! wildcard `*` in addition to digits, so masked addresses such as `10.2.*.*`
//! are extracted as tokens too.
//!
//! Tokens are candidates, not addresses. `999.1.2.3` is a token; deciding what
//! it means is left to the caller.
//!
//! ## Quick Start
//!
//! ```no_run
//! use quad_extract::ExtractorBuilder;
//!
//! # fn main() -> Result<(), quad_extract::BuildError> {
//! let extractor = ExtractorBuilder::new().build()?;
//!
//! let input = b"login from 61.135.*.* at 10:42";
//! for range in extractor.find_iter(input) {
//!     println!("Found: {}", String::from_utf8_lossy(&input[range]));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Tagging and Output
//!
//! [`Tagged`] collects [`Tag`]s for a piece of text and can write the text back
//! out with each tagged range replaced by its decoration:
//!
//! ```no_run
//! use quad_extract::{Extractor, Tag, Tagged};
//!
//! let data = b"Server at 8.8.8.8";
//! let mut tagged = Tagged::new(data);
//!
//! for range in Extractor::shared().find_iter(data) {
//!     let token = String::from_utf8_lossy(&data[range.clone()]).into_owned();
//!     tagged = tagged.tag(Tag::new(token).with_range(range).with_decoration("US-"));
//! }
//! ```

use std::ops::Range;
use std::sync::OnceLock;

use regex_automata::meta::Regex;
use regex_automata::MatchKind;

mod tag;
pub use tag::{Tag, Tagged, TextData};

/// Four groups of digits or `*`.
static QUAD_PATTERN: &str = r"[0-9*]{1,3}\.[0-9*]{1,3}\.[0-9*]{1,3}\.[0-9*]{1,3}";

/// Four groups of digits only.
static DIGITS_PATTERN: &str = r"[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}";

static SHARED: OnceLock<Extractor> = OnceLock::new();

/// Error returned when an [`Extractor`] cannot be built.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The token regex failed to compile.
    #[error("failed to compile token pattern")]
    Regex(#[from] regex_automata::meta::BuildError),
}

/// A searcher for dotted-quad tokens in text.
///
/// Matching is leftmost-first and non-overlapping, scanning left to right.
/// Extractors are cheap to clone and safe to share across threads.
#[derive(Clone, Debug)]
pub struct Extractor {
    regex: Regex,
    wildcards: bool,
}

impl Extractor {
    /// The process-wide extractor with wildcard groups enabled.
    ///
    /// Built on first use and shared afterwards.
    pub fn shared() -> &'static Extractor {
        SHARED.get_or_init(|| {
            ExtractorBuilder::new()
                .build()
                .expect("constant token pattern compiles")
        })
    }

    /// Find all tokens in a byte slice.
    ///
    /// Returns an iterator of byte ranges `[start, end)` into `haystack`, in
    /// ascending order and never overlapping.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use quad_extract::Extractor;
    ///
    /// let data = b"from 1.2.3.4 via 5.6.*.8";
    /// let found: Vec<_> = Extractor::shared().find_iter(data).collect();
    /// assert_eq!(found, vec![5..12, 17..24]);
    /// ```
    #[inline]
    pub fn find_iter<'a>(&'a self, haystack: &'a [u8]) -> impl Iterator<Item = Range<usize>> + 'a {
        self.regex.find_iter(haystack).map(|m| m.range())
    }

    /// Find all tokens in a byte slice, yielding the token bytes themselves.
    #[inline]
    pub fn tokens<'a>(&'a self, haystack: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.find_iter(haystack).map(move |range| &haystack[range])
    }

    /// Whether `*` is accepted inside a group.
    #[inline]
    #[must_use]
    pub fn wildcards(&self) -> bool {
        self.wildcards
    }
}

/// A builder for configuring token extraction.
///
/// # Example
///
/// ```no_run
/// use quad_extract::ExtractorBuilder;
///
/// # fn main() -> Result<(), quad_extract::BuildError> {
/// let strict = ExtractorBuilder::new().wildcards(false).build()?;
/// assert_eq!(strict.find_iter(b"1.2.3.*").count(), 0);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ExtractorBuilder {
    wildcards: bool,
}

impl Default for ExtractorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorBuilder {
    /// Create a new builder. Wildcard groups are enabled by default.
    pub fn new() -> Self {
        Self { wildcards: true }
    }

    /// Accept `*` as a group character.
    ///
    /// Default: `true`
    pub fn wildcards(&mut self, include: bool) -> &mut Self {
        self.wildcards = include;
        self
    }

    /// Build and return an `Extractor` with the configured settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the token regex fails to compile.
    pub fn build(&self) -> Result<Extractor, BuildError> {
        let pattern = if self.wildcards {
            QUAD_PATTERN
        } else {
            DIGITS_PATTERN
        };
        let regex = Regex::builder()
            .configure(Regex::config().match_kind(MatchKind::LeftmostFirst))
            .build(pattern)?;
        Ok(Extractor {
            regex,
            wildcards: self.wildcards,
        })
    }
}
