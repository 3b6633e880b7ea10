//! Address rewriting over arbitrary text.
//!
//! A [`Scrubber`] extracts dotted-quad tokens, resolves each distinct token
//! once against a [`Database`], and replaces every occurrence of a resolved
//! token with its rendered decoration. Tokens that resolve to the null
//! location are left exactly as they were. All other bytes pass through
//! unchanged, so the input need not be UTF-8.

use std::cmp::Reverse;
use std::ops::Range;

use bstr::{BString, ByteSlice};
use quad_extract::{Extractor, Tag, Tagged};
use rustc_hash::{FxHashMap, FxHashSet};
use termcolor::ColorChoice;

use crate::database::Database;
use crate::error::Result;
use crate::template::Template;

/// Ceiling on the number of tokens a [`DecorationCache`] remembers.
pub const MAX_CACHE_SIZE: usize = 100_000;

/// Scrubbing behaviour, passed explicitly to [`Scrubber::new`].
#[derive(Clone, Debug)]
pub struct ScrubConfig {
    /// When false, text passes through untouched.
    pub enabled: bool,
    /// Decoration template; `None` uses `{country}-{area}`.
    pub template: Option<String>,
    /// `Always` wraps each decoration in ANSI red.
    pub color: ColorChoice,
}

impl Default for ScrubConfig {
    fn default() -> Self {
        ScrubConfig {
            enabled: true,
            template: None,
            color: ColorChoice::Never,
        }
    }
}

/// Token to decoration memo, bounded at [`MAX_CACHE_SIZE`] entries.
///
/// Once full, further tokens are resolved on every use without being stored.
#[derive(Debug, Default)]
pub struct DecorationCache {
    map: FxHashMap<Vec<u8>, Option<BString>>,
}

impl DecorationCache {
    pub fn new() -> DecorationCache {
        DecorationCache {
            map: FxHashMap::with_capacity_and_hasher(4096, Default::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn get_or_resolve(
        &mut self,
        token: &[u8],
        resolve: impl FnOnce(&[u8]) -> Option<BString>,
    ) -> Option<BString> {
        if let Some(cached) = self.map.get(token) {
            return cached.clone();
        }
        let decoration = resolve(token);
        if self.map.len() < MAX_CACHE_SIZE {
            self.map.insert(token.to_vec(), decoration.clone());
        }
        decoration
    }
}

/// Rewrites address tokens in text using a database.
pub struct Scrubber<'db, S: AsRef<[u8]> = Vec<u8>> {
    db: &'db Database<S>,
    extractor: &'static Extractor,
    template: Template,
    enabled: bool,
}

impl<'db, S: AsRef<[u8]>> Scrubber<'db, S> {
    /// Build a scrubber over `db`.
    ///
    /// # Errors
    ///
    /// Fails only when `config.template` does not compile.
    pub fn new(db: &'db Database<S>, config: ScrubConfig) -> Result<Self> {
        let template = match config.template.as_deref() {
            Some(t) => Template::compile(t)?,
            None => Template::default(),
        };
        let template = match config.color {
            ColorChoice::Always | ColorChoice::AlwaysAnsi => template.colored(),
            ColorChoice::Auto | ColorChoice::Never => template,
        };
        Ok(Scrubber {
            db,
            extractor: Extractor::shared(),
            template,
            enabled: config.enabled,
        })
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn template(&self) -> &Template {
        &self.template
    }

    #[inline]
    pub fn extractor(&self) -> &'static Extractor {
        self.extractor
    }

    /// The decoration for `token`, or `None` if it resolves to the null
    /// location or scrubbing is disabled.
    pub fn decoration(&self, token: &[u8]) -> Option<BString> {
        if !self.enabled {
            return None;
        }
        let loc = self.db.lookup_bytes(token);
        if loc.is_null() {
            tracing::trace!(token = %token.as_bstr(), "unresolved");
            return None;
        }
        let decoration = self.template.render(token, &loc);
        tracing::trace!(token = %token.as_bstr(), decoration = %decoration, "resolved");
        Some(decoration)
    }

    /// [`Scrubber::decoration`] memoized in `cache`.
    #[inline]
    pub fn decoration_cached(&self, token: &[u8], cache: &mut DecorationCache) -> Option<BString> {
        if !self.enabled {
            return None;
        }
        cache.get_or_resolve(token, |t| self.decoration(t))
    }

    /// Rewrite every resolvable token in `text`.
    pub fn scrub(&self, text: &[u8]) -> Vec<u8> {
        self.plan(text, |t| self.decoration(t)).to_bytes()
    }

    /// Rewrite every resolvable token in `text`, memoizing lookups in `cache`.
    pub fn scrub_cached(&self, text: &[u8], cache: &mut DecorationCache) -> Vec<u8> {
        self.plan(text, |t| self.decoration_cached(t, cache)).to_bytes()
    }

    /// The replacements [`Scrubber::scrub`] would make, as tags over `text`.
    pub fn tag(&self, text: &[u8]) -> Tagged {
        self.plan(text, |t| self.decoration(t))
    }

    /// Tag [`Scrubber::tag`] memoizing lookups in `cache`.
    pub fn tag_cached(&self, text: &[u8], cache: &mut DecorationCache) -> Tagged {
        self.plan(text, |t| self.decoration_cached(t, cache))
    }

    /// Resolve each distinct token once, then pick the replaced ranges.
    ///
    /// Every occurrence of a resolved token is a candidate, including ones
    /// that sit inside a longer digit run. Candidates are taken left to
    /// right, the longest at any position winning, and never overlap.
    fn plan(&self, text: &[u8], mut resolve: impl FnMut(&[u8]) -> Option<BString>) -> Tagged {
        let mut tagged = Tagged::new(text);
        if !self.enabled {
            return tagged;
        }

        let mut resolved: Vec<(&[u8], BString)> = Vec::new();
        let mut seen: FxHashSet<&[u8]> = FxHashSet::default();
        for token in self.extractor.tokens(text) {
            if !seen.insert(token) {
                continue;
            }
            if let Some(decoration) = resolve(token) {
                resolved.push((token, decoration));
            }
        }
        if resolved.is_empty() {
            return tagged;
        }

        let mut candidates: Vec<(Range<usize>, usize)> = Vec::new();
        for (i, (token, _)) in resolved.iter().enumerate() {
            for start in memchr::memmem::find_iter(text, token) {
                candidates.push((start..start + token.len(), i));
            }
        }
        candidates.sort_unstable_by_key(|(range, _)| (range.start, Reverse(range.end)));

        let mut last_end = 0;
        for (range, i) in candidates {
            if range.start < last_end {
                continue;
            }
            last_end = range.end;
            let (token, decoration) = &resolved[i];
            tagged = tagged.tag(
                Tag::new(token.to_str_lossy().into_owned())
                    .with_range(range)
                    .with_decoration(decoration.clone()),
            );
        }
        tagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata::{SAMPLE, TWO_RANGES};

    fn scrub_with(db: &[u8], config: ScrubConfig, text: &[u8]) -> Vec<u8> {
        let db = Database::from_source(db).unwrap();
        Scrubber::new(&db, config).unwrap().scrub(text)
    }

    fn scrub(db: &[u8], text: &str) -> String {
        String::from_utf8(scrub_with(db, ScrubConfig::default(), text.as_bytes())).unwrap()
    }

    #[test]
    fn rewrites_resolved_tokens() {
        assert_eq!(
            scrub(TWO_RANGES, "ip is 1.0.0.5 and 1.0.1.9"),
            "ip is CN-Beijing and CN-Shanghai"
        );
    }

    #[test]
    fn text_without_tokens_is_unchanged() {
        assert_eq!(scrub(TWO_RANGES, "no ip here"), "no ip here");
        assert_eq!(scrub(TWO_RANGES, ""), "");
    }

    #[test]
    fn null_tokens_are_untouched() {
        assert_eq!(
            scrub(TWO_RANGES, "a 1.0.2.1 b 999.1.1.1 c 1.0.0.5"),
            "a 1.0.2.1 b 999.1.1.1 c CN-Beijing"
        );
    }

    #[test]
    fn repeated_tokens_all_replaced() {
        assert_eq!(
            scrub(TWO_RANGES, "1.0.0.5,1.0.0.5;1.0.0.5"),
            "CN-Beijing,CN-Beijing;CN-Beijing"
        );
    }

    #[test]
    fn each_distinct_token_resolved_once() {
        let db = Database::from_source(TWO_RANGES).unwrap();
        let scrubber = Scrubber::new(&db, ScrubConfig::default()).unwrap();
        let mut calls = Vec::new();
        let tagged = scrubber.plan(b"1.0.0.5 1.0.1.9 1.0.0.5 1.0.1.9", |t| {
            calls.push(t.to_vec());
            scrubber.decoration(t)
        });
        assert_eq!(calls, vec![b"1.0.0.5".to_vec(), b"1.0.1.9".to_vec()]);
        assert_eq!(tagged.tags().len(), 4);
    }

    #[test]
    fn wildcard_tokens() {
        assert_eq!(scrub(SAMPLE, "from 1.0.*.* ok"), "from JP-Tokyo ok");
        assert_eq!(scrub(SAMPLE, "from 1.0.0.* ok"), "from CN-Beijing ok");
    }

    #[test]
    fn redirected_locations() {
        assert_eq!(
            scrub(SAMPLE, "1.0.5.5 | 1.0.9.1 | 2.0.0.1 | 8.8.8.8"),
            "AU-Sydney | JP- | FR- | US-Mountain View"
        );
    }

    #[test]
    fn non_utf8_passes_through() {
        let out = scrub_with(
            SAMPLE,
            ScrubConfig::default(),
            b"\xff\xfe 36.0.0.1 \xc0",
        );
        assert_eq!(out, b"\xff\xfe \xd6\xd0\xb9\xfa-\xb1\xb1\xbe\xa9 \xc0");
    }

    #[test]
    fn idempotent_when_output_has_no_quads() {
        let once = scrub(SAMPLE, "x 1.0.0.1 y 8.8.8.8 z 1.200.0.0");
        let twice = scrub(SAMPLE, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn occurrences_inside_longer_runs_are_replaced() {
        // "11.0.0.55" is its own (unresolved) token, but it contains "1.0.0.5".
        assert_eq!(
            scrub(TWO_RANGES, "1.0.0.5 and 11.0.0.55"),
            "CN-Beijing and 1CN-Beijing5"
        );
    }

    #[test]
    fn longest_token_wins_at_same_start() {
        // Both "1.0.1.1" and "1.0.1.100" resolve; the longer one owns its bytes.
        assert_eq!(
            scrub(TWO_RANGES, "1.0.1.1 1.0.1.100"),
            "CN-Shanghai CN-Shanghai"
        );
    }

    #[test]
    fn disabled_is_passthrough() {
        let config = ScrubConfig {
            enabled: false,
            ..ScrubConfig::default()
        };
        assert_eq!(scrub_with(TWO_RANGES, config, b"1.0.0.5"), b"1.0.0.5");
    }

    #[test]
    fn disabled_has_no_decorations() {
        let db = Database::from_source(TWO_RANGES).unwrap();
        let config = ScrubConfig {
            enabled: false,
            ..ScrubConfig::default()
        };
        let scrubber = Scrubber::new(&db, config).unwrap();
        let mut cache = DecorationCache::new();
        assert!(scrubber.decoration(b"1.0.0.5").is_none());
        assert!(scrubber.decoration_cached(b"1.0.0.5", &mut cache).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn custom_template() {
        let config = ScrubConfig {
            template: Some("<{ip}|{country}|{area}>".to_string()),
            ..ScrubConfig::default()
        };
        assert_eq!(
            scrub_with(TWO_RANGES, config, b"at 1.0.0.5."),
            b"at <1.0.0.5|CN|Beijing>."
        );
    }

    #[test]
    fn invalid_template_is_rejected() {
        let db = Database::from_source(TWO_RANGES).unwrap();
        let config = ScrubConfig {
            template: Some("{nope}".to_string()),
            ..ScrubConfig::default()
        };
        assert!(Scrubber::new(&db, config).is_err());
    }

    #[test]
    fn color_always_wraps_decoration() {
        let config = ScrubConfig {
            color: ColorChoice::Always,
            ..ScrubConfig::default()
        };
        assert_eq!(
            scrub_with(TWO_RANGES, config, b"1.0.0.5"),
            b"\x1b[1;31mCN-Beijing\x1b[0;0m"
        );
    }

    #[test]
    fn tags_carry_ranges_and_decorations() {
        let db = Database::from_source(TWO_RANGES).unwrap();
        let scrubber = Scrubber::new(&db, ScrubConfig::default()).unwrap();
        let tagged = scrubber.tag(b"ip 1.0.0.5 or 1.0.2.1");
        let tags = tagged.tags();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].token(), "1.0.0.5");
        assert_eq!(tags[0].range(), Some(&(3..10)));
        assert_eq!(tags[0].decorated(), Some(&b"CN-Beijing"[..]));
    }

    #[test]
    fn cache_is_reused_and_bounded() {
        let db = Database::from_source(TWO_RANGES).unwrap();
        let scrubber = Scrubber::new(&db, ScrubConfig::default()).unwrap();
        let mut cache = DecorationCache::new();
        assert!(cache.is_empty());
        let out = scrubber.scrub_cached(b"1.0.0.5 1.0.2.1", &mut cache);
        assert_eq!(out, b"CN-Beijing 1.0.2.1");
        assert_eq!(cache.len(), 2);
        scrubber.scrub_cached(b"1.0.0.5", &mut cache);
        assert_eq!(cache.len(), 2);

        for i in 0..MAX_CACHE_SIZE as u32 + 10 {
            scrubber.decoration_cached(i.to_string().as_bytes(), &mut cache);
        }
        assert_eq!(cache.len(), MAX_CACHE_SIZE);
        assert_eq!(
            scrubber.decoration_cached(b"16777221", &mut cache),
            Some(BString::from("CN-Beijing"))
        );
    }
}
