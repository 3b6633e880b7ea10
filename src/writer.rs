use std::borrow::Cow;
use std::io::{self, Write};

use bstr::{BString, ByteSlice};
use quad_extract::Tagged;

use crate::cloak::Cloak;
use crate::scrub::{DecorationCache, Scrubber};

/// Bytes of each chunk shown in debug logs.
const PREVIEW_LEN: usize = 64;

/// An output stage that scrubs, then cloaks, each chunk before passing it on.
///
/// Every `write` call is treated as a complete chunk: a token split across
/// two writes is not reassembled. Feed whole lines to avoid that.
///
/// `write` reports the length of the input chunk, not the number of bytes
/// written downstream, since rewriting changes the length.
pub struct ReplaceWriter<'db, W: Write, S: AsRef<[u8]> = Vec<u8>> {
    inner: W,
    scrubber: Option<Scrubber<'db, S>>,
    cloak: Option<Cloak>,
    cache: DecorationCache,
}

impl<'db, W: Write, S: AsRef<[u8]>> ReplaceWriter<'db, W, S> {
    /// Wrap `inner`. Either stage may be absent, in which case it is skipped.
    pub fn new(inner: W, scrubber: Option<Scrubber<'db, S>>, cloak: Option<Cloak>) -> Self {
        ReplaceWriter {
            inner,
            scrubber,
            cloak,
            cache: DecorationCache::new(),
        }
    }

    pub fn scrubber(&self) -> Option<&Scrubber<'db, S>> {
        self.scrubber.as_ref()
    }

    /// The decorations resolved so far.
    pub fn cache(&self) -> &DecorationCache {
        &self.cache
    }

    /// Resolve `token` through this writer's cache.
    pub fn decoration(&mut self, token: &[u8]) -> Option<BString> {
        let scrubber = self.scrubber.as_ref()?;
        scrubber.decoration_cached(token, &mut self.cache)
    }

    /// The replacements this writer would make in `text`, as tags.
    pub fn tag(&mut self, text: &[u8]) -> Tagged {
        match &self.scrubber {
            Some(scrubber) => scrubber.tag_cached(text, &mut self.cache),
            None => Tagged::new(text),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn transform<'a>(&mut self, buf: &'a [u8]) -> Cow<'a, [u8]> {
        let scrubbed = match &self.scrubber {
            Some(scrubber) if scrubber.enabled() => {
                Cow::Owned(scrubber.scrub_cached(buf, &mut self.cache))
            }
            _ => Cow::Borrowed(buf),
        };
        let Some(cloak) = &self.cloak else {
            return scrubbed;
        };
        let cloaked = match cloak.apply(&scrubbed) {
            Cow::Owned(cloaked) => Some(cloaked),
            Cow::Borrowed(_) => None,
        };
        cloaked.map_or(scrubbed, Cow::Owned)
    }
}

impl<'db, W: Write, S: AsRef<[u8]>> Write for ReplaceWriter<'db, W, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        tracing::debug!(
            len = buf.len(),
            chunk = %buf[..buf.len().min(PREVIEW_LEN)].as_bstr(),
            "write"
        );
        let out = self.transform(buf);
        self.inner.write_all(&out)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
