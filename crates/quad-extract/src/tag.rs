use bstr::{BString, ByteSlice};
use serde::{Serialize, Serializer};
use std::io::{self, Write};
use std::ops::Range;

/// A tag marking one token found in text.
#[derive(Clone, Debug, Serialize)]
pub struct Tag {
    /// The token text itself.
    #[serde(rename = "value")]
    token: String,
    /// The range in the original text where the token was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<Range<usize>>,
    /// The replacement bytes written in place of the token.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_lossy"
    )]
    decorated: Option<BString>,
}

fn serialize_lossy<S: Serializer>(value: &Option<BString>, ser: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(bytes) => ser.serialize_str(&bytes.to_str_lossy()),
        None => ser.serialize_none(),
    }
}

impl Tag {
    /// Create a new tag for a token.
    #[inline]
    pub fn new<S: Into<String>>(token: S) -> Tag {
        Tag {
            token: token.into(),
            range: None,
            decorated: None,
        }
    }

    /// Set the byte range [start, end) where this tag was found in the original text.
    #[inline]
    #[must_use]
    pub fn with_range(mut self, range: Range<usize>) -> Self {
        self.range = Some(range);
        self
    }

    /// Set the decoration written instead of the token by [`Tagged::write`].
    ///
    /// Decorations are raw bytes; they are not required to be UTF-8.
    #[inline]
    #[must_use]
    pub fn with_decoration<B: Into<BString>>(mut self, decorated: B) -> Self {
        self.decorated = Some(decorated.into());
        self
    }

    /// Get the token text.
    #[inline]
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Get the range of this tag in the original text, if available.
    #[inline]
    #[must_use]
    pub fn range(&self) -> Option<&Range<usize>> {
        self.range.as_ref()
    }

    /// Get the decoration of this tag, if available.
    #[inline]
    #[must_use]
    pub fn decorated(&self) -> Option<&[u8]> {
        self.decorated.as_deref().map(Vec::as_slice)
    }
}

/// A piece of text with tags.
#[derive(Clone, Debug, Serialize)]
pub struct Tagged {
    #[serde(skip_serializing)]
    text: Vec<u8>,
    tags: Vec<Tag>,
    #[serde(rename = "data")]
    text_data: Option<TextData>,
}

/// Represents the text data for JSON serialization.
#[derive(Clone, Debug, Serialize)]
pub struct TextData {
    /// The original text as a string.
    pub text: String,
}

impl Tagged {
    /// Create a new `Tagged` container for a slice of text.
    #[inline]
    #[must_use]
    pub fn new(text: &[u8]) -> Tagged {
        Tagged {
            text: text.to_vec(),
            tags: Vec::with_capacity(4),
            text_data: None,
        }
    }

    /// Adds a tag to this text.
    ///
    /// Tags must be added in ascending, non-overlapping range order.
    #[inline]
    #[must_use]
    pub fn tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// Get the tags in this text.
    #[inline]
    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Get the original text.
    #[inline]
    #[must_use]
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// Explicitly sets the text data used for JSON serialization.
    #[inline]
    pub fn set_text_data(&mut self, data: TextData) {
        self.text_data = Some(data);
    }

    /// Writes the text to the given writer, replacing tagged ranges with their decorations.
    ///
    /// Tags without a range are skipped. Tags without a decoration write the
    /// original bytes of their range.
    pub fn write<W: Write + ?Sized>(&self, wtr: &mut W) -> io::Result<()> {
        if self.tags.is_empty() {
            return wtr.write_all(&self.text);
        }

        debug_assert!(
            self.tags
                .windows(2)
                .all(|w| match (w[0].range(), w[1].range()) {
                    (Some(a), Some(b)) => a.end <= b.start,
                    _ => true,
                }),
            "tags must be sorted and non-overlapping"
        );

        let mut last_end = 0;
        for tag in &self.tags {
            let Some(range) = tag.range() else {
                continue;
            };
            wtr.write_all(&self.text[last_end..range.start])?;
            match tag.decorated() {
                Some(decorated) => wtr.write_all(decorated)?,
                None => wtr.write_all(&self.text[range.clone()])?,
            }
            last_end = range.end;
        }
        wtr.write_all(&self.text[last_end..])
    }

    /// Renders the decorated text into a new buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.text.len());
        // Writing into a Vec cannot fail.
        let _ = self.write(&mut out);
        out
    }

    /// Writes the `Tagged` object as a JSON object to the given writer.
    pub fn write_json<W: Write + ?Sized>(&mut self, wtr: &mut W) -> io::Result<()> {
        if self.text_data.is_none() {
            self.text_data = Some(TextData {
                text: self.text.to_str_lossy().into_owned(),
            });
        }
        serde_json::to_writer(wtr, self)?;
        Ok(())
    }
}
