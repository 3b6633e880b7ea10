use std::fmt;

use bstr::{BStr, BString, ByteSlice};

use crate::bytes::{read_cstr, read_offset24};

/// Mode byte: the record redirects to a secondary record holding both fields.
pub const REDIRECT_FULL: u8 = 0x01;

/// Mode byte: the country is stored elsewhere, the area follows the pointer.
pub const REDIRECT_COUNTRY: u8 = 0x02;

/// The place an address resolves to.
///
/// Fields are raw bytes exactly as stored in the database; no character
/// set conversion is applied. `Null` means the database has no data for the
/// address and is distinct from a found location whose fields are empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Location {
    #[default]
    Null,
    Found { country: BString, area: BString },
}

impl Location {
    /// Create a found location.
    pub fn new(country: impl Into<BString>, area: impl Into<BString>) -> Self {
        Location::Found {
            country: country.into(),
            area: area.into(),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Location::Null)
    }

    /// The country field. Empty for the null location.
    #[inline]
    pub fn country(&self) -> &BStr {
        match self {
            Location::Null => b"".as_bstr(),
            Location::Found { country, .. } => country.as_bstr(),
        }
    }

    /// The area field. Empty for the null location.
    #[inline]
    pub fn area(&self) -> &BStr {
        match self {
            Location::Null => b"".as_bstr(),
            Location::Found { area, .. } => area.as_bstr(),
        }
    }

    /// Render as `{country}-{area}`. The null location renders as `-`.
    pub fn render(&self) -> BString {
        let (country, area) = (self.country(), self.area());
        let mut out = Vec::with_capacity(country.len() + area.len() + 1);
        out.extend_from_slice(country);
        out.push(b'-');
        out.extend_from_slice(area);
        out.into()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.country(), self.area())
    }
}

/// Decode the data record at `offset` into a location.
///
/// The record begins with the 4-byte range end, which is skipped. Any read
/// outside the buffer or any unterminated string yields `None`.
pub(crate) fn decode(buf: &[u8], offset: usize) -> Option<Location> {
    let offset = offset.checked_add(4)?;
    let (country, area_offset) = match *buf.get(offset)? {
        REDIRECT_FULL => {
            let redirect = read_offset24(buf, offset + 1)?;
            if *buf.get(redirect)? == REDIRECT_COUNTRY {
                (pointed_cstr(buf, redirect + 1)?, redirect + 4)
            } else {
                inline_cstr(buf, redirect)?
            }
        }
        REDIRECT_COUNTRY => (pointed_cstr(buf, offset + 1)?, offset + 4),
        _ => inline_cstr(buf, offset)?,
    };
    let area = read_area(buf, area_offset)?;
    Some(Location::new(country, area))
}

/// Read the area field at `offset`, which is either inline or a pointer.
///
/// A pointer of zero is the explicit "no area" marker.
fn read_area(buf: &[u8], offset: usize) -> Option<&[u8]> {
    match *buf.get(offset)? {
        REDIRECT_FULL | REDIRECT_COUNTRY => match read_offset24(buf, offset + 1)? {
            0 => Some(b""),
            target => read_cstr(buf, target),
        },
        _ => read_cstr(buf, offset),
    }
}

/// An inline string and the offset just past its terminator.
#[inline]
fn inline_cstr(buf: &[u8], offset: usize) -> Option<(&[u8], usize)> {
    let s = read_cstr(buf, offset)?;
    Some((s, offset + s.len() + 1))
}

/// The string addressed by the 24-bit pointer at `offset`.
#[inline]
fn pointed_cstr(buf: &[u8], offset: usize) -> Option<&[u8]> {
    read_cstr(buf, read_offset24(buf, offset)?)
}
