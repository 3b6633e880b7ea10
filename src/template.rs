use std::fmt;
use std::io;

use bstr::{BString, ByteSlice};

use crate::error::{Error, Result};
use crate::location::Location;

/// The decoration written in place of an address when no template is given.
pub const DEFAULT_TEMPLATE: &str = "{country}-{area}";

/// Every field a template may reference, with a description and an example.
pub const FIELDS: [(&str, &str, &str); 3] = [
    ("ip", "The matched address token", "61.135.*.*"),
    ("country", "Country field of the location", "CN"),
    ("area", "Area field of the location", "Beijing"),
];

const COLOR_START: &str = "\x1b[1;31m";
const COLOR_END: &str = "\x1b[0;0m";

/// A pre-compiled template for fast rendering.
///
/// Templates use `{field_name}` syntax for field references.
/// Use `{{` to produce a literal `{` in output.
///
/// The template is parsed once into a sequence of literal and field
/// segments. Rendering is a single left-to-right pass that concatenates
/// segments, so a field value is never expanded again.
#[derive(Clone, Debug)]
pub struct Template {
    parts: Vec<TemplatePart>,
    /// Pre-computed estimate of output size for allocation.
    estimated_size: usize,
}

#[derive(Clone, Debug)]
enum TemplatePart {
    Literal(String),
    Field(Field),
}

/// A field a template can substitute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Ip,
    Country,
    Area,
}

impl Field {
    fn from_name(name: &str) -> Option<Field> {
        match name {
            "ip" => Some(Field::Ip),
            "country" => Some(Field::Country),
            "area" => Some(Field::Area),
            _ => None,
        }
    }

    /// The name used to reference this field in a template.
    pub fn name(self) -> &'static str {
        match self {
            Field::Ip => "ip",
            Field::Country => "country",
            Field::Area => "area",
        }
    }

    #[inline]
    fn value<'a>(self, ip: &'a [u8], loc: &'a Location) -> &'a [u8] {
        match self {
            Field::Ip => ip,
            Field::Country => loc.country().as_bytes(),
            Field::Area => loc.area().as_bytes(),
        }
    }
}

impl Default for Template {
    fn default() -> Self {
        Template {
            parts: vec![
                TemplatePart::Field(Field::Country),
                TemplatePart::Literal("-".to_string()),
                TemplatePart::Field(Field::Area),
            ],
            estimated_size: 33,
        }
    }
}

impl Template {
    /// Compile a template string into a pre-parsed representation.
    ///
    /// Field references are `{field_name}`. Use `{{` for a literal `{`.
    /// An unclosed `{` (no matching `}`) is treated as a literal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTemplate`] for an empty field name (`{}`) or
    /// a field that is not one of [`FIELDS`].
    pub fn compile(template: &str) -> Result<Template> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut estimated_size = 0;
        let mut rest = template;

        while let Some(c) = rest.chars().next() {
            if let Some(after) = rest.strip_prefix("{{") {
                literal.push('{');
                rest = after;
            } else if let Some(after) = rest.strip_prefix("}}") {
                literal.push('}');
                rest = after;
            } else if c == '{' {
                let Some(close) = rest.find('}') else {
                    // No closing brace, the remainder is literal.
                    literal.push_str(rest);
                    break;
                };
                let name = &rest[1..close];
                if name.is_empty() {
                    return Err(Error::InvalidTemplate {
                        reason: "empty field name".to_string(),
                    });
                }
                let Some(field) = Field::from_name(name) else {
                    return Err(Error::InvalidTemplate {
                        reason: format!("unknown field {{{name}}}"),
                    });
                };
                if !literal.is_empty() {
                    estimated_size += literal.len();
                    parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                }
                // ~16 bytes per field value
                estimated_size += 16;
                parts.push(TemplatePart::Field(field));
                rest = &rest[close + 1..];
            } else {
                literal.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }

        if !literal.is_empty() {
            estimated_size += literal.len();
            parts.push(TemplatePart::Literal(literal));
        }

        Ok(Template {
            parts,
            estimated_size,
        })
    }

    /// Bookend the template with ANSI red escapes.
    #[must_use]
    pub fn colored(mut self) -> Template {
        self.parts.insert(0, TemplatePart::Literal(COLOR_START.to_string()));
        self.parts.push(TemplatePart::Literal(COLOR_END.to_string()));
        self.estimated_size += COLOR_START.len() + COLOR_END.len();
        self
    }

    /// Render the decoration for token `ip` resolved to `loc`.
    #[inline]
    pub fn render(&self, ip: &[u8], loc: &Location) -> BString {
        let mut out = Vec::with_capacity(self.estimated_size);
        // Writing into a Vec cannot fail.
        let _ = self.write(&mut out, ip, loc);
        out.into()
    }

    /// Render the decoration directly into `wtr`.
    #[inline]
    pub fn write<W: io::Write + ?Sized>(
        &self,
        wtr: &mut W,
        ip: &[u8],
        loc: &Location,
    ) -> io::Result<()> {
        for part in &self.parts {
            match part {
                TemplatePart::Literal(s) => wtr.write_all(s.as_bytes())?,
                TemplatePart::Field(f) => wtr.write_all(f.value(ip, loc))?,
            }
        }
        Ok(())
    }

    /// Get the fields referenced in this template.
    #[must_use]
    pub fn fields(&self) -> Vec<Field> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                TemplatePart::Field(field) => Some(*field),
                TemplatePart::Literal(_) => None,
            })
            .collect()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                TemplatePart::Literal(s) => {
                    write!(f, "{}", s.replace('{', "{{").replace('}', "}}"))?
                }
                TemplatePart::Field(field) => write!(f, "{{{}}}", field.name())?,
            }
        }
        Ok(())
    }
}
