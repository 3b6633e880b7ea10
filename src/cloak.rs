//! Nickname cloaking.
//!
//! Terminal output highlights the current user id in cyan (`ESC[36m{id}`).
//! Cloaking swaps that highlighted id for another name so it does not leak
//! into recordings or shared logs. Only the highlighted form is rewritten.

use std::borrow::Cow;

use regex::bytes::{NoExpand, Regex, RegexBuilder};

use crate::error::{Error, Result};

const CYAN: &str = "[36m";

/// Which id to hide and what to show in its place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloakConfig {
    pub id: String,
    pub replacement: String,
}

/// A compiled cloaking rule.
#[derive(Clone, Debug)]
pub struct Cloak {
    pattern: Regex,
    replacement: Vec<u8>,
}

impl Cloak {
    /// Compile `config` into a rule. The id is matched literally and without regard to case.
    pub fn new(config: &CloakConfig) -> Result<Cloak> {
        let pattern = RegexBuilder::new(&format!(
            "{}{}",
            regex::escape(CYAN),
            regex::escape(&config.id)
        ))
        .case_insensitive(true)
        .build()
        .map_err(Error::InvalidCloak)?;
        let replacement = format!("{CYAN}{}", config.replacement).into_bytes();
        Ok(Cloak {
            pattern,
            replacement,
        })
    }

    /// Rewrite every highlighted occurrence of the id in `text`.
    #[inline]
    pub fn apply<'a>(&self, text: &'a [u8]) -> Cow<'a, [u8]> {
        self.pattern
            .replace_all(text, NoExpand(self.replacement.as_slice()))
    }
}
