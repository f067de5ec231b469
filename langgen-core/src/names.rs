//! Identifier names with casing conversions.
//!
//! A `Name` is stored in its canonical `Camel_With_Underscores` form and can be
//! viewed in the casing conventions the generated sources need (upper case
//! constants, lower case identifiers, camel case type names).

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name {
    base: String,
}

impl Name {
    /// Build a name from its canonical form, e.g. `Lexing_Failure`.
    pub fn new(base: impl Into<String>) -> Self {
        Name { base: base.into() }
    }

    /// `LexingFailure` -> `Lexing_Failure`
    pub fn from_camel(camel: &str) -> Self {
        let mut base = String::with_capacity(camel.len() + 4);
        for (i, ch) in camel.chars().enumerate() {
            if ch.is_ascii_uppercase() && i > 0 && !base.ends_with('_') {
                base.push('_');
            }
            base.push(ch);
        }
        Name { base }
    }

    /// `lexing_failure` -> `Lexing_Failure`
    pub fn from_lower(lower: &str) -> Self {
        Name {
            base: capitalize_words(lower),
        }
    }

    /// `LEXING_FAILURE` -> `Lexing_Failure`
    pub fn from_upper(upper: &str) -> Self {
        Name {
            base: capitalize_words(&upper.to_ascii_lowercase()),
        }
    }

    pub fn camel_with_underscores(&self) -> &str {
        &self.base
    }

    pub fn camel(&self) -> String {
        self.base.replace('_', "")
    }

    pub fn lower(&self) -> String {
        self.base.to_ascii_lowercase()
    }

    pub fn upper(&self) -> String {
        self.base.to_ascii_uppercase()
    }

    /// Concatenate two names, as in `lang_name + token_name`.
    pub fn join(&self, other: &Name) -> Name {
        Name {
            base: format!("{}_{}", self.base, other.base),
        }
    }

    /// Case-insensitive comparison against a user-written spelling.
    ///
    /// Both `lexing_failure` and `LexingFailure` designate `Lexing_Failure`.
    pub fn matches_loosely(&self, text: &str) -> bool {
        let text = text.to_ascii_lowercase();
        text == self.lower() || text == self.camel().to_ascii_lowercase()
    }
}

fn capitalize_words(lower: &str) -> String {
    lower
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("_")
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}
