//! Matchers and actions: the building blocks of lexer rules.
//!
//! A matcher says which input triggers a rule; an action says what the lexer
//! does with the matched text. Both are closed sets, so rendering them is an
//! exhaustive match.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, check};
use crate::names::Name;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Matcher {
    /// Matches the given text literally: `Literal("a+")` matches `a` then `+`.
    Literal(String),
    /// Regex-like pattern in the syntax of the pattern-matching backend.
    Pattern(String),
    /// Case insensitive pattern, rendered as `\C{...}`.
    NoCase(String),
    /// Pattern registered on the lexer with `add_patterns`.
    Named { name: String, pattern: String },
    /// End of the input stream.
    Eof,
    /// Lexing failure.
    Failure,
}

impl Matcher {
    pub fn literal(text: impl Into<String>) -> Self {
        Matcher::Literal(text.into())
    }

    pub fn pattern(text: impl Into<String>) -> Self {
        Matcher::Pattern(text.into())
    }

    pub fn no_case(text: impl Into<String>) -> Self {
        Matcher::NoCase(text.into())
    }

    /// Maximum number of characters this matcher can consume.
    ///
    /// Only literals, fixed-width patterns and end of input have a bound; the
    /// other matchers report `UnknownExtent`.
    pub fn max_match_length(&self) -> Result<usize, CoreError> {
        match self {
            Matcher::Literal(text) => Ok(text.chars().count()),
            Matcher::Pattern(pattern)
            | Matcher::NoCase(pattern)
            | Matcher::Named { pattern, .. } => fixed_width(pattern),
            Matcher::Eof => Ok(0),
            Matcher::Failure => Err(CoreError::UnknownExtent {
                pattern: self.render(),
            }),
        }
    }

    pub fn render(&self) -> String {
        match self {
            Matcher::Literal(text) => format!("\"{text}\""),
            Matcher::Pattern(pattern) => pattern.clone(),
            Matcher::NoCase(pattern) => format!("\\C{{{pattern}}}"),
            Matcher::Named { name, .. } => format!("{{{name}}}"),
            Matcher::Eof => "<<EOF>>".to_string(),
            Matcher::Failure => "on_failure".to_string(),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// A pattern has a known width only if every character stands for itself
/// (or is `.`, which always consumes exactly one character).
fn fixed_width(pattern: &str) -> Result<usize, CoreError> {
    let mut width = 0;
    for ch in pattern.chars() {
        check(
            ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '\''),
            || CoreError::UnknownExtent {
                pattern: pattern.to_string(),
            },
        )?;
        width += 1;
    }
    Ok(width)
}

/// Numeric kind of a token: its index in the lexer's token catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub u16);

impl TokenId {
    pub fn value(self) -> u16 {
        self.0
    }
}

/// What a token keeps from the text it was lexed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRetention {
    Discard,
    /// A new string is allocated for each token (literals, numbers).
    Text,
    /// Like `Text`, for tokens the parser skips (comments).
    Trivia,
    /// Text is interned, so tokens with the same text share it.
    Symbol,
}

/// Declaration of a token kind, before it is registered in a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDecl {
    pub name: Name,
    pub retention: TextRetention,
    pub start_ignore_layout: bool,
    pub end_ignore_layout: bool,
}

impl TokenDecl {
    pub fn new(name: &str, retention: TextRetention) -> Self {
        TokenDecl {
            name: Name::from_camel(name),
            retention,
            start_ignore_layout: false,
            end_ignore_layout: false,
        }
    }

    pub fn with_text(name: &str) -> Self {
        TokenDecl::new(name, TextRetention::Text)
    }

    pub fn with_symbol(name: &str) -> Self {
        TokenDecl::new(name, TextRetention::Symbol)
    }

    pub fn with_trivia(name: &str) -> Self {
        TokenDecl::new(name, TextRetention::Trivia)
    }

    /// While such a token is open, indent, dedent and newline tokens are not
    /// emitted. Activations nest; pairing them is up to the grammar author.
    pub fn starts_layout_ignore(mut self) -> Self {
        self.start_ignore_layout = true;
        self
    }

    pub fn ends_layout_ignore(mut self) -> Self {
        self.end_ignore_layout = true;
        self
    }
}

/// A token kind registered in a lexer's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenAction {
    pub kind: TokenId,
    pub name: Name,
    pub retention: TextRetention,
    pub start_ignore_layout: bool,
    pub end_ignore_layout: bool,
}

impl TokenAction {
    pub(crate) fn register(kind: TokenId, decl: TokenDecl) -> Self {
        TokenAction {
            kind,
            name: decl.name,
            retention: decl.retention,
            start_ignore_layout: decl.start_ignore_layout,
            end_ignore_layout: decl.end_ignore_layout,
        }
    }

    pub fn value(&self) -> u16 {
        self.kind.value()
    }
}

/// One branch of a case rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alt {
    /// Taken only if the previous token is one of these; `None` is the
    /// default branch.
    pub prev_token_cond: Option<Vec<TokenId>>,
    pub send: TokenId,
    /// Number of matched characters kept; the rest is given back to the input.
    pub match_size: usize,
}

impl Alt {
    pub fn when(prev: impl IntoIterator<Item = TokenId>, send: TokenId, match_size: usize) -> Self {
        Alt {
            prev_token_cond: Some(prev.into_iter().collect()),
            send,
            match_size,
        }
    }

    pub fn otherwise(send: TokenId, match_size: usize) -> Self {
        Alt {
            prev_token_cond: None,
            send,
            match_size,
        }
    }
}

/// Dispatch on the previously emitted token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseAction {
    pub max_match_len: usize,
    pub alts: Vec<Alt>,
    pub last_alt: Alt,
}

impl CaseAction {
    pub fn new(max_match_len: usize, mut alts: Vec<Alt>) -> Result<Self, CoreError> {
        for alt in &alts {
            check(alt.match_size <= max_match_len, || {
                CoreError::specification(
                    format!(
                        "match size for this case alternative ({}) cannot be longer than the case matcher ({} chars)",
                        alt.match_size, max_match_len
                    ),
                    "E0105",
                )
            })?;
            check(
                alt.prev_token_cond.as_ref().is_none_or(|cond| !cond.is_empty()),
                || CoreError::specification("case alternative has an empty previous token condition", "E0109"),
            )?;
        }
        let last_alt = alts.pop().ok_or_else(|| {
            CoreError::specification("a case rule needs at least one alternative", "E0107")
        })?;
        check(last_alt.prev_token_cond.is_none(), || {
            CoreError::specification(
                "the last alternative to a case matcher must have no previous token condition",
                "E0106",
            )
        })?;
        Ok(CaseAction {
            max_match_len,
            alts,
            last_alt,
        })
    }

    /// Guarded alternatives followed by the default one.
    pub fn all_alts(&self) -> impl Iterator<Item = &Alt> {
        self.alts.iter().chain(std::iter::once(&self.last_alt))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Action {
    /// Emit a token of this kind.
    Send(TokenId),
    /// Drop the matched text.
    Ignore,
    Case(CaseAction),
}

impl Action {
    /// Token kinds this action can emit.
    pub fn sent_tokens(&self) -> Vec<TokenId> {
        match self {
            Action::Send(token) => vec![*token],
            Action::Ignore => Vec::new(),
            Action::Case(case) => case
                .all_alts()
                .flat_map(|alt| {
                    let mut ids = vec![alt.send];
                    ids.extend(alt.prev_token_cond.iter().flatten().copied());
                    ids
                })
                .collect(),
        }
    }
}

/// A matcher paired with the action to run when it matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleAssoc {
    pub matcher: Matcher,
    pub action: Action,
}

impl RuleAssoc {
    pub fn new(matcher: Matcher, action: Action) -> Self {
        RuleAssoc { matcher, action }
    }

    /// Context-dependent rule: dispatch on the previous token once `matcher`
    /// matched. The matcher must have a known maximum length, which bounds
    /// every alternative's match size.
    pub fn case(matcher: Matcher, alts: Vec<Alt>) -> Result<Self, CoreError> {
        let max_match_len = matcher.max_match_length()?;
        let action = CaseAction::new(max_match_len, alts)
            .map_err(|e| e.in_context(format!("case rule {}", matcher.render())))?;
        Ok(RuleAssoc {
            matcher,
            action: Action::Case(action),
        })
    }
}

impl From<(Matcher, Action)> for RuleAssoc {
    fn from((matcher, action): (Matcher, Action)) -> Self {
        RuleAssoc::new(matcher, action)
    }
}

impl From<(Matcher, TokenId)> for RuleAssoc {
    fn from((matcher, token): (Matcher, TokenId)) -> Self {
        RuleAssoc::new(matcher, Action::Send(token))
    }
}
