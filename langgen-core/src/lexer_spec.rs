//! Lexer specification compiler.
//!
//! A `Lexer` aggregates the token catalog, named patterns and ordered match
//! rules of a language. It performs no automaton construction: `emit` hands
//! the ordered catalog and rule list to the renderer, and the pattern
//! matching backend does the rest.
//!
//! Rule order is declaration order and the first matching rule wins. Two
//! rules are always present first: end of input sends `Termination` (kind 0)
//! and lexing failure sends `LexingFailure`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::diagnostic::Diagnostic;
use crate::error::{CoreError, check};
use crate::matcher::{Action, Alt, Matcher, RuleAssoc, TextRetention, TokenAction, TokenDecl, TokenId};
use crate::names::Name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerConfig {
    /// Emit indent, dedent and newline tokens.
    pub track_indent: bool,
    /// Prefix of the token constants in the pattern-matching backend.
    pub token_prefix: String,
    /// Language name, prefixed to token names in generated sources.
    pub lang_name: Name,
}

impl LexerConfig {
    pub fn new(lang_name: &str) -> Self {
        let lang_name = Name::from_camel(lang_name);
        LexerConfig {
            track_indent: false,
            token_prefix: format!("{}_", lang_name.upper()),
            lang_name,
        }
    }

    pub fn with_track_indent(mut self, track_indent: bool) -> Self {
        self.track_indent = track_indent;
        self
    }
}

/// Anything that designates a token kind.
#[derive(Debug, Clone, Copy)]
pub enum TokenRef<'a> {
    Action(&'a TokenAction),
    Id(TokenId),
    Name(&'a Name),
    /// Case-insensitive token name, or the exact text of a literal rule.
    Text(&'a str),
}

impl<'a> From<&'a TokenAction> for TokenRef<'a> {
    fn from(action: &'a TokenAction) -> Self {
        TokenRef::Action(action)
    }
}

impl From<TokenId> for TokenRef<'_> {
    fn from(id: TokenId) -> Self {
        TokenRef::Id(id)
    }
}

impl<'a> From<&'a Name> for TokenRef<'a> {
    fn from(name: &'a Name) -> Self {
        TokenRef::Name(name)
    }
}

impl<'a> From<&'a str> for TokenRef<'a> {
    fn from(text: &'a str) -> Self {
        TokenRef::Text(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedPattern {
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone)]
pub struct Lexer {
    config: LexerConfig,
    tokens: Vec<TokenAction>,
    patterns: Vec<NamedPattern>,
    rules: Vec<RuleAssoc>,
    /// Literal text -> token sent by the literal rule, so that token kinds can
    /// be found back from their spelling.
    literals_map: HashMap<String, TokenId>,
    warnings: Vec<Diagnostic>,
}

impl Lexer {
    pub const TERMINATION: TokenId = TokenId(0);
    pub const LEXING_FAILURE: TokenId = TokenId(1);

    /// Register `decls` after the built-in token kinds and add the implicit
    /// rules.
    pub fn new(decls: Vec<TokenDecl>, config: LexerConfig) -> Result<Self, CoreError> {
        let mut catalog = vec![
            TokenDecl::with_text("Termination"),
            TokenDecl::with_text("LexingFailure"),
        ];
        if config.track_indent {
            catalog.push(TokenDecl::with_text("Indent"));
            catalog.push(TokenDecl::with_text("Dedent"));
            catalog.push(TokenDecl::with_text("Newline"));
        }
        catalog.extend(decls);

        let mut tokens: Vec<TokenAction> = Vec::with_capacity(catalog.len());
        for decl in catalog {
            check(tokens.iter().all(|t| t.name != decl.name), || {
                CoreError::specification(format!("token {} is declared twice", decl.name), "E0103")
            })?;
            let kind = u16::try_from(tokens.len()).map_err(|_| {
                CoreError::specification("too many token kinds", "E0110")
            })?;
            tokens.push(TokenAction::register(TokenId(kind), decl));
        }

        let mut lexer = Lexer {
            config,
            tokens,
            patterns: Vec::new(),
            rules: Vec::new(),
            literals_map: HashMap::new(),
            warnings: Vec::new(),
        };
        lexer.add_rules([
            RuleAssoc::new(Matcher::Eof, Action::Send(Lexer::TERMINATION)),
            RuleAssoc::new(Matcher::Failure, Action::Send(Lexer::LEXING_FAILURE)),
        ])?;
        if let Some(newline) = lexer.newline() {
            lexer.add_rules([RuleAssoc::new(
                Matcher::literal("\\n"),
                Action::Send(newline),
            )])?;
        }
        Ok(lexer)
    }

    pub fn newline(&self) -> Option<TokenId> {
        self.config.track_indent.then_some(TokenId(4))
    }

    /// Register named patterns, in order. A pattern can refer to the ones
    /// added before it with the `{name}` notation.
    pub fn add_patterns<'p>(
        &mut self,
        patterns: impl IntoIterator<Item = (&'p str, &'p str)>,
    ) -> Result<(), CoreError> {
        for (name, pattern) in patterns {
            check(self.patterns.iter().all(|p| p.name != name), || {
                CoreError::specification(format!("pattern {name} is declared twice"), "E0104")
            })?;
            self.patterns.push(NamedPattern {
                name: name.to_string(),
                pattern: pattern.to_string(),
            });
        }
        Ok(())
    }

    /// Matcher referring to a pattern registered with `add_patterns`.
    pub fn pattern(&self, name: &str) -> Option<Matcher> {
        self.patterns
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| Matcher::Named {
                name: p.name.clone(),
                pattern: p.pattern.clone(),
            })
    }

    /// Append rules. Order matters: earlier rules are tried first, so a rule
    /// can be made dead by an earlier, more general one.
    pub fn add_rules<R: Into<RuleAssoc>>(
        &mut self,
        rules: impl IntoIterator<Item = R>,
    ) -> Result<(), CoreError> {
        let rules: Vec<RuleAssoc> = rules.into_iter().map(Into::into).collect();
        for rule in &rules {
            for token in rule.action.sent_tokens() {
                check(self.token_action(token).is_some(), || {
                    CoreError::specification(
                        format!("token kind {} is not part of this lexer", token.value()),
                        "E0108",
                    )
                    .in_context(format!("rule {}", rule.matcher.render()))
                })?;
            }
        }
        for rule in rules {
            if let (Matcher::Literal(text), Action::Send(token)) = (&rule.matcher, &rule.action) {
                if let Some(previous) = self.literals_map.insert(text.clone(), *token) {
                    if previous != *token {
                        self.warnings.push(
                            Diagnostic::warning(format!(
                                "literal \"{text}\" is now mapped to {} instead of {}",
                                self.tokens[token.value() as usize].name,
                                self.tokens[previous.value() as usize].name,
                            ))
                            .with_code("E0111"),
                        );
                    }
                }
            }
            self.rules.push(rule);
        }
        Ok(())
    }

    /// See `RuleAssoc::case`.
    pub fn case_rule(&self, matcher: Matcher, alts: Vec<Alt>) -> Result<RuleAssoc, CoreError> {
        RuleAssoc::case(matcher, alts)
    }

    pub fn token_action(&self, id: TokenId) -> Option<&TokenAction> {
        self.tokens.get(id.value() as usize)
    }

    /// Resolve any token designation to its kind.
    pub fn token<'a>(&self, token: impl Into<TokenRef<'a>>) -> Result<TokenId, CoreError> {
        let name = self.token_base_name(token)?;
        self.tokens
            .iter()
            .find(|t| &t.name == name)
            .map(|t| t.kind)
            .ok_or_else(|| CoreError::specification(format!("unknown token {name}"), "E0102"))
    }

    /// Name of a token, given as an action, a kind, a declared name, or a
    /// string that is either a case-insensitive token name or the text of a
    /// literal rule.
    pub fn token_base_name<'a>(&self, token: impl Into<TokenRef<'a>>) -> Result<&Name, CoreError> {
        match token.into() {
            TokenRef::Action(action) => self.known_id(action.kind),
            TokenRef::Id(id) => self.known_id(id),
            TokenRef::Name(name) => self
                .tokens
                .iter()
                .find(|t| &t.name == name)
                .map(|t| &t.name)
                .ok_or_else(|| {
                    CoreError::specification(
                        format!("{name} is not part of the valid tokens for this grammar"),
                        "E0102",
                    )
                }),
            TokenRef::Text(text) => {
                if let Some(t) = self.tokens.iter().find(|t| t.name.matches_loosely(text)) {
                    return Ok(&t.name);
                }
                match self.literals_map.get(text) {
                    Some(id) => self.known_id(*id),
                    None => Err(CoreError::specification(
                        format!("{text} token literal is not part of the valid tokens for this grammar"),
                        "E0102",
                    )),
                }
            }
        }
    }

    fn known_id(&self, id: TokenId) -> Result<&Name, CoreError> {
        self.token_action(id).map(|t| &t.name).ok_or_else(|| {
            CoreError::specification(
                format!("token kind {} is not part of this lexer", id.value()),
                "E0108",
            )
        })
    }

    /// Constant of `token` in the pattern-matching backend.
    pub fn quex_token_name<'a>(&self, token: impl Into<TokenRef<'a>>) -> Result<String, CoreError> {
        Ok(format!(
            "{}{}",
            self.config.token_prefix,
            self.token_base_name(token)?.upper()
        ))
    }

    /// C constant of `token`.
    pub fn c_token_name<'a>(&self, token: impl Into<TokenRef<'a>>) -> Result<String, CoreError> {
        Ok(self.config.lang_name.join(self.token_base_name(token)?).upper())
    }

    /// Enumerator of `token` in the generated Ada sources.
    pub fn ada_token_name<'a>(&self, token: impl Into<TokenRef<'a>>) -> Result<String, CoreError> {
        Ok(self
            .config
            .lang_name
            .join(self.token_base_name(token)?)
            .camel_with_underscores()
            .to_string())
    }

    pub fn tokens(&self) -> &[TokenAction] {
        &self.tokens
    }

    /// Token kinds sorted by numeric value.
    pub fn sorted_tokens(&self) -> Vec<&TokenAction> {
        let mut tokens: Vec<&TokenAction> = self.tokens.iter().collect();
        tokens.sort_by_key(|t| t.value());
        tokens
    }

    pub fn patterns(&self) -> &[NamedPattern] {
        &self.patterns
    }

    pub fn rules(&self) -> &[RuleAssoc] {
        &self.rules
    }

    pub fn literal_token(&self, text: &str) -> Option<TokenId> {
        self.literals_map.get(text).copied()
    }

    /// Non-fatal findings, such as a literal rebound to another token.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Ordered token catalog, patterns and rules, ready for rendering.
    pub fn emit(&self) -> Result<LexerIr, CoreError> {
        let tokens = self
            .sorted_tokens()
            .into_iter()
            .map(|t| {
                Ok(TokenEntry {
                    value: t.value(),
                    name: t.name.camel_with_underscores().to_string(),
                    quex_name: self.quex_token_name(t)?,
                    c_name: self.c_token_name(t)?,
                    ada_name: self.ada_token_name(t)?,
                    retention: t.retention,
                    start_ignore_layout: t.start_ignore_layout,
                    end_ignore_layout: t.end_ignore_layout,
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        let rules = self
            .rules
            .iter()
            .map(|rule| {
                Ok(RuleEntry {
                    matcher: rule.matcher.render(),
                    action: self.emit_action(&rule.action)?,
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        Ok(LexerIr {
            lang_name: self.config.lang_name.camel_with_underscores().to_string(),
            token_prefix: self.config.token_prefix.clone(),
            track_indent: self.config.track_indent,
            tokens,
            patterns: self.patterns.clone(),
            rules,
        })
    }

    fn emit_action(&self, action: &Action) -> Result<ActionEntry, CoreError> {
        match action {
            Action::Send(token) => {
                let retention = self
                    .token_action(*token)
                    .map(|t| t.retention)
                    .unwrap_or(TextRetention::Text);
                Ok(ActionEntry::Send {
                    token: self.quex_token_name(*token)?,
                    with_lexeme: retention != TextRetention::Discard,
                })
            }
            Action::Ignore => Ok(ActionEntry::Ignore),
            Action::Case(case) => {
                let mut alts = Vec::with_capacity(case.alts.len());
                for alt in &case.alts {
                    alts.push(self.emit_alt(alt)?);
                }
                Ok(ActionEntry::Case {
                    max_match_len: case.max_match_len,
                    alts,
                    default: self.emit_alt(&case.last_alt)?,
                })
            }
        }
    }

    fn emit_alt(&self, alt: &Alt) -> Result<AltEntry, CoreError> {
        let prev_tokens = alt
            .prev_token_cond
            .iter()
            .flatten()
            .map(|t| self.quex_token_name(*t))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(AltEntry {
            prev_tokens,
            send: self.quex_token_name(alt.send)?,
            match_size: alt.match_size,
        })
    }
}

/// Lexer specification handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexerIr {
    pub lang_name: String,
    pub token_prefix: String,
    pub track_indent: bool,
    pub tokens: Vec<TokenEntry>,
    pub patterns: Vec<NamedPattern>,
    pub rules: Vec<RuleEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub value: u16,
    pub name: String,
    pub quex_name: String,
    pub c_name: String,
    pub ada_name: String,
    pub retention: TextRetention,
    pub start_ignore_layout: bool,
    pub end_ignore_layout: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntry {
    pub matcher: String,
    pub action: ActionEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionEntry {
    Send { token: String, with_lexeme: bool },
    Ignore,
    Case {
        max_match_len: usize,
        alts: Vec<AltEntry>,
        default: AltEntry,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AltEntry {
    /// Empty for the default alternative.
    pub prev_tokens: Vec<String>,
    pub send: String,
    pub match_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc_lexer() -> Lexer {
        let mut lexer = Lexer::new(
            vec![
                TokenDecl::with_text("Number"),
                TokenDecl::with_text("Plus"),
                TokenDecl::with_symbol("Identifier"),
                TokenDecl::with_text("LPar").starts_layout_ignore(),
                TokenDecl::with_text("RPar").ends_layout_ignore(),
            ],
            LexerConfig::new("Calc"),
        )
        .expect("lexer");
        lexer
            .add_patterns([("digit", "[0-9]"), ("integer", "{digit}(_?{digit})*")])
            .expect("patterns");
        let number = lexer.token("Number").expect("number");
        let plus = lexer.token("plus").expect("plus");
        let integer = lexer.pattern("integer").expect("integer pattern");
        lexer
            .add_rules([
                (integer, number),
                (Matcher::literal("+"), plus),
            ])
            .expect("rules");
        lexer.add_rules([(Matcher::pattern("[ \\t]+"), Action::Ignore)]).expect("ignore");
        lexer
    }

    #[test]
    fn token_kinds_follow_declaration_order() {
        let lexer = calc_lexer();
        let values: Vec<u16> = lexer.tokens().iter().map(TokenAction::value).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(lexer.tokens()[0].name.camel(), "Termination");
        assert_eq!(lexer.tokens()[1].name.camel(), "LexingFailure");
        assert_eq!(lexer.tokens()[2].name.camel(), "Number");
    }

    #[test]
    fn implicit_rules_come_first() {
        let lexer = calc_lexer();
        let rules = lexer.rules();
        assert_eq!(rules[0], RuleAssoc::new(Matcher::Eof, Action::Send(Lexer::TERMINATION)));
        assert_eq!(
            rules[1],
            RuleAssoc::new(Matcher::Failure, Action::Send(Lexer::LEXING_FAILURE))
        );
        assert_eq!(rules[2].matcher.render(), "{integer}");
    }

    #[test]
    fn indentation_tracking_injects_layout_tokens() {
        let lexer = Lexer::new(
            vec![TokenDecl::with_text("Number")],
            LexerConfig::new("Calc").with_track_indent(true),
        )
        .expect("lexer");
        let names: Vec<String> = lexer.tokens().iter().map(|t| t.name.camel()).collect();
        assert_eq!(
            names,
            vec!["Termination", "LexingFailure", "Indent", "Dedent", "Newline", "Number"]
        );
        assert_eq!(lexer.rules().len(), 3);
        assert_eq!(lexer.rules()[2].action, Action::Send(TokenId(4)));
        assert_eq!(lexer.literal_token("\\n"), lexer.newline());
    }

    #[test]
    fn resolves_token_names_uniformly() {
        let lexer = calc_lexer();
        let number = &lexer.tokens()[2];
        let expected = Name::from_camel("Number");
        assert_eq!(lexer.token_base_name(number).expect("action"), &expected);
        assert_eq!(lexer.token_base_name(TokenId(2)).expect("id"), &expected);
        assert_eq!(lexer.token_base_name(&expected).expect("name"), &expected);
        assert_eq!(lexer.token_base_name("NUMBER").expect("text"), &expected);
        assert_eq!(lexer.token_base_name("lexing_failure").expect("text").camel(), "LexingFailure");
        assert_eq!(lexer.token_base_name("+").expect("literal").camel(), "Plus");
    }

    #[test]
    fn unknown_token_text_is_a_reported_error() {
        let lexer = calc_lexer();
        let err = lexer.token_base_name("-").unwrap_err();
        assert_eq!(err.diagnostic().and_then(|d| d.code), Some("E0102"));
        let err = lexer.token_base_name(&Name::from_camel("Minus")).unwrap_err();
        assert!(matches!(err, CoreError::Specification(_)));
        assert!(lexer.token_base_name(TokenId(42)).is_err());
    }

    #[test]
    fn rejects_duplicates_and_foreign_tokens() {
        let err = Lexer::new(
            vec![TokenDecl::with_text("Termination")],
            LexerConfig::new("Calc"),
        )
        .unwrap_err();
        assert_eq!(err.diagnostic().and_then(|d| d.code), Some("E0103"));

        let mut lexer = calc_lexer();
        let err = lexer.add_patterns([("digit", "[0-9]")]).unwrap_err();
        assert_eq!(err.diagnostic().and_then(|d| d.code), Some("E0104"));

        let rules_before = lexer.rules().len();
        let err = lexer
            .add_rules([(Matcher::literal("*"), TokenId(99))])
            .unwrap_err();
        assert_eq!(err.diagnostic().and_then(|d| d.code), Some("E0108"));
        assert_eq!(lexer.rules().len(), rules_before);
    }

    #[test]
    fn warns_when_a_literal_is_rebound() {
        let mut lexer = calc_lexer();
        let number = lexer.token("Number").expect("number");
        lexer.add_rules([(Matcher::literal("+"), number)]).expect("rule");
        assert_eq!(lexer.warnings().len(), 1);
        assert_eq!(lexer.literal_token("+"), Some(number));
    }

    #[test]
    fn emits_prefixed_token_names() {
        let lexer = calc_lexer();
        assert_eq!(lexer.quex_token_name("identifier").expect("quex"), "CALC_IDENTIFIER");
        assert_eq!(lexer.c_token_name("identifier").expect("c"), "CALC_IDENTIFIER");
        assert_eq!(lexer.ada_token_name("lpar").expect("ada"), "Calc_L_Par");

        let ir = lexer.emit().expect("emit");
        assert_eq!(ir.tokens.len(), 7);
        assert_eq!(ir.tokens[0].quex_name, "CALC_TERMINATION");
        assert!(ir.tokens[5].start_ignore_layout);
        assert!(ir.tokens[6].end_ignore_layout);
        assert_eq!(ir.rules[0].matcher, "<<EOF>>");
        assert_eq!(
            ir.rules[2].action,
            ActionEntry::Send {
                token: "CALC_NUMBER".into(),
                with_lexeme: true
            }
        );
        assert_eq!(ir.rules.last().map(|r| &r.action), Some(&ActionEntry::Ignore));
    }

    #[test]
    fn emits_case_alternatives() {
        let mut lexer = Lexer::new(
            vec![
                TokenDecl::with_symbol("Identifier"),
                TokenDecl::with_text("All"),
                TokenDecl::with_text("Tick"),
                TokenDecl::with_text("Char"),
            ],
            LexerConfig::new("Ada"),
        )
        .expect("lexer");
        let ident = lexer.token("identifier").expect("identifier");
        let all = lexer.token("all").expect("all");
        let tick = lexer.token("tick").expect("tick");
        let chr = lexer.token("char").expect("char");
        let rule = lexer
            .case_rule(
                Matcher::pattern("'.'"),
                vec![Alt::when([ident, all], tick, 1), Alt::otherwise(chr, 3)],
            )
            .expect("case");
        lexer.add_rules([rule]).expect("add case");

        let ir = lexer.emit().expect("emit");
        let ActionEntry::Case { max_match_len, alts, default } = &ir.rules[2].action else {
            panic!("expected a case action");
        };
        assert_eq!(*max_match_len, 3);
        assert_eq!(alts[0].prev_tokens, vec!["ADA_IDENTIFIER", "ADA_ALL"]);
        assert_eq!(alts[0].match_size, 1);
        assert!(default.prev_tokens.is_empty());
        assert_eq!(default.send, "ADA_CHAR");
    }
}
