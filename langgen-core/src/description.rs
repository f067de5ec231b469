//! Language descriptions: the TOML files the CLI reads.
//!
//! A description declares the lexer (tokens, patterns, rules), the node type
//! hierarchy and the properties of one language:
//!
//! ```toml
//! name = "Foo"
//!
//! [lexer]
//! track_indent = false
//!
//! [[tokens]]
//! name = "Number"
//! retention = "text"
//!
//! [[patterns]]
//! name = "digit"
//! pattern = "[0-9]"
//!
//! [[rules]]
//! pattern = "{digit}+"
//! token = "Number"
//!
//! [[nodes]]
//! name = "FooNode"
//!
//! [[properties]]
//! owner = "FooNode"
//! name = "p_env"
//! implicit_env = true
//! expr = "orphan Env"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{CoreError, check};
use crate::lexer_spec::{Lexer, LexerConfig};
use crate::matcher::{Action, Alt, Matcher, RuleAssoc, TextRetention, TokenDecl};
use crate::parser::parse;
use crate::span::FileId;
use crate::typecheck::PropertyDef;
use crate::types::{NodeType, Type, TypeRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LanguageDescription {
    pub name: String,
    #[serde(default)]
    pub lexer: LexerSection,
    #[serde(default)]
    pub tokens: Vec<TokenSection>,
    #[serde(default)]
    pub patterns: Vec<PatternSection>,
    #[serde(default)]
    pub rules: Vec<RuleSection>,
    #[serde(default)]
    pub nodes: Vec<NodeSection>,
    #[serde(default)]
    pub properties: Vec<PropertySection>,
    /// File the description was read from.
    #[serde(skip)]
    pub source: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LexerSection {
    #[serde(default)]
    pub track_indent: bool,
    /// Overrides the default `<LANG>_` prefix.
    pub token_prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenSection {
    pub name: String,
    #[serde(default = "default_retention")]
    pub retention: TextRetention,
    #[serde(default)]
    pub starts_layout_ignore: bool,
    #[serde(default)]
    pub ends_layout_ignore: bool,
}

fn default_retention() -> TextRetention {
    TextRetention::Text
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternSection {
    pub name: String,
    pub pattern: String,
}

/// A rule: exactly one matcher key and exactly one of `token`, `ignore` or
/// `case`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSection {
    pub literal: Option<String>,
    pub pattern: Option<String>,
    pub no_case: Option<String>,
    /// Name of a pattern from the `patterns` list.
    pub named: Option<String>,
    pub token: Option<String>,
    #[serde(default)]
    pub ignore: bool,
    pub case: Option<Vec<AltSection>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AltSection {
    /// Previous tokens guarding this alternative; absent on the last one.
    pub prev: Option<Vec<String>>,
    pub send: String,
    pub match_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSection {
    pub name: String,
    pub base: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSection {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertySection {
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub implicit_env: bool,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    /// Body in DSL text.
    pub expr: String,
}

impl LanguageDescription {
    pub fn from_toml(text: &str, source: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let source = source.into();
        let mut description: LanguageDescription =
            toml::from_str(text).map_err(|e| CoreError::Description {
                path: source.clone(),
                message: e.to_string(),
            })?;
        description.source = source;
        Ok(description)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        LanguageDescription::from_toml(&text, path)
    }

    pub fn registry(&self) -> Result<TypeRegistry, CoreError> {
        let nodes = self
            .nodes
            .iter()
            .map(|node| NodeType {
                name: node.name.clone(),
                base: node.base.clone(),
                fields: node
                    .fields
                    .iter()
                    .map(|f| (f.name.clone(), Type::parse(&f.ty)))
                    .collect(),
            })
            .collect();
        TypeRegistry::new(nodes)
    }

    pub fn lexer(&self) -> Result<Lexer, CoreError> {
        let mut config = LexerConfig::new(&self.name).with_track_indent(self.lexer.track_indent);
        if let Some(prefix) = &self.lexer.token_prefix {
            config.token_prefix = prefix.clone();
        }
        let decls = self
            .tokens
            .iter()
            .map(|t| {
                let mut decl = TokenDecl::new(&t.name, t.retention);
                decl.start_ignore_layout = t.starts_layout_ignore;
                decl.end_ignore_layout = t.ends_layout_ignore;
                decl
            })
            .collect();
        let mut lexer = Lexer::new(decls, config)?;
        lexer.add_patterns(
            self.patterns
                .iter()
                .map(|p| (p.name.as_str(), p.pattern.as_str())),
        )?;
        for (index, rule) in self.rules.iter().enumerate() {
            let assoc = rule_assoc(&lexer, rule)
                .map_err(|e| e.in_context(format!("rule #{} of {}", index + 1, self.name)))?;
            lexer.add_rules([assoc])?;
        }
        Ok(lexer)
    }

    /// Property definitions with their bodies parsed.
    pub fn properties(&self) -> Result<Vec<PropertyDef>, CoreError> {
        self.properties
            .iter()
            .enumerate()
            .map(|(index, prop)| {
                let file_id = FileId(u32::try_from(index).unwrap_or(u32::MAX));
                let body = parse(file_id, &prop.expr).map_err(|e| CoreError::Description {
                    path: self.source.clone(),
                    message: format!("property {}.{}: {e}", prop.owner, prop.name),
                })?;
                Ok(PropertyDef {
                    owner: prop.owner.clone(),
                    name: prop.name.clone(),
                    has_implicit_env: prop.implicit_env,
                    ty: prop.ty.as_deref().map(Type::parse),
                    body,
                })
            })
            .collect()
    }
}

fn malformed_rule(message: &str) -> CoreError {
    CoreError::specification(format!("malformed rule: {message}"), "E0101")
}

fn rule_assoc(lexer: &Lexer, rule: &RuleSection) -> Result<RuleAssoc, CoreError> {
    let matchers = [
        rule.literal.as_ref().map(|t| Matcher::literal(t.as_str())),
        rule.pattern.as_ref().map(|t| Matcher::pattern(t.as_str())),
        rule.no_case.as_ref().map(|t| Matcher::no_case(t.as_str())),
    ];
    let named = match &rule.named {
        Some(name) => Some(lexer.pattern(name).ok_or_else(|| {
            CoreError::specification(format!("unknown pattern {name}"), "E0101")
        })?),
        None => None,
    };
    let mut matchers = matchers.into_iter().chain([named]).flatten();
    let matcher = matchers
        .next()
        .ok_or_else(|| malformed_rule("no matcher (literal, pattern, no_case or named)"))?;
    check(matchers.next().is_none(), || malformed_rule("more than one matcher"))?;

    let actions = usize::from(rule.token.is_some())
        + usize::from(rule.ignore)
        + usize::from(rule.case.is_some());
    check(actions == 1, || {
        malformed_rule("exactly one of token, ignore or case is required")
    })?;

    if let Some(token) = &rule.token {
        Ok(RuleAssoc::new(matcher, Action::Send(lexer.token(token.as_str())?)))
    } else if let Some(alts) = &rule.case {
        let alts = alts
            .iter()
            .map(|alt| {
                let send = lexer.token(alt.send.as_str())?;
                match &alt.prev {
                    Some(prev) => {
                        let prev = prev
                            .iter()
                            .map(|t| lexer.token(t.as_str()))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(Alt::when(prev, send, alt.match_size))
                    }
                    None => Ok(Alt::otherwise(send, alt.match_size)),
                }
            })
            .collect::<Result<Vec<_>, CoreError>>()?;
        lexer.case_rule(matcher, alts)
    } else {
        Ok(RuleAssoc::new(matcher, Action::Ignore))
    }
}

/// Load every `*.toml` description under `root`, sorted by path.
pub fn load_descriptions(root: impl AsRef<Path>) -> Result<Vec<LanguageDescription>, CoreError> {
    let root = root.as_ref();
    let mut paths = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| CoreError::Description {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();
    paths.iter().map(LanguageDescription::load).collect()
}
