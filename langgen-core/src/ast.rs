//! Abstract expression tree for property bodies.
//!
//! Trees are built by composing values, either through the builder methods
//! below or by parsing DSL text. They carry no types and no resolved names:
//! the construction pass (`typecheck`) does that, in the context of one
//! property. A tree is never mutated once built and can be constructed any
//! number of times.

use std::fmt;

/// Deepest operand nesting accepted by the parser and the construction pass.
pub const MAX_NESTING_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    /// Text literal; used as a lookup key it denotes a symbol.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbstractExpr {
    Literal(Literal),
    /// The node owning the property being compiled.
    SelfNode,
    /// The ambient lexical environment.
    Env,
    EmptyEnv,
    Field {
        receiver: Box<AbstractExpr>,
        field: String,
    },
    Array(Vec<AbstractExpr>),
    /// Lookup of `key` in `env`.
    EnvGet {
        env: Box<AbstractExpr>,
        key: Box<AbstractExpr>,
        /// Whether parent environments are searched too.
        recursive: Box<AbstractExpr>,
        /// Only consider entries established before the owning node.
        sequential: bool,
        /// Yield the first entry instead of the whole result array.
        resolve_unique: bool,
    },
    /// Evaluate `expr` with `env` as the ambient environment.
    EvalInEnv {
        env: Box<AbstractExpr>,
        expr: Box<AbstractExpr>,
    },
    /// Copy of an environment with no parent.
    Orphan(Box<AbstractExpr>),
    /// Group of an array of environments.
    Group(Box<AbstractExpr>),
    /// Group of a fixed list of environments.
    GroupAll(Vec<AbstractExpr>),
    IsVisibleFrom {
        referenced: Box<AbstractExpr>,
        base: Box<AbstractExpr>,
    },
    /// Node associated with an environment.
    EnvNode(Box<AbstractExpr>),
}

impl From<&str> for AbstractExpr {
    fn from(text: &str) -> Self {
        AbstractExpr::Literal(Literal::Text(text.to_string()))
    }
}

impl From<String> for AbstractExpr {
    fn from(text: String) -> Self {
        AbstractExpr::Literal(Literal::Text(text))
    }
}

impl From<bool> for AbstractExpr {
    fn from(value: bool) -> Self {
        AbstractExpr::Literal(Literal::Bool(value))
    }
}

impl From<i64> for AbstractExpr {
    fn from(value: i64) -> Self {
        AbstractExpr::Literal(Literal::Int(value))
    }
}

impl AbstractExpr {
    pub fn self_node() -> Self {
        AbstractExpr::SelfNode
    }

    pub fn env() -> Self {
        AbstractExpr::Env
    }

    pub fn empty_env() -> Self {
        AbstractExpr::EmptyEnv
    }

    pub fn array(elements: impl IntoIterator<Item = AbstractExpr>) -> Self {
        AbstractExpr::Array(elements.into_iter().collect())
    }

    pub fn group_all(envs: impl IntoIterator<Item = AbstractExpr>) -> Self {
        AbstractExpr::GroupAll(envs.into_iter().collect())
    }

    pub fn field(self, field: &str) -> Self {
        AbstractExpr::Field {
            receiver: Box::new(self),
            field: field.to_string(),
        }
    }

    fn lookup(self, key: AbstractExpr, sequential: bool, resolve_unique: bool) -> Self {
        AbstractExpr::EnvGet {
            env: Box::new(self),
            key: Box::new(key),
            recursive: Box::new(AbstractExpr::from(true)),
            sequential,
            resolve_unique,
        }
    }

    pub fn get(self, key: impl Into<AbstractExpr>) -> Self {
        self.lookup(key.into(), false, false)
    }

    pub fn get_sequential(self, key: impl Into<AbstractExpr>) -> Self {
        self.lookup(key.into(), true, false)
    }

    pub fn resolve_unique(self, key: impl Into<AbstractExpr>) -> Self {
        self.lookup(key.into(), false, true)
    }

    /// Set the `recursive` operand of a lookup; other expressions are
    /// returned unchanged.
    pub fn with_recursive(self, recursive: impl Into<AbstractExpr>) -> Self {
        match self {
            AbstractExpr::EnvGet {
                env,
                key,
                sequential,
                resolve_unique,
                ..
            } => AbstractExpr::EnvGet {
                env,
                key,
                recursive: Box::new(recursive.into()),
                sequential,
                resolve_unique,
            },
            other => other,
        }
    }

    pub fn eval_in_env(self, expr: impl Into<AbstractExpr>) -> Self {
        AbstractExpr::EvalInEnv {
            env: Box::new(self),
            expr: Box::new(expr.into()),
        }
    }

    pub fn orphan(self) -> Self {
        AbstractExpr::Orphan(Box::new(self))
    }

    pub fn env_group(self) -> Self {
        AbstractExpr::Group(Box::new(self))
    }

    pub fn is_visible_from(self, base: impl Into<AbstractExpr>) -> Self {
        AbstractExpr::IsVisibleFrom {
            referenced: Box::new(self),
            base: Box::new(base.into()),
        }
    }

    pub fn env_node(self) -> Self {
        AbstractExpr::EnvNode(Box::new(self))
    }

    fn is_atomic(&self) -> bool {
        matches!(
            self,
            AbstractExpr::Literal(_)
                | AbstractExpr::SelfNode
                | AbstractExpr::Env
                | AbstractExpr::EmptyEnv
                | AbstractExpr::Field { .. }
                | AbstractExpr::Array(_)
        )
    }
}

/// Operand position: parenthesize anything that takes arguments.
struct Operand<'a>(&'a AbstractExpr);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_atomic() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "({})", self.0)
        }
    }
}

/// Prints the DSL text form, as used in diagnostics.
impl fmt::Display for AbstractExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstractExpr::Literal(Literal::Bool(b)) => write!(f, "{b}"),
            AbstractExpr::Literal(Literal::Int(i)) => write!(f, "{i}"),
            AbstractExpr::Literal(Literal::Text(s)) => write!(f, "{s:?}"),
            AbstractExpr::SelfNode => f.write_str("Self"),
            AbstractExpr::Env => f.write_str("Env"),
            AbstractExpr::EmptyEnv => f.write_str("EmptyEnv"),
            AbstractExpr::Field { receiver, field } => write!(f, "{}.{field}", Operand(receiver)),
            AbstractExpr::Array(elements) => {
                f.write_str("[")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", Operand(e))?;
                }
                f.write_str("]")
            }
            AbstractExpr::EnvGet {
                env,
                key,
                recursive,
                sequential,
                resolve_unique,
            } => {
                let op = match (sequential, resolve_unique) {
                    (_, true) => "resolve_unique",
                    (true, false) => "get_sequential",
                    (false, false) => "get",
                };
                if **recursive == AbstractExpr::from(true) {
                    write!(f, "{op} {} {}", Operand(env), Operand(key))
                } else {
                    write!(
                        f,
                        "recursive ({op} {} {}) {}",
                        Operand(env),
                        Operand(key),
                        Operand(recursive)
                    )
                }
            }
            AbstractExpr::EvalInEnv { env, expr } => {
                write!(f, "eval_in_env {} {}", Operand(env), Operand(expr))
            }
            AbstractExpr::Orphan(env) => write!(f, "orphan {}", Operand(env)),
            AbstractExpr::Group(array) => write!(f, "group {}", Operand(array)),
            AbstractExpr::GroupAll(envs) => {
                write!(f, "group {}", AbstractExpr::Array(envs.clone()))
            }
            AbstractExpr::IsVisibleFrom { referenced, base } => {
                write!(f, "is_visible_from {} {}", Operand(referenced), Operand(base))
            }
            AbstractExpr::EnvNode(env) => write!(f, "env_node {}", Operand(env)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifts_literals_once() {
        assert_eq!(
            AbstractExpr::from("foo"),
            AbstractExpr::Literal(Literal::Text("foo".into()))
        );
        assert_eq!(AbstractExpr::from(false), AbstractExpr::Literal(Literal::Bool(false)));
    }

    #[test]
    fn builds_lookups_with_recursive_default() {
        let expr = AbstractExpr::env().resolve_unique("foo");
        let AbstractExpr::EnvGet { recursive, resolve_unique, sequential, .. } = &expr else {
            panic!("expected a lookup");
        };
        assert_eq!(**recursive, AbstractExpr::from(true));
        assert!(*resolve_unique);
        assert!(!*sequential);

        let flat = expr.with_recursive(false);
        assert!(matches!(flat, AbstractExpr::EnvGet { recursive, .. } if *recursive == AbstractExpr::from(false)));
    }

    #[test]
    fn displays_text_form() {
        let expr = AbstractExpr::env()
            .orphan()
            .eval_in_env(AbstractExpr::env().get(AbstractExpr::self_node().field("name")));
        assert_eq!(expr.to_string(), "eval_in_env (orphan Env) (get Env Self.name)");
        assert_eq!(
            AbstractExpr::group_all([AbstractExpr::env(), AbstractExpr::empty_env()]).to_string(),
            "group [Env EmptyEnv]"
        );
        let flat = AbstractExpr::env().get_sequential("foo").with_recursive(false);
        assert_eq!(flat.to_string(), "recursive (get_sequential Env \"foo\") false");
    }
}
