//! Built-in operations of the property DSL.
//!
//! This table is what the text parser consults to know how many operands an
//! operation takes and which abstract expression it builds. The builder
//! methods on `AbstractExpr` are the programmatic equivalent.

use crate::ast::AbstractExpr;

/// Kind of builtin, used to build the abstract expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    Get,
    GetSequential,
    ResolveUnique,
    Recursive,
    EvalInEnv,
    Orphan,
    Group,
    IsVisibleFrom,
    EnvNode,
}

/// Metadata about a single builtin operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinDescriptor {
    /// Name of the operation in DSL text (e.g., `resolve_unique`).
    pub name: &'static str,
    pub arity: usize,
    pub kind: BuiltinKind,
    /// One-line description, shown by the CLI.
    pub summary: &'static str,
}

impl BuiltinDescriptor {
    /// Build the expression from exactly `arity` operands, in source order.
    /// `None` when the operands do not fit the operation.
    pub fn build(&self, args: Vec<AbstractExpr>) -> Option<AbstractExpr> {
        if args.len() != self.arity {
            return None;
        }
        let mut args = args.into_iter();
        let mut next = || args.next();
        let expr = match self.kind {
            BuiltinKind::Get => next()?.get(next()?),
            BuiltinKind::GetSequential => next()?.get_sequential(next()?),
            BuiltinKind::ResolveUnique => next()?.resolve_unique(next()?),
            BuiltinKind::Recursive => match next()? {
                lookup @ AbstractExpr::EnvGet { .. } => lookup.with_recursive(next()?),
                _ => return None,
            },
            BuiltinKind::EvalInEnv => next()?.eval_in_env(next()?),
            BuiltinKind::Orphan => next()?.orphan(),
            BuiltinKind::Group => next()?.env_group(),
            BuiltinKind::IsVisibleFrom => next()?.is_visible_from(next()?),
            BuiltinKind::EnvNode => next()?.env_node(),
        };
        Some(expr)
    }
}

/// The complete list of DSL operations.
pub const BUILTINS: &[BuiltinDescriptor] = &[
    BuiltinDescriptor {
        name: "get",
        arity: 2,
        kind: BuiltinKind::Get,
        summary: "get ENV KEY: all entries for KEY in ENV",
    },
    BuiltinDescriptor {
        name: "get_sequential",
        arity: 2,
        kind: BuiltinKind::GetSequential,
        summary: "get_sequential ENV KEY: entries for KEY established before Self",
    },
    BuiltinDescriptor {
        name: "resolve_unique",
        arity: 2,
        kind: BuiltinKind::ResolveUnique,
        summary: "resolve_unique ENV KEY: first entry for KEY in ENV",
    },
    BuiltinDescriptor {
        name: "recursive",
        arity: 2,
        kind: BuiltinKind::Recursive,
        summary: "recursive LOOKUP FLAG: whether LOOKUP also searches parent environments",
    },
    BuiltinDescriptor {
        name: "eval_in_env",
        arity: 2,
        kind: BuiltinKind::EvalInEnv,
        summary: "eval_in_env ENV EXPR: evaluate EXPR with ENV as the ambient environment",
    },
    BuiltinDescriptor {
        name: "orphan",
        arity: 1,
        kind: BuiltinKind::Orphan,
        summary: "orphan ENV: copy of ENV with no parent",
    },
    BuiltinDescriptor {
        name: "group",
        arity: 1,
        kind: BuiltinKind::Group,
        summary: "group [ENV...]: environment grouping all ENVs (empty: the empty environment)",
    },
    BuiltinDescriptor {
        name: "is_visible_from",
        arity: 2,
        kind: BuiltinKind::IsVisibleFrom,
        summary: "is_visible_from REFERENCED BASE: whether REFERENCED's unit is visible from BASE's",
    },
    BuiltinDescriptor {
        name: "env_node",
        arity: 1,
        kind: BuiltinKind::EnvNode,
        summary: "env_node ENV: node associated with ENV",
    },
];

/// Look up a builtin by its DSL name.
pub fn find_builtin(name: &str) -> Option<&'static BuiltinDescriptor> {
    BUILTINS.iter().find(|b| b.name == name)
}
