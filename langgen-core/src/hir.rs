//! Resolved intermediate representation of property bodies.
//!
//! A `ResolvedExpr` is what the construction pass produces from an
//! `AbstractExpr`: every node carries its static type, every reference to the
//! ambient environment has been replaced by the variable bound at that point,
//! and temporaries needed by the generated code are declared as property
//! locals. The type of a node is fixed when it is built.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::Type;

/// A property-local temporary in the generated code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalVar {
    pub name: String,
    pub ty: Type,
    /// Whether the value must be released with `Dec_Ref` when the property
    /// exits.
    pub ref_counted: bool,
}

impl LocalVar {
    fn new(name: String, ty: Type) -> Self {
        let ref_counted = ty.is_ref_counted();
        LocalVar {
            name,
            ty,
            ref_counted,
        }
    }
}

/// The locals of one property, numbered per prefix in creation order.
#[derive(Debug, Clone, Default)]
pub struct LocalVars {
    vars: Vec<LocalVar>,
    counters: BTreeMap<String, usize>,
}

impl LocalVars {
    pub fn create(&mut self, prefix: &str, ty: Type) -> LocalVar {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let var = LocalVar::new(format!("{prefix}_{counter}"), ty);
        *counter += 1;
        self.vars.push(var.clone());
        var
    }

    pub fn into_vec(self) -> Vec<LocalVar> {
        self.vars
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LiteralValue {
    Bool(bool),
    Int(i64),
    /// Interned symbol for a text key.
    Symbol(String),
}

/// A typed node of the resolved tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedExpr {
    pub kind: ResolvedKind,
    pub ty: Type,
    /// When set, "pre" stores the value in this local and "expr" is its name.
    pub result_var: Option<LocalVar>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResolvedKind {
    Literal(LiteralValue),
    /// A name in the generated code: `Self`, the bound environment, or the
    /// empty environment.
    Variable { name: String },
    /// Token to symbol conversion.
    GetSymbol(Box<ResolvedExpr>),
    FieldAccess {
        receiver: Box<ResolvedExpr>,
        field: String,
    },
    EnvGet {
        env: Box<ResolvedExpr>,
        key: Box<ResolvedExpr>,
        /// Ordering boundary for sequential lookups.
        from: Option<Box<ResolvedExpr>>,
        recursive: Box<ResolvedExpr>,
        resolve_unique: bool,
    },
    BuiltinCall {
        name: String,
        args: Vec<ResolvedExpr>,
    },
    EnvNode(Box<ResolvedExpr>),
    Array {
        elements: Vec<ResolvedExpr>,
        element_type: Type,
    },
    /// Evaluation of `expr` with the value of `env` bound to `env_var`.
    EnvBind {
        env: Box<ResolvedExpr>,
        env_var: LocalVar,
        expr: Box<ResolvedExpr>,
    },
}

impl ResolvedExpr {
    pub fn new(kind: ResolvedKind, ty: Type) -> Self {
        ResolvedExpr {
            kind,
            ty,
            result_var: None,
        }
    }

    pub fn with_result_var(mut self, var: LocalVar) -> Self {
        self.result_var = Some(var);
        self
    }

    pub fn variable(name: impl Into<String>, ty: Type) -> Self {
        ResolvedExpr::new(ResolvedKind::Variable { name: name.into() }, ty)
    }

    /// Direct sub-expressions, in evaluation order.
    pub fn children(&self) -> Vec<&ResolvedExpr> {
        match &self.kind {
            ResolvedKind::Literal(_) | ResolvedKind::Variable { .. } => Vec::new(),
            ResolvedKind::GetSymbol(inner) | ResolvedKind::EnvNode(inner) => vec![inner.as_ref()],
            ResolvedKind::FieldAccess { receiver, .. } => vec![receiver.as_ref()],
            ResolvedKind::EnvGet {
                env,
                key,
                from,
                recursive,
                ..
            } => {
                let mut children = vec![env.as_ref(), key.as_ref()];
                children.extend(from.as_deref());
                children.push(recursive.as_ref());
                children
            }
            ResolvedKind::BuiltinCall { args, .. } => args.iter().collect(),
            ResolvedKind::Array { elements, .. } => elements.iter().collect(),
            ResolvedKind::EnvBind { env, expr, .. } => vec![env.as_ref(), expr.as_ref()],
        }
    }
}

/// Result of constructing one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyIr {
    pub owner: String,
    pub name: String,
    pub has_implicit_env: bool,
    pub body: ResolvedExpr,
    pub vars: Vec<LocalVar>,
    /// Array types the generated code needs declared.
    pub array_types: Vec<Type>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_locals_per_prefix() {
        let mut vars = LocalVars::default();
        let a = vars.create("New_Env", Type::LexicalEnv);
        let b = vars.create("Env_Get_Result", Type::EnvElement);
        let c = vars.create("New_Env", Type::LexicalEnv);
        assert_eq!(a.name, "New_Env_0");
        assert_eq!(b.name, "Env_Get_Result_0");
        assert_eq!(c.name, "New_Env_1");
        assert!(a.ref_counted);
        assert!(!b.ref_counted);
        assert_eq!(vars.into_vec().len(), 3);
    }

    #[test]
    fn lists_children_in_evaluation_order() {
        let env = ResolvedExpr::variable("Current_Env", Type::LexicalEnv);
        let key = ResolvedExpr::new(
            ResolvedKind::Literal(LiteralValue::Symbol("foo".into())),
            Type::Symbol,
        );
        let recursive = ResolvedExpr::new(ResolvedKind::Literal(LiteralValue::Bool(true)), Type::Bool);
        let get = ResolvedExpr::new(
            ResolvedKind::EnvGet {
                env: Box::new(env.clone()),
                key: Box::new(key.clone()),
                from: None,
                recursive: Box::new(recursive.clone()),
                resolve_unique: true,
            },
            Type::EnvElement,
        );
        assert_eq!(get.children(), vec![&env, &key, &recursive]);
    }
}
