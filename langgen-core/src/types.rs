//! Type lattice consulted by the construction pass.
//!
//! The set of types is closed: a few primitives used by lexical environment
//! operations, the node types declared by the language, and arrays of those.
//! Node types form a single-rooted hierarchy held by `TypeRegistry`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, check};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Bool,
    Int,
    Symbol,
    Token,
    LexicalEnv,
    /// Element yielded by a lexical environment lookup.
    EnvElement,
    /// A node type declared in the `TypeRegistry`.
    Node(String),
    Array(Box<Type>),
}

impl Type {
    pub fn array_of(element: Type) -> Type {
        Type::Array(Box::new(element))
    }

    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Values of these types are shared and released with `Dec_Ref`.
    pub fn is_ref_counted(&self) -> bool {
        matches!(self, Type::LexicalEnv | Type::Array(_))
    }

    /// Parse the textual form used in language descriptions: `Bool`, `Int`,
    /// `Symbol`, `Token`, `LexicalEnv`, `EnvElement`, `[T]`, or a node name.
    pub fn parse(text: &str) -> Type {
        let text = text.trim();
        if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            return Type::array_of(Type::parse(inner));
        }
        match text {
            "Bool" => Type::Bool,
            "Int" => Type::Int,
            "Symbol" => Type::Symbol,
            "Token" => Type::Token,
            "LexicalEnv" => Type::LexicalEnv,
            "EnvElement" => Type::EnvElement,
            other => Type::Node(other.to_string()),
        }
    }

    /// Name of the type in generated sources.
    pub fn target_name(&self) -> String {
        match self {
            Type::Bool => "Boolean".to_string(),
            Type::Int => "Integer".to_string(),
            Type::Symbol => "Symbol_Type".to_string(),
            Type::Token => "Token_Type".to_string(),
            Type::LexicalEnv => "AST_Envs.Lexical_Env".to_string(),
            Type::EnvElement => "AST_Envs.Env_Element".to_string(),
            Type::Node(name) => name.clone(),
            Type::Array(element) => {
                let element = element.target_name();
                let base = element.rsplit('.').next().unwrap_or(&element);
                format!("{base}_Array_Access")
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => f.write_str("Bool"),
            Type::Int => f.write_str("Int"),
            Type::Symbol => f.write_str("Symbol"),
            Type::Token => f.write_str("Token"),
            Type::LexicalEnv => f.write_str("LexicalEnv"),
            Type::EnvElement => f.write_str("EnvElement"),
            Type::Node(name) => f.write_str(name),
            Type::Array(element) => write!(f, "[{element}]"),
        }
    }
}

/// A node type: the owner of properties and fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeType {
    pub name: String,
    pub base: Option<String>,
    /// Fields in declaration order.
    pub fields: Vec<(String, Type)>,
}

/// Node type hierarchy of one language.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    nodes: Vec<NodeType>,
}

impl TypeRegistry {
    /// Build a registry, checking that the hierarchy has exactly one root,
    /// that every base and field type refers to a declared node, and that no
    /// node is declared twice.
    pub fn new(nodes: Vec<NodeType>) -> Result<Self, CoreError> {
        let registry = TypeRegistry { nodes };
        for (i, node) in registry.nodes.iter().enumerate() {
            check(
                registry.nodes[..i].iter().all(|n| n.name != node.name),
                || CoreError::type_error(format!("node type {} declared twice", node.name), "E0210"),
            )?;
            if let Some(base) = &node.base {
                check(registry.node(base).is_some(), || {
                    CoreError::type_error(
                        format!("base type {base} of node type {} is not declared", node.name),
                        "E0211",
                    )
                })?;
            }
            let mut depth = 0;
            let mut current = node.base.as_deref().and_then(|b| registry.node(b));
            while let Some(ancestor) = current {
                depth += 1;
                check(depth <= registry.nodes.len(), || {
                    CoreError::type_error(
                        format!("node type {} inherits from itself", node.name),
                        "E0215",
                    )
                })?;
                current = ancestor.base.as_deref().and_then(|b| registry.node(b));
            }
            for (field, ty) in &node.fields {
                registry.check_declared(ty).map_err(|e| {
                    e.in_context(format!("field {}.{}", node.name, field))
                })?;
            }
        }
        let roots = registry.nodes.iter().filter(|n| n.base.is_none()).count();
        check(registry.nodes.is_empty() || roots == 1, || {
            CoreError::type_error(
                format!("node hierarchy must have exactly one root, found {roots}"),
                "E0212",
            )
        })?;
        Ok(registry)
    }

    pub fn node(&self, name: &str) -> Option<&NodeType> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// The root of the node hierarchy.
    pub fn root_node(&self) -> Result<Type, CoreError> {
        self.nodes
            .iter()
            .find(|n| n.base.is_none())
            .map(|n| Type::Node(n.name.clone()))
            .ok_or_else(|| CoreError::type_error("no root node type is declared", "E0213"))
    }

    /// Reject node types that are not part of the hierarchy.
    pub fn check_declared(&self, ty: &Type) -> Result<(), CoreError> {
        match ty {
            Type::Node(name) => check(self.node(name).is_some(), || {
                CoreError::type_error(format!("unknown node type {name}"), "E0214")
            }),
            Type::Array(element) => self.check_declared(element),
            _ => Ok(()),
        }
    }

    /// Look up a field on a node type or on one of its ancestors.
    pub fn field_type(&self, node: &str, field: &str) -> Option<&Type> {
        let mut current = self.node(node);
        while let Some(n) = current {
            if let Some((_, ty)) = n.fields.iter().find(|(f, _)| f == field) {
                return Some(ty);
            }
            current = n.base.as_deref().and_then(|b| self.node(b));
        }
        None
    }

    fn is_ancestor(&self, ancestor: &str, node: &str) -> bool {
        let mut current = self.node(node);
        while let Some(n) = current {
            if n.name == ancestor {
                return true;
            }
            current = n.base.as_deref().and_then(|b| self.node(b));
        }
        false
    }

    /// Check whether `left` is a subtype of `right`.
    pub fn is_subtype(&self, left: &Type, right: &Type) -> SubtypeResult {
        use SubtypeResult::*;

        if left == right {
            return Equal;
        }
        match (left, right) {
            (Type::Node(l), Type::Node(r)) if self.is_ancestor(r, l) => Strict,
            // Arrays are invariant.
            _ => NotSubtype,
        }
    }

    /// Least common supertype of two types, used to type array literals.
    pub fn least_common_supertype(&self, a: &Type, b: &Type) -> Option<Type> {
        if self.is_subtype(a, b) != SubtypeResult::NotSubtype {
            return Some(b.clone());
        }
        if self.is_subtype(b, a) != SubtypeResult::NotSubtype {
            return Some(a.clone());
        }
        match (a, b) {
            (Type::Node(l), Type::Node(_)) => {
                let mut current = self.node(l).and_then(|n| n.base.as_deref());
                while let Some(candidate) = current {
                    let candidate_ty = Type::Node(candidate.to_string());
                    if self.is_subtype(b, &candidate_ty) != SubtypeResult::NotSubtype {
                        return Some(candidate_ty);
                    }
                    current = self.node(candidate).and_then(|n| n.base.as_deref());
                }
                None
            }
            _ => None,
        }
    }
}

/// Result of a subtyping check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtypeResult {
    /// Left is a strict subtype of right.
    Strict,
    /// Left and right are equal types.
    Equal,
    /// Left is not a subtype of right.
    NotSubtype,
}
