//! Lowering of resolved expressions to target-language text.
//!
//! Each resolved node renders as a "pre" part (statements that must run
//! first) and an "expr" part (a pure expression). Nodes with a result
//! variable assign it in "pre" and render as the variable name.

use serde::{Deserialize, Serialize};

use crate::hir::{LiteralValue, PropertyIr, ResolvedExpr, ResolvedKind};
use crate::names::Name;
use crate::types::Type;

/// Statements to run before `render_expr(expr)` can be evaluated, one per
/// line.
pub fn render_pre(expr: &ResolvedExpr) -> String {
    let mut lines = Vec::new();
    collect_pre(expr, &mut lines);
    lines.join("\n")
}

fn collect_pre(expr: &ResolvedExpr, lines: &mut Vec<String>) {
    match &expr.kind {
        ResolvedKind::EnvBind { env, env_var, expr } => {
            // Keep the new environment alive while the dependent expression
            // is evaluated.
            collect_pre(env, lines);
            lines.push(format!("{} := {};", env_var.name, render_expr(env)));
            lines.push(format!("Inc_Ref ({});", env_var.name));
            collect_pre(expr, lines);
        }
        _ => {
            for child in expr.children() {
                collect_pre(child, lines);
            }
        }
    }
    if let Some(var) = &expr.result_var {
        lines.push(format!("{} := {};", var.name, render_value(expr)));
    }
}

/// The pure expression denoting the value of `expr`.
pub fn render_expr(expr: &ResolvedExpr) -> String {
    match &expr.result_var {
        Some(var) => var.name.clone(),
        None => render_value(expr),
    }
}

fn render_value(expr: &ResolvedExpr) -> String {
    match &expr.kind {
        ResolvedKind::Literal(LiteralValue::Bool(true)) => "True".to_string(),
        ResolvedKind::Literal(LiteralValue::Bool(false)) => "False".to_string(),
        ResolvedKind::Literal(LiteralValue::Int(i)) => i.to_string(),
        ResolvedKind::Literal(LiteralValue::Symbol(text)) => {
            format!("Find (Self.Unit.TDH.Symbols, {})", string_literal(text))
        }
        ResolvedKind::Variable { name } => name.clone(),
        ResolvedKind::GetSymbol(token) => format!("Get_Symbol ({})", render_expr(token)),
        ResolvedKind::FieldAccess { receiver, field } => {
            format!("{}.F_{}", render_expr(receiver), Name::from_lower(field))
        }
        ResolvedKind::EnvGet {
            env,
            key,
            from,
            recursive,
            resolve_unique,
        } => {
            let from = from
                .as_ref()
                .map(|f| format!(", From => {}", render_expr(f)))
                .unwrap_or_default();
            let get = format!(
                "AST_Envs.Get (Self => {}, Key => {}{from}, Recursive => {})",
                render_expr(env),
                render_expr(key),
                render_expr(recursive),
            );
            if *resolve_unique {
                format!("Get ({get}, 0)")
            } else {
                format!("Create ({get})")
            }
        }
        ResolvedKind::BuiltinCall { name, args } => {
            let args: Vec<String> = args.iter().map(render_expr).collect();
            format!("{name} ({})", args.join(", "))
        }
        ResolvedKind::EnvNode(env) => format!("{}.Node", render_expr(env)),
        ResolvedKind::Array {
            elements,
            element_type,
        } => {
            let array_type = array_type_name(element_type);
            let aggregate = match elements.as_slice() {
                [] => "(1 .. 0 => <>)".to_string(),
                [single] => format!("(1 => {})", render_expr(single)),
                many => {
                    let items: Vec<String> = many.iter().map(render_expr).collect();
                    format!("({})", items.join(", "))
                }
            };
            format!("{array_type}'{aggregate}")
        }
        ResolvedKind::EnvBind { expr, .. } => render_expr(expr),
    }
}

/// `Lexical_Env_Array` for an array of `AST_Envs.Lexical_Env`.
fn array_type_name(element_type: &Type) -> String {
    let access = Type::array_of(element_type.clone()).target_name();
    access
        .strip_suffix("_Access")
        .map(str::to_string)
        .unwrap_or(access)
}

fn string_literal(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// A local declaration in a rendered property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    pub type_name: String,
    pub ref_counted: bool,
}

/// Context of the `properties/property` template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyContext {
    pub function_name: String,
    pub owner: String,
    pub has_implicit_env: bool,
    pub return_type: String,
    /// The caller receives a new reference to the result.
    pub returns_ref_counted: bool,
    pub vars: Vec<VarDecl>,
    pub pre: String,
    pub expr: String,
    pub array_types: Vec<String>,
}

impl PropertyContext {
    pub fn new(prop: &PropertyIr) -> Self {
        let owner = Name::from_camel(&prop.owner);
        let function_name = owner.join(&Name::from_lower(&prop.name));
        PropertyContext {
            function_name: function_name.camel_with_underscores().to_string(),
            owner: prop.owner.clone(),
            has_implicit_env: prop.has_implicit_env,
            return_type: prop.body.ty.target_name(),
            returns_ref_counted: prop.body.ty.is_ref_counted(),
            vars: prop
                .vars
                .iter()
                .map(|v| VarDecl {
                    name: v.name.clone(),
                    type_name: v.ty.target_name(),
                    ref_counted: v.ref_counted,
                })
                .collect(),
            pre: render_pre(&prop.body),
            expr: render_expr(&prop.body),
            array_types: prop.array_types.iter().map(Type::target_name).collect(),
        }
    }
}
