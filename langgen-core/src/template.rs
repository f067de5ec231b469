//! Rendering of the lexer and property IRs to source text.
//!
//! The core never inspects generated text: it hands a template id and a JSON
//! context of named values to a `Renderer`. `TextRenderer` is the built-in
//! implementation and knows the templates below.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::codegen::PropertyContext;
use crate::error::CoreError;
use crate::hir::PropertyIr;
use crate::lexer_spec::{ActionEntry, AltEntry, LexerIr, NamedPattern, TokenEntry};

pub const LEXER_SPEC_TEMPLATE: &str = "lexer/quex_lexer_spec";
pub const CASE_ACTION_TEMPLATE: &str = "lexer/case_action";
pub const PROPERTY_TEMPLATE: &str = "properties/property";

pub trait Renderer {
    fn render(&self, template: &str, context: &Value) -> Result<String, CoreError>;
}

/// Render a lexer specification, rendering each case action first.
pub fn render_lexer(renderer: &dyn Renderer, ir: &LexerIr) -> Result<String, CoreError> {
    let mut rules = Vec::with_capacity(ir.rules.len());
    for rule in &ir.rules {
        let action = match &rule.action {
            ActionEntry::Send { token, with_lexeme } => send_action(token, *with_lexeme),
            ActionEntry::Ignore => "{ }".to_string(),
            ActionEntry::Case {
                max_match_len,
                alts,
                default,
            } => renderer.render(
                CASE_ACTION_TEMPLATE,
                &json!({
                    "max_match_len": max_match_len,
                    "alts": alts,
                    "last_alt": default,
                }),
            )?,
        };
        rules.push(json!({ "matcher": rule.matcher, "action": action }));
    }
    renderer.render(
        LEXER_SPEC_TEMPLATE,
        &json!({
            "lang_name": ir.lang_name,
            "token_prefix": ir.token_prefix,
            "tokens": ir.tokens,
            "patterns": ir.patterns,
            "rules": rules,
        }),
    )
}

pub fn render_property(renderer: &dyn Renderer, prop: &PropertyIr) -> Result<String, CoreError> {
    let context = serde_json::to_value(PropertyContext::new(prop))
        .map_err(|e| CoreError::Render(e.to_string()))?;
    renderer.render(PROPERTY_TEMPLATE, &context)
}

fn send_action(token: &str, with_lexeme: bool) -> String {
    if with_lexeme {
        format!("=> {token}(Lexeme);")
    } else {
        format!("=> {token};")
    }
}

/// Built-in renderer producing Quex lexer specifications and Ada property
/// bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl Renderer for TextRenderer {
    fn render(&self, template: &str, context: &Value) -> Result<String, CoreError> {
        match template {
            LEXER_SPEC_TEMPLATE => Ok(lexer_spec(
                &field::<String>(context, "token_prefix")?,
                &field::<Vec<TokenEntry>>(context, "tokens")?,
                &field::<Vec<NamedPattern>>(context, "patterns")?,
                &field::<Vec<RenderedRule>>(context, "rules")?,
            )),
            CASE_ACTION_TEMPLATE => Ok(case_action(
                field(context, "max_match_len")?,
                &field::<Vec<AltEntry>>(context, "alts")?,
                &field(context, "last_alt")?,
            )),
            PROPERTY_TEMPLATE => {
                let ctx: PropertyContext = serde_json::from_value(context.clone())
                    .map_err(|e| CoreError::Render(format!("{template}: {e}")))?;
                Ok(property(&ctx))
            }
            other => Err(CoreError::Render(format!("unknown template {other}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RenderedRule {
    matcher: String,
    action: String,
}

fn field<T: DeserializeOwned>(context: &Value, name: &str) -> Result<T, CoreError> {
    let value = context
        .get(name)
        .ok_or_else(|| CoreError::Render(format!("missing template value {name}")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| CoreError::Render(format!("invalid template value {name}: {e}")))
}

fn lexer_spec(
    token_prefix: &str,
    tokens: &[TokenEntry],
    patterns: &[NamedPattern],
    rules: &[RenderedRule],
) -> String {
    let mut out = String::new();
    out.push_str(&format!("token_prefix {token_prefix}\n\n"));

    out.push_str("token {\n");
    for token in tokens {
        out.push_str(&format!("    {};\n", token.name.to_ascii_uppercase()));
    }
    out.push_str("}\n\n");

    out.push_str("define {\n");
    for pattern in patterns {
        out.push_str(&format!("    {} {}\n", pattern.name, pattern.pattern));
    }
    out.push_str("}\n\n");

    out.push_str("mode Default_Mode {\n");
    for rule in rules {
        let action = rule.action.replace('\n', "\n    ");
        out.push_str(&format!("    {} {}\n", rule.matcher, action));
    }
    out.push_str("}\n");
    out
}

fn case_action(max_match_len: usize, alts: &[AltEntry], last_alt: &AltEntry) -> String {
    let mut out = String::from("{\n");
    for alt in alts {
        let cond: Vec<String> = alt
            .prev_tokens
            .iter()
            .map(|t| format!("last_token_id == {t}"))
            .collect();
        out.push_str(&format!("    if ({}) {{\n", cond.join(" || ")));
        push_send(&mut out, "        ", max_match_len, alt);
        out.push_str("    }\n");
    }
    push_send(&mut out, "    ", max_match_len, last_alt);
    out.push('}');
    out
}

fn push_send(out: &mut String, indent: &str, max_match_len: usize, alt: &AltEntry) {
    let rewind = max_match_len.saturating_sub(alt.match_size);
    if rewind > 0 {
        out.push_str(&format!("{indent}self_seek_backward({rewind});\n"));
    }
    out.push_str(&format!("{indent}self_send({});\n", alt.send));
    out.push_str(&format!("{indent}RETURN;\n"));
}

fn property(ctx: &PropertyContext) -> String {
    let mut params = format!("(Node : access {}_Type'Class", ctx.owner);
    if ctx.has_implicit_env {
        params.push_str("; Current_Env : AST_Envs.Lexical_Env");
    }
    params.push(')');

    let mut out = String::new();
    out.push_str(&format!("function {}\n", ctx.function_name));
    out.push_str(&format!("  {params}\n"));
    out.push_str(&format!("   return {}\n", ctx.return_type));
    out.push_str("is\n");
    out.push_str(&format!("   Self : {0} := {0} (Node);\n", ctx.owner));
    for var in &ctx.vars {
        out.push_str(&format!("   {} : {};\n", var.name, var.type_name));
    }
    out.push_str(&format!("   Property_Result : {};\n", ctx.return_type));
    out.push_str("begin\n");
    for line in ctx.pre.lines().filter(|l| !l.is_empty()) {
        out.push_str(&format!("   {line}\n"));
    }
    out.push_str(&format!("   Property_Result := {};\n", ctx.expr));
    if ctx.returns_ref_counted {
        out.push_str("   Inc_Ref (Property_Result);\n");
    }
    push_releases(&mut out, "   ", ctx);
    out.push_str("   return Property_Result;\n");
    if ctx.vars.iter().any(|v| v.ref_counted) {
        out.push_str("exception\n");
        out.push_str("   when Property_Error =>\n");
        push_releases(&mut out, "      ", ctx);
        out.push_str("      raise;\n");
    }
    out.push_str(&format!("end {};\n", ctx.function_name));
    out
}

fn push_releases(out: &mut String, indent: &str, ctx: &PropertyContext) {
    for var in ctx.vars.iter().filter(|v| v.ref_counted) {
        out.push_str(&format!("{indent}Dec_Ref ({});\n", var.name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AbstractExpr;
    use crate::lexer_spec::{Lexer, LexerConfig};
    use crate::matcher::{Alt, Matcher, TokenDecl};
    use crate::typecheck::{PropertyDef, construct_property};
    use crate::types::{NodeType, TypeRegistry};

    #[test]
    fn renders_lexer_with_case_rule() {
        let mut lexer = Lexer::new(
            vec![
                TokenDecl::with_symbol("Identifier"),
                TokenDecl::with_text("Tick"),
                TokenDecl::with_text("Char"),
            ],
            LexerConfig::new("Foo"),
        )
        .expect("lexer");
        let ident = lexer.token("identifier").expect("token");
        let tick = lexer.token("Tick").expect("token");
        let chr = lexer.token("Char").expect("token");
        let case = lexer
            .case_rule(
                Matcher::pattern("'.'"),
                vec![Alt::when([ident], tick, 1), Alt::otherwise(chr, 3)],
            )
            .expect("case rule");
        lexer.add_rules([case]).expect("rules");

        let text = render_lexer(&TextRenderer, &lexer.emit().expect("emit")).expect("render");
        assert!(text.starts_with("token_prefix FOO_\n"));
        assert!(text.contains("    TERMINATION;\n    LEXING_FAILURE;\n    IDENTIFIER;\n"));
        assert!(text.contains("    <<EOF>> => FOO_TERMINATION(Lexeme);\n"));
        assert!(text.contains("if (last_token_id == FOO_IDENTIFIER) {"));
        assert!(text.contains("self_seek_backward(2);\n            self_send(FOO_TICK);"));
        assert!(!text.contains("self_seek_backward(0)"));
    }

    #[test]
    fn releases_each_ref_counted_local_on_both_paths() {
        let registry = TypeRegistry::new(vec![NodeType {
            name: "FooNode".into(),
            base: None,
            fields: vec![],
        }])
        .expect("registry");
        let body = AbstractExpr::env()
            .orphan()
            .eval_in_env(AbstractExpr::env().resolve_unique("x"));
        let prop = construct_property(
            &registry,
            &PropertyDef::new("FooNode", "p_first", body).with_implicit_env(),
        )
        .expect("construct");

        let text = render_property(&TextRenderer, &prop).expect("render");
        assert_eq!(text.matches("Dec_Ref (New_Env_0);").count(), 2);
        assert_eq!(text.matches("Dec_Ref (Orphan_Env_0);").count(), 2);
        assert_eq!(text.matches("Dec_Ref (Env_Get_Result_0);").count(), 0);
        assert_eq!(text.matches("Inc_Ref (New_Env_0);").count(), 1);
        assert!(text.contains("(Node : access FooNode_Type'Class; Current_Env : AST_Envs.Lexical_Env)"));
        assert!(text.contains("   Property_Result := Env_Get_Result_0;\n"));
        assert!(text.ends_with("end Foo_Node_P_First;\n"));
    }

    #[test]
    fn retains_returned_environment_before_releasing_locals() {
        let registry = TypeRegistry::new(vec![NodeType {
            name: "FooNode".into(),
            base: None,
            fields: vec![],
        }])
        .expect("registry");
        let prop = construct_property(
            &registry,
            &PropertyDef::new("FooNode", "p_parent", AbstractExpr::env().orphan()).with_implicit_env(),
        )
        .expect("construct");

        let text = render_property(&TextRenderer, &prop).expect("render");
        let assign = text.find("Property_Result := Orphan_Env_0;").expect("assignment");
        let retain = text.find("Inc_Ref (Property_Result);").expect("retain");
        let release = text.find("Dec_Ref (Orphan_Env_0);").expect("release");
        assert!(assign < retain && retain < release);
        assert_eq!(text.matches("Inc_Ref (Property_Result);").count(), 1);

        let rebound = AbstractExpr::env().orphan().eval_in_env(AbstractExpr::env());
        let prop = construct_property(
            &registry,
            &PropertyDef::new("FooNode", "p_rebound", rebound).with_implicit_env(),
        )
        .expect("construct");
        let text = render_property(&TextRenderer, &prop).expect("render");
        assert_eq!(text.matches("Inc_Ref (New_Env_0);").count(), 1);
        assert_eq!(text.matches("Inc_Ref (Property_Result);").count(), 1);
        assert_eq!(text.matches("Dec_Ref (New_Env_0);").count(), 2);
    }

    #[test]
    fn leaves_non_shared_results_alone() {
        let registry = TypeRegistry::new(vec![NodeType {
            name: "FooNode".into(),
            base: None,
            fields: vec![],
        }])
        .expect("registry");
        let prop = construct_property(
            &registry,
            &PropertyDef::new("FooNode", "p_first", AbstractExpr::env().resolve_unique("x"))
                .with_implicit_env(),
        )
        .expect("construct");
        let text = render_property(&TextRenderer, &prop).expect("render");
        assert!(!text.contains("Inc_Ref (Property_Result);"));
    }

    #[test]
    fn rejects_unknown_templates_and_bad_contexts() {
        let err = TextRenderer.render("nope", &json!({})).unwrap_err();
        assert!(matches!(err, CoreError::Render(msg) if msg.contains("unknown template")));
        let err = TextRenderer
            .render(CASE_ACTION_TEMPLATE, &json!({ "alts": [] }))
            .unwrap_err();
        assert!(matches!(err, CoreError::Render(msg) if msg.contains("max_match_len")));
    }
}
