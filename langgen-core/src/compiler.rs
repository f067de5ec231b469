use serde::Serialize;

use crate::description::LanguageDescription;
use crate::diagnostic::Diagnostic;
use crate::error::CoreError;
use crate::hir::PropertyIr;
use crate::lexer_spec::LexerIr;
use crate::template::{Renderer, render_lexer, render_property};
use crate::typecheck::construct_property;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledProperty {
    pub ir: PropertyIr,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilationArtifact {
    pub language: String,
    pub lexer: LexerIr,
    pub lexer_text: String,
    pub properties: Vec<CompiledProperty>,
    /// Non-fatal findings, in the order they were made.
    pub warnings: Vec<Diagnostic>,
}

/// Compile the lexer and every property of `description`.
///
/// Properties are constructed one after the other; the first error aborts
/// the whole compilation.
pub fn compile_language(
    description: &LanguageDescription,
    renderer: &dyn Renderer,
) -> Result<CompilationArtifact, CoreError> {
    let registry = description.registry()?;
    let lexer = description.lexer()?;
    let lexer_ir = lexer.emit()?;
    let lexer_text = render_lexer(renderer, &lexer_ir)?;

    let mut properties = Vec::with_capacity(description.properties.len());
    for prop in description.properties()? {
        let ir = construct_property(&registry, &prop)?;
        let text = render_property(renderer, &ir)?;
        properties.push(CompiledProperty { ir, text });
    }

    Ok(CompilationArtifact {
        language: description.name.clone(),
        lexer: lexer_ir,
        lexer_text,
        properties,
        warnings: lexer.warnings().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer_spec::{Lexer, LexerConfig};
    use crate::matcher::{Matcher, TokenDecl};
    use crate::template::TextRenderer;
    use crate::types::Type;

    #[test]
    fn places_user_rules_after_implicit_ones() {
        let mut lexer =
            Lexer::new(vec![TokenDecl::with_text("Number")], LexerConfig::new("Foo")).expect("lexer");
        lexer
            .add_patterns([("digit", "[0-9]"), ("integer", "{digit}(_?{digit})*")])
            .expect("patterns");
        let number = lexer.token("Number").expect("token");
        lexer
            .add_rules([(Matcher::pattern("{integer}"), number)])
            .expect("rules");

        let ir = lexer.emit().expect("emit");
        let matchers: Vec<&str> = ir.rules.iter().map(|r| r.matcher.as_str()).collect();
        assert_eq!(matchers, vec!["<<EOF>>", "on_failure", "{integer}"]);
        let patterns: Vec<&str> = ir.patterns.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(patterns, vec!["digit", "integer"]);

        let text = render_lexer(&TextRenderer, &ir).expect("render");
        assert!(text.contains("define {\n    digit [0-9]\n    integer {digit}(_?{digit})*\n}"));
        assert!(text.contains("    {integer} => FOO_NUMBER(Lexeme);\n"));
    }

    const CALC: &str = r#"
name = "Calc"

[[tokens]]
name = "Number"

[[tokens]]
name = "Plus"
retention = "discard"

[[patterns]]
name = "digit"
pattern = "[0-9]"

[[patterns]]
name = "integer"
pattern = "{digit}(_?{digit})*"

[[rules]]
named = "integer"
token = "Number"

[[rules]]
literal = "+"
token = "Plus"

[[rules]]
literal = "+"
token = "Number"

[[nodes]]
name = "CalcNode"

[[properties]]
owner = "CalcNode"
name = "p_parent_env"
expr = "eval_in_env (orphan EmptyEnv) (group [Env EmptyEnv])"

[[properties]]
owner = "CalcNode"
name = "p_items"
implicit_env = true
type = "[EnvElement]"
expr = "get Env \"items\""
"#;

    #[test]
    fn compiles_a_language_description() {
        let desc = LanguageDescription::from_toml(CALC, "calc.toml").expect("description");
        let artifact = compile_language(&desc, &TextRenderer).expect("compile");

        assert_eq!(artifact.language, "Calc");
        assert_eq!(artifact.lexer.tokens.len(), 4);
        assert!(artifact.lexer_text.contains("    \"+\" => CALC_PLUS;\n"));
        assert_eq!(artifact.warnings.len(), 1);
        assert_eq!(artifact.warnings[0].code, Some("E0111"));

        let names: Vec<&str> = artifact.properties.iter().map(|p| p.ir.name.as_str()).collect();
        assert_eq!(names, vec!["p_parent_env", "p_items"]);
        let parent = &artifact.properties[0];
        assert_eq!(parent.ir.body.ty, Type::LexicalEnv);
        assert!(parent.text.contains("Inc_Ref (New_Env_0);"));
        assert!(parent.text.contains("   Property_Result := Group_Env_0;\n   Inc_Ref (Property_Result);\n"));
        assert!(parent.text.contains("Group_Env_0 := Group (Lexical_Env_Array'(New_Env_0, AST_Envs.Empty_Env));"));
        let items = &artifact.properties[1];
        assert_eq!(items.ir.array_types, vec![Type::array_of(Type::EnvElement)]);

        let json = serde_json::to_value(&artifact).expect("json");
        assert_eq!(json["properties"][1]["ir"]["name"], "p_items");
    }

    #[test]
    fn first_error_aborts_compilation() {
        let text = CALC.replace("name = \"p_parent_env\"", "name = \"p_parent_env\"\ntype = \"Bool\"");
        let desc = LanguageDescription::from_toml(&text, "calc.toml").expect("description");
        let err = compile_language(&desc, &TextRenderer).unwrap_err();
        let diag = err.diagnostic().expect("diagnostic");
        assert_eq!(diag.context.as_deref(), Some("property CalcNode.p_parent_env"));
        assert!(diag.message.contains("expected type Bool, got LexicalEnv"));
    }
}
