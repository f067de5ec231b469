//! Core of the langgen language front-end generator.
//!
//! Given a language description, this crate compiles its lexer specification
//! and its properties into intermediate forms and renders them to source
//! text. The pipeline is roughly:
//!
//!   description .toml
//!     -> lexer_spec          (token catalog + ordered rules)
//!     -> lexer / parser      (property bodies as abstract expressions)
//!     -> typecheck           (resolved, typed IR under env bindings)
//!     -> codegen / template  (generated text)
//!
//! Higher-level tools (the CLI) should depend on this crate rather than
//! reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod span;
pub mod diagnostic;
pub mod error;
pub mod names;

// ---------------------------------------------------------------------
// Lexer specifications
// ---------------------------------------------------------------------

pub mod matcher;
pub mod lexer_spec;

// ---------------------------------------------------------------------
// Property DSL: abstract trees, text lexing and parsing
// ---------------------------------------------------------------------

pub mod ast;
pub mod builtins;
pub mod lexer;
pub mod parser;

// ---------------------------------------------------------------------
// Semantic layers: types, construction, resolved IR
// ---------------------------------------------------------------------

pub mod types;
pub mod typecheck;
pub mod hir;

// ---------------------------------------------------------------------
// Back-end: rendering, descriptions and compiler orchestration
// ---------------------------------------------------------------------

pub mod codegen;
pub mod template;
pub mod description;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{CompilationArtifact, CompiledProperty, compile_language};
pub use description::{LanguageDescription, load_descriptions};
pub use error::CoreError;
pub use template::{Renderer, TextRenderer};
