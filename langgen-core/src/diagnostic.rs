//! Diagnostics reported while compiling a language description.
//!
//! Every problem detected here is an authoring error in the language
//! description and is fatal to the current compilation: a `Diagnostic` is
//! wrapped into a `CoreError` and propagated up to the driver.

use std::fmt;

use serde::Serialize;

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub code: Option<&'static str>,
    pub span: Option<Span>,
    /// Construct being compiled when the problem was found, e.g.
    /// `property Example.prop` or `case rule "'.'"`.
    pub context: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            code: None,
            span: None,
            context: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(message)
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{level}")?;
        if let Some(code) = self.code {
            write!(f, "[{code}]")?;
        }
        if let Some(context) = &self.context {
            write!(f, " in {context}")?;
        }
        if let Some(span) = &self.span {
            write!(f, " at {}..{}", span.start, span.end)?;
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FileId;

    #[test]
    fn formats_code_context_and_span() {
        let diag = Diagnostic::error("bad key")
            .with_code("E0203")
            .with_context("property Example.prop")
            .with_span(Span::new(FileId(0), 4, 9));
        assert_eq!(
            diag.to_string(),
            "error[E0203] in property Example.prop at 4..9: bad key"
        );
    }

    #[test]
    fn warnings_are_not_errors() {
        assert!(!Diagnostic::warning("shadowed").is_error());
    }
}
