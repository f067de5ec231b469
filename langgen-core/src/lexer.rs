//! Lexer for the property DSL text.

use crate::diagnostic::Diagnostic;
use crate::span::{FileId, Span};

/// Kind of a token produced by the lexer.
///
/// Operation names, `Self`, `Env` and `EmptyEnv` are all identifiers; the
/// parser gives them meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Special
    Eof,

    // Identifiers and literals
    Ident,
    IntLiteral,
    StringLiteral,
    BoolLiteral, // true / false

    // Punctuation
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Dot,      // .
}

/// A single token with its kind and span.
///
/// `text_start` / `text_end` are byte offsets into the source; for string
/// literals they delimit the contents without the quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text_start: u32,
    pub text_end: u32,
}

impl Token {
    pub fn text<'src>(&self, source: &'src str) -> &'src str {
        &source[self.text_start as usize..self.text_end as usize]
    }
}

/// Result of lexing a source string.
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lex a source string into tokens, always ending with an `Eof` token.
pub fn lex(file_id: FileId, source: &str) -> LexResult {
    let mut lexer = Lexer {
        file_id,
        source,
        chars: source.as_bytes(),
        len: source.len(),
        index: 0,
        diagnostics: Vec::new(),
    };
    lexer.run()
}

struct Lexer<'src> {
    file_id: FileId,
    source: &'src str,
    chars: &'src [u8],
    len: usize,
    index: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    fn run(&mut self) -> LexResult {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) {
                self.consume_char();
                continue;
            }

            let start = self.index as u32;
            let token = match ch {
                b'(' => {
                    self.consume_char();
                    self.simple_token(TokenKind::LParen, start)
                }
                b')' => {
                    self.consume_char();
                    self.simple_token(TokenKind::RParen, start)
                }
                b'[' => {
                    self.consume_char();
                    self.simple_token(TokenKind::LBracket, start)
                }
                b']' => {
                    self.consume_char();
                    self.simple_token(TokenKind::RBracket, start)
                }
                b'.' => {
                    self.consume_char();
                    self.simple_token(TokenKind::Dot, start)
                }
                b'"' => self.lex_string(start),
                b'-' if self.peek_next().is_some_and(|c| c.is_ascii_digit()) => {
                    self.consume_char();
                    self.lex_number(start)
                }
                b'0'..=b'9' => self.lex_number(start),
                _ => {
                    if is_ident_start(ch) {
                        self.lex_ident_or_keyword(start)
                    } else {
                        self.consume_char();
                        self.unexpected_char(start)
                    }
                }
            };

            if let Some(tok) = token {
                tokens.push(tok);
            }
        }

        let eof_span = Span::new(self.file_id, self.len as u32, self.len as u32);
        tokens.push(Token {
            kind: TokenKind::Eof,
            span: eof_span,
            text_start: self.len as u32,
            text_end: self.len as u32,
        });

        LexResult {
            tokens,
            diagnostics: std::mem::take(&mut self.diagnostics),
        }
    }

    fn simple_token(&self, kind: TokenKind, start: u32) -> Option<Token> {
        let end = self.index as u32;
        Some(Token {
            kind,
            span: Span::new(self.file_id, start, end),
            text_start: start,
            text_end: end,
        })
    }

    fn unexpected_char(&mut self, start: u32) -> Option<Token> {
        // Skip the rest of a multi-byte character so that later slicing stays
        // on char boundaries.
        while self.index < self.len && !self.source.is_char_boundary(self.index) {
            self.index += 1;
        }
        let span = Span::new(self.file_id, start, self.index as u32);
        let diag = Diagnostic::error("unexpected character")
            .with_code("E0001")
            .with_span(span);
        self.diagnostics.push(diag);
        None
    }

    fn lex_string(&mut self, start: u32) -> Option<Token> {
        // Consume the opening quote
        self.consume_char();

        let content_start = self.index;
        while let Some(ch) = self.peek_char() {
            match ch {
                b'"' => {
                    let content_end = self.index;
                    self.consume_char(); // closing quote
                    let span = Span::new(self.file_id, start, self.index as u32);
                    return Some(Token {
                        kind: TokenKind::StringLiteral,
                        span,
                        text_start: content_start as u32,
                        text_end: content_end as u32,
                    });
                }
                b'\\' => {
                    // Skip over escape sequence: backslash + next char (if any)
                    self.consume_char();
                    if self.peek_char().is_some() {
                        self.consume_char();
                    }
                }
                _ => {
                    self.consume_char();
                }
            }
        }

        let span = Span::new(self.file_id, start, self.index as u32);
        let diag = Diagnostic::error("unterminated string literal")
            .with_code("E0002")
            .with_span(span);
        self.diagnostics.push(diag);
        None
    }

    fn lex_number(&mut self, start: u32) -> Option<Token> {
        while let Some(ch) = self.peek_char() {
            if matches!(ch, b'0'..=b'9' | b'_') {
                self.consume_char();
            } else {
                break;
            }
        }

        let end = self.index as u32;
        Some(Token {
            kind: TokenKind::IntLiteral,
            span: Span::new(self.file_id, start, end),
            text_start: start,
            text_end: end,
        })
    }

    fn lex_ident_or_keyword(&mut self, start: u32) -> Option<Token> {
        while let Some(ch) = self.peek_char() {
            if is_ident_continue(ch) {
                self.consume_char();
            } else {
                break;
            }
        }

        let end = self.index as u32;
        let text = &self.source[start as usize..end as usize];
        let kind = match text {
            "true" | "false" => TokenKind::BoolLiteral,
            _ => TokenKind::Ident,
        };

        Some(Token {
            kind,
            span: Span::new(self.file_id, start, end),
            text_start: start,
            text_end: end,
        })
    }

    fn peek_char(&self) -> Option<u8> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.chars.get(self.index + 1).copied()
    }

    fn consume_char(&mut self) {
        if self.index < self.len {
            self.index += 1;
        }
    }
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(FileId(0), source).tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_property_text() {
        use TokenKind::*;
        assert_eq!(
            kinds("eval_in_env (orphan Env) [Self.name \"foo\" true -3]"),
            vec![
                Ident, LParen, Ident, Ident, RParen, LBracket, Ident, Dot, Ident,
                StringLiteral, BoolLiteral, IntLiteral, RBracket, Eof
            ]
        );
    }

    #[test]
    fn string_tokens_exclude_quotes() {
        let source = "get Env \"foo\"";
        let result = lex(FileId(0), source);
        assert_eq!(result.tokens[2].text(source), "foo");
        assert_eq!(result.tokens[2].span.start, 8);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn reports_bad_input() {
        let result = lex(FileId(0), "get Env % \"open");
        let codes: Vec<_> = result.diagnostics.iter().filter_map(|d| d.code).collect();
        assert_eq!(codes, vec!["E0001", "E0002"]);
        assert_eq!(result.tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    }
}
