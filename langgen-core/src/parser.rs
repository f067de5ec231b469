//! Parser for the prefix-notation property DSL.
//!
//! ```text
//! expr    := primary ('.' IDENT)*
//! primary := INT | STRING | BOOL | '(' expr ')' | '[' expr* ']'
//!          | 'Self' | 'Env' | 'EmptyEnv' | OPERATION expr{arity}
//! ```

use crate::ast::{AbstractExpr, MAX_NESTING_DEPTH};
use crate::builtins::find_builtin;
use crate::error::CoreError;
use crate::lexer::{Token, TokenKind, lex};
use crate::span::FileId;

pub fn parse(file_id: FileId, source: &str) -> Result<AbstractExpr, CoreError> {
    let result = lex(file_id, source);
    if let Some(diag) = result.diagnostics.into_iter().find(|d| d.is_error()) {
        return Err(CoreError::LexError {
            position: diag.span.map_or(0, |s| s.start as usize),
            message: diag.message,
        });
    }
    let mut parser = Parser {
        source,
        tokens: &result.tokens,
        position: 0,
        depth: 0,
    };
    let expr = parser.parse_expr()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(parser.error(trailing, "unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser<'src> {
    source: &'src str,
    tokens: &'src [Token],
    position: usize,
    depth: usize,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> &'src Token {
        // The token stream always ends with Eof, which is never consumed.
        let last = self.tokens.len() - 1;
        &self.tokens[self.position.min(last)]
    }

    fn next(&mut self) -> &'src Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    fn error(&self, token: &Token, message: &str) -> CoreError {
        CoreError::ParseError(format!("{message} at byte {}", token.span.start))
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<&'src Token, CoreError> {
        let token = self.next();
        if token.kind == kind {
            Ok(token)
        } else {
            Err(self.error(token, &format!("expected {what}")))
        }
    }

    fn parse_expr(&mut self) -> Result<AbstractExpr, CoreError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error(self.peek(), "expression nested too deeply"));
        }
        self.depth += 1;
        let expr = self.parse_postfix();
        self.depth -= 1;
        expr
    }

    fn parse_postfix(&mut self) -> Result<AbstractExpr, CoreError> {
        let mut expr = self.parse_primary()?;
        while self.peek().kind == TokenKind::Dot {
            self.next();
            let field = self.expect(TokenKind::Ident, "a field name after '.'")?;
            expr = expr.field(field.text(self.source));
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<AbstractExpr, CoreError> {
        let token = self.next();
        match token.kind {
            TokenKind::IntLiteral => {
                let digits: String = token.text(self.source).chars().filter(|c| *c != '_').collect();
                let value = digits
                    .parse::<i64>()
                    .map_err(|_| self.error(token, "integer literal out of range"))?;
                Ok(AbstractExpr::from(value))
            }
            TokenKind::StringLiteral => Ok(AbstractExpr::from(unescape(token.text(self.source)))),
            TokenKind::BoolLiteral => Ok(AbstractExpr::from(token.text(self.source) == "true")),
            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                let mut elements = Vec::new();
                while !matches!(self.peek().kind, TokenKind::RBracket | TokenKind::Eof) {
                    elements.push(self.parse_expr()?);
                }
                self.expect(TokenKind::RBracket, "']'")?;
                Ok(AbstractExpr::Array(elements))
            }
            TokenKind::Ident => self.parse_name(token),
            TokenKind::Eof => Err(self.error(token, "unexpected end of input")),
            TokenKind::RParen | TokenKind::RBracket | TokenKind::Dot => {
                Err(self.error(token, "expected an expression"))
            }
        }
    }

    fn parse_name(&mut self, token: &Token) -> Result<AbstractExpr, CoreError> {
        let name = token.text(self.source);
        match name {
            "Self" => Ok(AbstractExpr::SelfNode),
            "Env" => Ok(AbstractExpr::Env),
            "EmptyEnv" => Ok(AbstractExpr::EmptyEnv),
            _ => {
                let builtin = find_builtin(name)
                    .ok_or_else(|| self.error(token, &format!("unknown operation '{name}'")))?;
                let mut args = Vec::with_capacity(builtin.arity);
                for _ in 0..builtin.arity {
                    args.push(self.parse_expr()?);
                }
                builtin
                    .build(args)
                    .ok_or_else(|| self.error(token, &format!("invalid operands for '{name}'")))
            }
        }
    }
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
