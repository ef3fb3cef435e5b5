//! Tokens to AST.
//!
//! Statements are parsed one at a time. When a statement is malformed the
//! parser records a line-tagged diagnostic, skips to the next statement
//! keyword, and keeps going, so one call reports every broken statement
//! up to the error cap.
use crate::ast::{Expr, Program};
use crate::error::Diagnostic;
use crate::lexer::{self, Spanned, Token};

mod definitions;
mod expressions;
mod policy;

pub use crate::options::DEFAULT_MAX_ERRORS;

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    /// Token `n` positions ahead of the current one.
    fn peek_at(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)].token
    }

    fn cur_line(&self) -> u32 {
        self.cur().line
    }

    fn advance(&mut self) -> &Spanned {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), Diagnostic> {
        if self.peek() == &token {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn take_ident(&mut self, what: &str) -> Result<String, Diagnostic> {
        if let Token::Ident(w) = self.peek().clone() {
            self.advance();
            Ok(w)
        } else {
            Err(self.unexpected(what))
        }
    }

    fn err(&self, msg: impl Into<String>) -> Diagnostic {
        Diagnostic::syntax(self.cur_line(), msg)
    }

    fn unexpected(&self, expected: &str) -> Diagnostic {
        match self.peek() {
            Token::Eof => self.err(format!("unexpected end of input, expected {}", expected)),
            tok => self.err(format!(
                "unexpected token '{}' (type: {}), expected {}",
                tok.text(),
                tok.kind_name(),
                expected
            )),
        }
    }

    fn is_statement_keyword(&self) -> bool {
        matches!(
            self.peek(),
            Token::Role | Token::User | Token::Resource | Token::Allow | Token::Deny
        )
    }

    // -- Program ---------------------------------------------------

    fn parse_statement(&mut self) -> Result<crate::ast::Statement, Diagnostic> {
        match self.peek() {
            Token::Role | Token::User | Token::Resource => self.parse_definition(),
            Token::Allow | Token::Deny => self.parse_policy(),
            _ => Err(self.unexpected("ROLE, USER, RESOURCE, ALLOW or DENY")),
        }
    }

    /// Skip tokens until we find a closing `}` at the original nesting level,
    /// or a statement keyword at nesting level 0.
    fn recover_to_next_statement(&mut self) {
        let mut depth: i32 = 0;
        loop {
            match self.peek() {
                Token::Eof => break,
                Token::LBrace => {
                    depth += 1;
                    self.advance();
                }
                Token::RBrace => {
                    self.advance();
                    if depth <= 0 {
                        // The brace that closes the broken definition
                        break;
                    }
                    depth -= 1;
                }
                _ => {
                    if depth == 0 && self.is_statement_keyword() {
                        break;
                    }
                    self.advance();
                }
            }
        }
    }

    fn parse_program(&mut self, max_errors: usize) -> (Program, Vec<Diagnostic>) {
        let mut program = Program::default();
        let mut errors = Vec::new();

        while self.peek() != &Token::Eof {
            let start = self.pos;
            match self.parse_statement() {
                Ok(stmt) => program.statements.push(stmt),
                Err(e) => {
                    errors.push(e);
                    if errors.len() >= max_errors.max(1) {
                        break;
                    }
                    self.recover_to_next_statement();
                    if self.pos == start {
                        self.advance();
                    }
                }
            }
        }

        (program, errors)
    }
}

/// Parse a token sequence into a program.
///
/// Returns `Err` with every collected syntax diagnostic (at most
/// `max_errors`) if any statement failed to parse; no partial AST is
/// returned in that case.
pub fn parse(tokens: &[Spanned], max_errors: usize) -> Result<Program, Vec<Diagnostic>> {
    if tokens.is_empty() {
        return Ok(Program::default());
    }
    let mut p = Parser::new(tokens);
    let (program, errors) = p.parse_program(max_errors);
    if errors.is_empty() {
        Ok(program)
    } else {
        Err(errors)
    }
}

/// Parse a standalone condition expression, as stored in the IR.
pub fn parse_condition(src: &str) -> Result<Expr, Vec<Diagnostic>> {
    let (tokens, lex_errors) = lexer::lex(src);
    if !lex_errors.is_empty() {
        return Err(lex_errors);
    }
    let mut p = Parser::new(&tokens);
    let expr = p.parse_expr().map_err(|e| vec![e])?;
    if p.peek() != &Token::Eof {
        return Err(vec![p.unexpected("end of condition")]);
    }
    Ok(expr)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
