use super::Parser;
use crate::ast::{PolicyRule, Statement};
use crate::error::Diagnostic;
use crate::lexer::Token;
use spl_interchange::Effect;

impl<'a> Parser<'a> {
    /// `(ALLOW|DENY) action: list ON RESOURCE: spec [IF ( expr )]`
    pub(super) fn parse_policy(&mut self) -> Result<Statement, Diagnostic> {
        let line = self.cur_line();
        let effect = if self.peek() == &Token::Allow {
            Effect::Allow
        } else {
            Effect::Deny
        };
        self.advance();

        self.expect(Token::ActionKw, "'action'")?;
        self.expect(Token::Colon, "':'")?;
        let actions = self.parse_action_values()?;

        self.expect(Token::On, "ON")?;
        self.expect(Token::Resource, "RESOURCE")?;
        self.expect(Token::Colon, "':'")?;
        let resource = self.parse_resource_spec()?;

        let condition = if self.peek() == &Token::If {
            self.advance();
            self.expect(Token::LParen, "'(' after IF")?;
            let expr = self.parse_expr()?;
            self.expect(Token::RParen, "')'")?;
            Some(expr)
        } else {
            None
        };

        Ok(Statement::Policy(PolicyRule {
            effect,
            actions,
            resource,
            condition,
            line,
        }))
    }

    /// identifier | string | dotted path, optionally ending in `.*`
    fn parse_resource_spec(&mut self) -> Result<String, Diagnostic> {
        match self.peek().clone() {
            Token::Str(s) => {
                self.advance();
                Ok(s)
            }
            Token::Star => {
                self.advance();
                Ok("*".to_owned())
            }
            Token::Ident(first) => {
                self.advance();
                let mut spec = first;
                while self.peek() == &Token::Dot {
                    self.advance();
                    match self.peek().clone() {
                        Token::Ident(seg) => {
                            self.advance();
                            spec.push('.');
                            spec.push_str(&seg);
                        }
                        Token::Star => {
                            self.advance();
                            spec.push_str(".*");
                            break;
                        }
                        _ => return Err(self.unexpected("a path segment or '*'")),
                    }
                }
                Ok(spec)
            }
            _ => Err(self.unexpected("a resource name, string or dotted path")),
        }
    }
}
