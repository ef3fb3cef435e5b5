use super::Parser;
use crate::ast::{BinaryOp, Expr, Literal, UnaryOp};
use crate::error::Diagnostic;
use crate::lexer::Token;

impl<'a> Parser<'a> {
    // -- Expression parsing --------------------------------------
    //
    // Precedence, lowest first: OR, AND, NOT, (== !=), (< <= > >=).

    pub(super) fn parse_expr(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_and_expr()?;
        while self.peek() == &Token::Or {
            let line = self.cur_line();
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_not_expr()?;
        while self.peek() == &Token::And {
            let line = self.cur_line();
            self.advance();
            let right = self.parse_not_expr()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr, Diagnostic> {
        if self.peek() == &Token::Not {
            let line = self.cur_line();
            self.advance();
            let operand = self.parse_not_expr()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
                line,
            });
        }
        self.parse_equality_expr()
    }

    fn parse_equality_expr(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_relational_expr()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinaryOp::Eq,
                Token::Neq => BinaryOp::Neq,
                _ => break,
            };
            let line = self.cur_line();
            self.advance();
            let right = self.parse_relational_expr()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn parse_relational_expr(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_primary_expr()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::Lte => BinaryOp::Lte,
                Token::Gt => BinaryOp::Gt,
                Token::Gte => BinaryOp::Gte,
                _ => break,
            };
            let line = self.cur_line();
            self.advance();
            let right = self.parse_primary_expr()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                line,
            };
        }
        Ok(left)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, Diagnostic> {
        let line = self.cur_line();
        let value = match self.peek().clone() {
            Token::LParen => {
                self.advance();
                let e = self.parse_expr()?;
                self.expect(Token::RParen, "')'")?;
                return Ok(e);
            }
            Token::Ident(name) => {
                self.advance();
                if self.peek() != &Token::Dot {
                    // A bare identifier is a string literal: user.role == Admin
                    return Ok(Expr::Literal {
                        value: Literal::Str(name),
                        line,
                    });
                }
                self.advance();
                let field = self.take_ident("an attribute name")?;
                return Ok(Expr::Attribute {
                    object: name,
                    field,
                    line,
                });
            }
            Token::Str(s) | Token::Action(s) => Literal::Str(s),
            Token::Int(n) => Literal::Int(n),
            Token::Decimal(d) => Literal::Decimal(d),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::Star => Literal::Str("*".to_owned()),
            _ => return Err(self.unexpected("an attribute, literal or '('")),
        };
        self.advance();
        Ok(Expr::Literal { value, line })
    }
}
