use super::Parser;
use crate::ast::{Definition, Literal, Properties, Statement};
use crate::error::Diagnostic;
use crate::lexer::Token;

impl<'a> Parser<'a> {
    /// `(ROLE|USER|RESOURCE) name { property-list }`
    pub(super) fn parse_definition(&mut self) -> Result<Statement, Diagnostic> {
        let line = self.cur_line();
        let keyword = self.peek().clone();
        self.advance();
        let name = self.take_ident("a definition name")?;
        self.expect(Token::LBrace, "'{'")?;
        let properties = self.parse_property_list()?;
        self.expect(Token::RBrace, "'}'")?;

        let def = Definition {
            name,
            properties,
            line,
        };
        Ok(match keyword {
            Token::Role => Statement::Role(def),
            Token::User => Statement::User(def),
            _ => Statement::Resource(def),
        })
    }

    /// True if the upcoming tokens start a property (`key :`).
    fn at_property_start(&self, offset: usize) -> bool {
        matches!(self.peek_at(offset), Token::Ident(_) | Token::Can)
            && self.peek_at(offset + 1) == &Token::Colon
    }

    /// Properties may be separated by commas or just whitespace. A later
    /// occurrence of the same key replaces the earlier one.
    fn parse_property_list(&mut self) -> Result<Properties, Diagnostic> {
        let mut props = Properties::new();
        loop {
            if self.peek() == &Token::RBrace {
                break;
            }
            let key = match self.peek().clone() {
                Token::Ident(k) => k,
                Token::Can => "can".to_owned(),
                _ => return Err(self.unexpected("a property name or '}'")),
            };
            self.advance();
            self.expect(Token::Colon, "':'")?;
            let values = if key == "can" {
                self.parse_action_values()?
                    .into_iter()
                    .map(Literal::Str)
                    .collect()
            } else {
                self.parse_value_list()?
            };
            props.insert(key, values);

            match self.peek() {
                Token::Comma => {
                    self.advance();
                }
                Token::RBrace => break,
                _ if self.at_property_start(0) => {}
                _ => return Err(self.unexpected("',' or '}'")),
            }
        }
        Ok(props)
    }

    /// `value (, value)*`, stopping before a comma that begins the next property.
    fn parse_value_list(&mut self) -> Result<Vec<Literal>, Diagnostic> {
        let mut values = vec![self.parse_value()?];
        while self.peek() == &Token::Comma && !self.at_property_start(1) {
            self.advance();
            values.push(self.parse_value()?);
        }
        Ok(values)
    }

    fn parse_value(&mut self) -> Result<Literal, Diagnostic> {
        let lit = match self.peek().clone() {
            Token::Str(s) | Token::Ident(s) | Token::Action(s) => Literal::Str(s),
            Token::Int(n) => Literal::Int(n),
            Token::Decimal(d) => Literal::Decimal(d),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::Star => Literal::Str("*".to_owned()),
            _ => return Err(self.unexpected("a value")),
        };
        self.advance();
        Ok(lit)
    }

    /// Action vocabulary or `*`, comma separated. Names are lowercased and
    /// duplicates dropped, keeping first-seen order.
    pub(super) fn parse_action_values(&mut self) -> Result<Vec<String>, Diagnostic> {
        let mut actions: Vec<String> = Vec::new();
        loop {
            let action = match self.peek() {
                Token::Action(a) => a.to_ascii_lowercase(),
                Token::Star => "*".to_owned(),
                _ => {
                    return Err(self.unexpected(
                        "action (read, write, delete, execute, create, update, list) or '*'",
                    ))
                }
            };
            self.advance();
            if !actions.contains(&action) {
                actions.push(action);
            }
            if self.peek() == &Token::Comma && !self.at_property_start(1) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(actions)
    }
}
