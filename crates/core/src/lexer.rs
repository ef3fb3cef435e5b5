//! Source text to token sequence.
//!
//! Lexing never aborts: an unrecognized character is reported as a
//! lexical diagnostic and skipped, and scanning continues. Every call
//! starts from line 1 with no state carried between calls.

use crate::error::Diagnostic;
use serde::Serialize;

/// The action vocabulary. Matched case-insensitively.
pub const ACTIONS: [&str; 7] = [
    "read", "write", "delete", "execute", "create", "update", "list",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Structural keywords (exact, case-sensitive)
    Role,
    User,
    Resource,
    Allow,
    Deny,
    On,
    If,
    And,
    Or,
    Not,
    // Lowercase keywords
    ActionKw, // action
    Can,
    True,
    False,
    /// One of [`ACTIONS`], as written in the source
    Action(String),
    Ident(String),
    /// Quoted string literal (content without quotes, escapes resolved)
    Str(String),
    Int(i64),
    /// Decimal literal, kept as text to preserve the exact representation
    Decimal(String),
    // Comparison operators
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    // Delimiters
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Colon,
    Dot,
    Star,
    Eof,
}

impl Token {
    /// Token-type name used in token listings and syntax messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Token::Role => "ROLE",
            Token::User => "USER",
            Token::Resource => "RESOURCE",
            Token::Allow => "ALLOW",
            Token::Deny => "DENY",
            Token::On => "ON",
            Token::If => "IF",
            Token::And => "AND",
            Token::Or => "OR",
            Token::Not => "NOT",
            Token::ActionKw => "ACTION",
            Token::Can => "CAN",
            Token::True => "TRUE",
            Token::False => "FALSE",
            Token::Action(a) => match a.to_ascii_lowercase().as_str() {
                "read" => "READ",
                "write" => "WRITE",
                "delete" => "DELETE",
                "execute" => "EXECUTE",
                "create" => "CREATE",
                "update" => "UPDATE",
                _ => "LIST",
            },
            Token::Ident(_) => "IDENTIFIER",
            Token::Str(_) => "STRING",
            Token::Int(_) | Token::Decimal(_) => "NUMBER",
            Token::Eq => "EQUALS",
            Token::Neq => "NOT_EQUALS",
            Token::Lt => "LESS_THAN",
            Token::Lte => "LESS_EQUAL",
            Token::Gt => "GREATER_THAN",
            Token::Gte => "GREATER_EQUAL",
            Token::LBrace => "LBRACE",
            Token::RBrace => "RBRACE",
            Token::LParen => "LPAREN",
            Token::RParen => "RPAREN",
            Token::Comma => "COMMA",
            Token::Colon => "COLON",
            Token::Dot => "DOT",
            Token::Star => "ASTERISK",
            Token::Eof => "EOF",
        }
    }

    /// The token's value as it would be listed to a user.
    pub fn text(&self) -> String {
        match self {
            Token::Action(s) | Token::Ident(s) | Token::Str(s) | Token::Decimal(s) => s.clone(),
            Token::Int(n) => n.to_string(),
            Token::ActionKw => "action".to_owned(),
            Token::Can => "can".to_owned(),
            Token::True => "true".to_owned(),
            Token::False => "false".to_owned(),
            Token::Eq => "==".to_owned(),
            Token::Neq => "!=".to_owned(),
            Token::Lt => "<".to_owned(),
            Token::Lte => "<=".to_owned(),
            Token::Gt => ">".to_owned(),
            Token::Gte => ">=".to_owned(),
            Token::LBrace => "{".to_owned(),
            Token::RBrace => "}".to_owned(),
            Token::LParen => "(".to_owned(),
            Token::RParen => ")".to_owned(),
            Token::Comma => ",".to_owned(),
            Token::Colon => ":".to_owned(),
            Token::Dot => ".".to_owned(),
            Token::Star => "*".to_owned(),
            Token::Eof => String::new(),
            keyword => keyword.kind_name().to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
}

/// One entry of a token listing: `{type, value, line}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenRecord {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: String,
    pub line: u32,
}

impl From<&Spanned> for TokenRecord {
    fn from(s: &Spanned) -> Self {
        TokenRecord {
            kind: s.token.kind_name(),
            value: s.token.text(),
            line: s.line,
        }
    }
}

/// Build a token listing, omitting the trailing `Eof`.
pub fn token_records(tokens: &[Spanned]) -> Vec<TokenRecord> {
    tokens
        .iter()
        .filter(|s| s.token != Token::Eof)
        .map(TokenRecord::from)
        .collect()
}

fn keyword_or_ident(word: &str) -> Token {
    match word {
        "ROLE" => Token::Role,
        "USER" => Token::User,
        "RESOURCE" => Token::Resource,
        "ALLOW" => Token::Allow,
        "DENY" => Token::Deny,
        "ON" => Token::On,
        "IF" => Token::If,
        "AND" => Token::And,
        "OR" => Token::Or,
        "NOT" => Token::Not,
        _ => {
            let lower = word.to_ascii_lowercase();
            match lower.as_str() {
                "action" => Token::ActionKw,
                "can" => Token::Can,
                "true" => Token::True,
                "false" => Token::False,
                a if ACTIONS.contains(&a) => Token::Action(word.to_owned()),
                _ => Token::Ident(word.to_owned()),
            }
        }
    }
}

/// Tokenize `src`. Returns the tokens (always terminated by `Eof`) and
/// any lexical diagnostics for characters that were skipped.
pub fn lex(src: &str) -> (Vec<Spanned>, Vec<Diagnostic>) {
    let mut tokens = Vec::new();
    let mut diagnostics = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut pos = 0usize;
    let mut line: u32 = 1;

    while pos < chars.len() {
        let c = chars[pos];

        // Line comment
        if c == '/' && pos + 1 < chars.len() && chars[pos + 1] == '/' {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            continue;
        }

        // Block comment
        if c == '/' && pos + 1 < chars.len() && chars[pos + 1] == '*' {
            let start_line = line;
            pos += 2;
            loop {
                if pos >= chars.len() {
                    diagnostics.push(Diagnostic::lex(start_line, "unterminated block comment"));
                    break;
                }
                if chars[pos] == '\n' {
                    line += 1;
                }
                if chars[pos] == '*' && pos + 1 < chars.len() && chars[pos + 1] == '/' {
                    pos += 2;
                    break;
                }
                pos += 1;
            }
            continue;
        }

        if c.is_whitespace() {
            if c == '\n' {
                line += 1;
            }
            pos += 1;
            continue;
        }

        let tok_line = line;

        // String literal, single or double quoted
        if c == '"' || c == '\'' {
            let quote = c;
            let mut i = pos + 1;
            let mut newlines = 0u32;
            let mut s = String::new();
            let mut closed = false;
            while i < chars.len() {
                let sc = chars[i];
                if sc == quote {
                    closed = true;
                    i += 1;
                    break;
                }
                if sc == '\\' && i + 1 < chars.len() {
                    match chars[i + 1] {
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        '\\' => s.push('\\'),
                        '"' => s.push('"'),
                        '\'' => s.push('\''),
                        other => {
                            s.push('\\');
                            s.push(other);
                        }
                    }
                    if chars[i + 1] == '\n' {
                        newlines += 1;
                    }
                    i += 2;
                    continue;
                }
                if sc == '\n' {
                    newlines += 1;
                }
                s.push(sc);
                i += 1;
            }
            if closed {
                tokens.push(Spanned {
                    token: Token::Str(s),
                    line: tok_line,
                });
                line += newlines;
                pos = i;
            } else {
                // Skip only the quote; the rest is scanned as ordinary input.
                diagnostics.push(Diagnostic::lex(tok_line, "unterminated string literal"));
                pos += 1;
            }
            continue;
        }

        // Number: digits with an optional fractional part
        if c.is_ascii_digit() {
            let start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            let is_decimal = pos + 1 < chars.len()
                && chars[pos] == '.'
                && chars[pos + 1].is_ascii_digit();
            if is_decimal {
                pos += 1; // consume '.'
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            let s: String = chars[start..pos].iter().collect();
            let token = match s.parse::<i64>() {
                Ok(n) if !is_decimal => Token::Int(n),
                _ => Token::Decimal(s),
            };
            tokens.push(Spanned {
                token,
                line: tok_line,
            });
            continue;
        }

        // Two-character operators
        let next = chars.get(pos + 1).copied();
        let two = match (c, next) {
            ('=', Some('=')) => Some(Token::Eq),
            ('!', Some('=')) => Some(Token::Neq),
            ('<', Some('=')) => Some(Token::Lte),
            ('>', Some('=')) => Some(Token::Gte),
            _ => None,
        };
        if let Some(token) = two {
            tokens.push(Spanned {
                token,
                line: tok_line,
            });
            pos += 2;
            continue;
        }

        let single = match c {
            '<' => Some(Token::Lt),
            '>' => Some(Token::Gt),
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            ':' => Some(Token::Colon),
            '.' => Some(Token::Dot),
            '*' => Some(Token::Star),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push(Spanned {
                token,
                line: tok_line,
            });
            pos += 1;
            continue;
        }

        // Identifier / keyword
        if c.is_ascii_alphabetic() || c == '_' {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().collect();
            tokens.push(Spanned {
                token: keyword_or_ident(&word),
                line: tok_line,
            });
            continue;
        }

        diagnostics.push(Diagnostic::lex(
            tok_line,
            format!("illegal character '{}'", c),
        ));
        pos += 1;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line,
    });
    (tokens, diagnostics)
}
