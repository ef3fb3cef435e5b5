//! AST types produced by the parser.
//!
//! The node set is closed: analysis and generation match exhaustively on
//! [`Statement`] and [`Expr`]. `Display` renders the textual AST listing.

use spl_interchange::Effect;
use std::collections::BTreeMap;
use std::fmt;

// ──────────────────────────────────────────────
// Literals
// ──────────────────────────────────────────────

/// A literal value in a property list or condition. Bare identifiers,
/// action words and `*` all become `Str`.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Decimal(String),
    Bool(bool),
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Plain text of the value, without quoting.
    pub fn to_text(&self) -> String {
        match self {
            Literal::Str(s) => s.clone(),
            Literal::Int(n) => n.to_string(),
            Literal::Decimal(d) => d.clone(),
            Literal::Bool(b) => b.to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::Str(s) => serde_json::Value::String(s.clone()),
            Literal::Int(n) => serde_json::Value::from(*n),
            Literal::Decimal(d) => d
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(d.clone())),
            Literal::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
}

/// Condition-syntax rendering: strings are double-quoted and escaped.
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                f.write_str("\"")
            }
            other => f.write_str(&other.to_text()),
        }
    }
}

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        line: u32,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        line: u32,
    },
    Attribute {
        object: String,
        field: String,
        line: u32,
    },
    Literal {
        value: Literal,
        line: u32,
    },
}

impl Expr {
    /// Visit every node, parents before children.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Binary { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            Expr::Unary { operand, .. } => operand.walk(f),
            Expr::Attribute { .. } | Expr::Literal { .. } => {}
        }
    }

    /// Top-level AND operands, flattened.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
                ..
            } => {
                let mut out = left.conjuncts();
                out.extend(right.conjuncts());
                out
            }
            other => vec![other],
        }
    }

    /// True if the expression is `user.role`.
    pub fn is_user_role(&self) -> bool {
        matches!(self, Expr::Attribute { object, field, .. } if object == "user" && field == "role")
    }

    /// True if `user.role` appears anywhere in the expression.
    pub fn references_user_role(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| found |= e.is_user_role());
        found
    }

    /// Normalized, fully parenthesized infix text, re-parseable as a condition.
    pub fn to_condition_string(&self) -> String {
        match self {
            Expr::Binary {
                op, left, right, ..
            } => format!(
                "({} {} {})",
                left.to_condition_string(),
                op.symbol(),
                right.to_condition_string()
            ),
            Expr::Unary { operand, .. } => format!("(NOT {})", operand.to_condition_string()),
            Expr::Attribute { object, field, .. } => format!("{}.{}", object, field),
            Expr::Literal { value, .. } => value.to_string(),
        }
    }
}

/// AST listing rendering.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Binary {
                op, left, right, ..
            } => write!(f, "BinaryOp({} {} {})", left, op.symbol(), right),
            Expr::Unary { operand, .. } => write!(f, "UnaryOp(NOT {})", operand),
            Expr::Attribute { object, field, .. } => write!(f, "{}.{}", object, field),
            Expr::Literal { value, .. } => write!(f, "{}", value),
        }
    }
}

// ──────────────────────────────────────────────
// Statements
// ──────────────────────────────────────────────

/// Property values are always a list; a single value is a one-element list.
pub type Properties = BTreeMap<String, Vec<Literal>>;

/// A ROLE, USER or RESOURCE body.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    pub properties: Properties,
    pub line: u32,
}

impl Definition {
    /// First value of a property as text, e.g. a user's `role`.
    pub fn first_text(&self, key: &str) -> Option<String> {
        self.properties
            .get(key)
            .and_then(|vals| vals.first())
            .map(Literal::to_text)
    }

    /// All values of a property as text.
    pub fn texts(&self, key: &str) -> Vec<String> {
        self.properties
            .get(key)
            .map(|vals| vals.iter().map(Literal::to_text).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyRule {
    pub effect: Effect,
    /// Lowercase action names in source order, without duplicates; may be `["*"]`.
    pub actions: Vec<String>,
    pub resource: String,
    pub condition: Option<Expr>,
    pub line: u32,
}

impl PolicyRule {
    pub fn covers_action(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == "*" || a == action)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Role(Definition),
    User(Definition),
    Resource(Definition),
    Policy(PolicyRule),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn roles(&self) -> impl Iterator<Item = &Definition> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Role(d) => Some(d),
            _ => None,
        })
    }

    pub fn users(&self) -> impl Iterator<Item = &Definition> {
        self.statements.iter().filter_map(|s| match s {
            Statement::User(d) => Some(d),
            _ => None,
        })
    }

    pub fn resources(&self) -> impl Iterator<Item = &Definition> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Resource(d) => Some(d),
            _ => None,
        })
    }

    pub fn policies(&self) -> impl Iterator<Item = &PolicyRule> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Policy(p) => Some(p),
            _ => None,
        })
    }
}

// ──────────────────────────────────────────────
// AST listing
// ──────────────────────────────────────────────

fn write_properties(f: &mut fmt::Formatter<'_>, props: &Properties) -> fmt::Result {
    f.write_str("{")?;
    for (i, (key, values)) in props.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        let texts: Vec<String> = values.iter().map(Literal::to_text).collect();
        if texts.len() == 1 {
            write!(f, "{}: {}", key, texts[0])?;
        } else {
            write!(f, "{}: [{}]", key, texts.join(", "))?;
        }
    }
    f.write_str("}")
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, def) = match self {
            Statement::Role(d) => ("Role", d),
            Statement::User(d) => ("User", d),
            Statement::Resource(d) => ("Resource", d),
            Statement::Policy(p) => {
                write!(
                    f,
                    "Policy(type={}, actions=[{}], resource={}",
                    p.effect,
                    p.actions.join(", "),
                    p.resource
                )?;
                if let Some(cond) = &p.condition {
                    write!(f, ", condition={}", cond)?;
                }
                return write!(f, ", line={})", p.line);
            }
        };
        write!(f, "{}(name={}, properties=", label, def.name)?;
        write_properties(f, &def.properties)?;
        write!(f, ", line={})", def.line)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body: Vec<String> = self.statements.iter().map(|s| s.to_string()).collect();
        write!(f, "Program(\n  {}\n)", body.join(",\n  "))
    }
}
