//! Condition evaluator.
//!
//! Walks a parsed condition tree over an [`EvaluationContext`]. The
//! language is inert: attribute reads, literals, comparisons and
//! AND/OR/NOT. Nothing here can call out, loop or mutate.
//!
//! Errors are for the engine's benefit only; [`holds`] turns every error
//! into `false` so a policy whose condition cannot be evaluated never
//! matches.

use crate::context::EvaluationContext;
use crate::value::Value;
use rust_decimal::Decimal;
use spl_core::ast::{BinaryOp, Expr, Literal, UnaryOp};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// The condition names an attribute the context does not carry.
    #[error("unknown attribute '{object}.{field}'")]
    UnknownAttribute { object: String, field: String },
    /// Ordering requested between values that have none.
    #[error("cannot order {left} against {right}")]
    Incomparable {
        left: &'static str,
        right: &'static str,
    },
    /// A logical operator or the whole condition produced a non-boolean.
    #[error("expected Bool, got {got}")]
    NotABoolean { got: &'static str },
    #[error("invalid number literal '{literal}'")]
    InvalidNumber { literal: String },
    /// The IR condition text does not parse.
    #[error("malformed condition: {message}")]
    Malformed { message: String },
}

fn literal_value(lit: &Literal) -> Result<Value, EvalError> {
    Ok(match lit {
        Literal::Str(s) => Value::Text(s.clone()),
        Literal::Int(i) => Value::Number(Decimal::from(*i)),
        Literal::Decimal(s) => Value::Number(
            s.parse::<Decimal>()
                .map_err(|_| EvalError::InvalidNumber { literal: s.clone() })?,
        ),
        Literal::Bool(b) => Value::Bool(*b),
    })
}

fn as_bool(v: Value) -> Result<bool, EvalError> {
    match v {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::NotABoolean {
            got: other.type_name(),
        }),
    }
}

/// Equality across any two values; differing types are never equal.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Text(a), Value::Text(b)) => a == b,
        _ => false,
    }
}

fn order(left: &Value, right: &Value) -> Result<Ordering, EvalError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
        _ => Err(EvalError::Incomparable {
            left: left.type_name(),
            right: right.type_name(),
        }),
    }
}

/// Evaluate `expr` to a value.
pub fn eval_expr(expr: &Expr, ctx: &EvaluationContext) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal { value, .. } => literal_value(value),

        Expr::Attribute { object, field, .. } => {
            ctx.get(object, field)
                .cloned()
                .ok_or_else(|| EvalError::UnknownAttribute {
                    object: object.clone(),
                    field: field.clone(),
                })
        }

        Expr::Unary {
            op: UnaryOp::Not,
            operand,
            ..
        } => Ok(Value::Bool(!as_bool(eval_expr(operand, ctx)?)?)),

        Expr::Binary {
            op, left, right, ..
        } => {
            let l = eval_expr(left, ctx)?;
            let result = match op {
                // Short-circuit: the right operand is only read when needed
                BinaryOp::And => as_bool(l)? && as_bool(eval_expr(right, ctx)?)?,
                BinaryOp::Or => as_bool(l)? || as_bool(eval_expr(right, ctx)?)?,
                BinaryOp::Eq => values_equal(&l, &eval_expr(right, ctx)?),
                BinaryOp::Neq => !values_equal(&l, &eval_expr(right, ctx)?),
                BinaryOp::Lt => order(&l, &eval_expr(right, ctx)?)? == Ordering::Less,
                BinaryOp::Lte => order(&l, &eval_expr(right, ctx)?)? != Ordering::Greater,
                BinaryOp::Gt => order(&l, &eval_expr(right, ctx)?)? == Ordering::Greater,
                BinaryOp::Gte => order(&l, &eval_expr(right, ctx)?)? != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
    }
}

/// Evaluate `expr` as a condition, propagating any failure.
pub fn eval_condition(expr: &Expr, ctx: &EvaluationContext) -> Result<bool, EvalError> {
    as_bool(eval_expr(expr, ctx)?)
}

/// Fail-closed wrapper: any evaluation error is logged and yields `false`.
pub fn holds(expr: &Expr, ctx: &EvaluationContext) -> bool {
    match eval_condition(expr, ctx) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(
                condition = %expr.to_condition_string(),
                error = %e,
                "condition evaluation failed; treating as false"
            );
            false
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use spl_core::parse_condition;

    fn ctx() -> EvaluationContext {
        let mut c = EvaluationContext::default();
        c.set("user", "role", "Admin");
        c.set("user", "clearance", Value::number(3));
        c.set("user", "location", Value::Null);
        c.set("time", "hour", Value::number(14));
        c.set("device", "trusted", true);
        c
    }

    fn eval(src: &str) -> Result<bool, EvalError> {
        let expr = parse_condition(src).expect("condition should parse");
        eval_condition(&expr, &ctx())
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval("user.role == \"Admin\""), Ok(true));
        assert_eq!(eval("user.role != 'Admin'"), Ok(false));
        assert_eq!(eval("time.hour >= 9 AND time.hour < 18"), Ok(true));
        assert_eq!(eval("user.clearance > 2.5"), Ok(true));
        assert_eq!(eval("user.clearance <= 2"), Ok(false));
        assert_eq!(eval("device.trusted == true"), Ok(true));
        assert_eq!(eval("\"b\" > \"a\""), Ok(true));
    }

    #[test]
    fn logical_operators_and_precedence() {
        assert_eq!(eval("NOT user.role == \"Guest\""), Ok(true));
        assert_eq!(
            eval("user.role == \"Guest\" OR user.role == \"Admin\" AND time.hour > 12"),
            Ok(true)
        );
        assert_eq!(eval("NOT NOT device.trusted"), Ok(true));
    }

    #[test]
    fn mixed_types_never_equal() {
        assert_eq!(eval("user.clearance == \"3\""), Ok(false));
        assert_eq!(eval("user.clearance != \"3\""), Ok(true));
        assert_eq!(eval("user.location == \"HQ\""), Ok(false));
        assert_eq!(
            eval("user.role > 3"),
            Err(EvalError::Incomparable {
                left: "Text",
                right: "Number"
            })
        );
    }

    #[test]
    fn unknown_attributes_are_errors() {
        assert_eq!(
            eval("user.shoe_size == 9"),
            Err(EvalError::UnknownAttribute {
                object: "user".into(),
                field: "shoe_size".into()
            })
        );
        assert!(matches!(
            eval("planet.name == \"Earth\" OR true"),
            Err(EvalError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn short_circuit_skips_unknown_right_operand() {
        assert_eq!(eval("false AND planet.name == \"x\""), Ok(false));
        assert_eq!(eval("true OR planet.name == \"x\""), Ok(true));
    }

    #[test]
    fn quoted_text_is_never_an_attribute() {
        assert_eq!(eval("\"user.role\" == \"user.role\""), Ok(true));
        assert_eq!(eval("user.role == \"user.role\""), Ok(false));
    }

    #[test]
    fn non_boolean_condition_is_an_error() {
        assert_eq!(eval("user.role"), Err(EvalError::NotABoolean { got: "Text" }));
        assert_eq!(
            eval("time.hour AND true"),
            Err(EvalError::NotABoolean { got: "Number" })
        );
    }

    #[test]
    fn holds_fails_closed() {
        let expr = parse_condition("NOT planet.name == \"Earth\"").unwrap();
        assert!(!holds(&expr, &ctx()));
        let expr = parse_condition("user.role == \"Admin\"").unwrap();
        assert!(holds(&expr, &ctx()));
    }
}
