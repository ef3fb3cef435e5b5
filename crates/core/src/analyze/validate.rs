//! Pass 2: resolve references.
//!
//! User roles and condition role literals resolve against ROLE
//! definitions; plain-identifier policy resources against RESOURCE
//! definitions. Path, dotted and wildcard resource specs are not
//! resolved, but a `/path` that matches no resource's `path` is reported.
//! Each conditioned policy gets its own scope while its condition is checked.

use super::{attributes, Analysis};
use crate::ast::{BinaryOp, Expr, Literal, PolicyRule};
use crate::error::Diagnostic;
use crate::symbols::SymbolKind;

pub(super) fn run(a: &mut Analysis<'_>) {
    validate_user_roles(a);
    for policy in a.policies.clone() {
        validate_resource(a, policy);
        if let Some(cond) = &policy.condition {
            a.symbols.enter_scope(&format!("policy@{}", policy.line));
            attributes::bind_policy_resource(a, policy);
            attributes::check_condition(a, cond);
            validate_condition_roles(a, cond);
            a.symbols.exit_scope();
        }
    }
}

fn validate_user_roles(a: &mut Analysis<'_>) {
    for user in a.users.clone() {
        let Some(role) = user.first_text("role") else {
            continue;
        };
        if a.symbols.resolve(SymbolKind::Role, &role).is_none() {
            a.unresolved(
                a.options.undefined_roles,
                user.line,
                format!(
                    "User '{}' references undefined role '{}'",
                    user.name, role
                ),
            );
        }
    }
}

fn validate_resource(a: &mut Analysis<'_>, policy: &PolicyRule) {
    let spec = policy.resource.as_str();
    let is_path = spec.starts_with('/');
    if is_path {
        let matched = a
            .resources
            .iter()
            .any(|r| r.first_text("path").as_deref() == Some(spec));
        if !matched {
            a.warnings.push(Diagnostic::warning(
                policy.line,
                format!(
                    "Policy uses path '{}' which doesn't match any defined resource path",
                    spec
                ),
            ));
        }
        return;
    }
    if spec.contains('*') || spec.contains('.') || spec.contains('/') {
        return;
    }
    if a.symbols.resolve(SymbolKind::Resource, spec).is_none() {
        a.unresolved(
            a.options.undefined_resources,
            policy.line,
            format!(
                "Policy references undefined resource '{}'. Define it with: RESOURCE {} {{ ... }}",
                spec, spec
            ),
        );
    }
}

/// The role name in `user.role == "R"` / `"R" != user.role`, if `expr` is one.
pub(super) fn compared_role(expr: &Expr) -> Option<(&str, u32)> {
    let Expr::Binary {
        op: BinaryOp::Eq | BinaryOp::Neq,
        left,
        right,
        line,
    } = expr
    else {
        return None;
    };
    let literal = if left.is_user_role() {
        right.as_ref()
    } else if right.is_user_role() {
        left.as_ref()
    } else {
        return None;
    };
    match literal {
        Expr::Literal {
            value: Literal::Str(name),
            ..
        } => Some((name.as_str(), *line)),
        _ => None,
    }
}

fn validate_condition_roles(a: &mut Analysis<'_>, cond: &Expr) {
    let mut references = Vec::new();
    cond.walk(&mut |e| {
        if let Some(r) = compared_role(e) {
            references.push(r);
        }
    });
    for (role, line) in references {
        a.role_references += 1;
        if a.symbols.resolve(SymbolKind::Role, role).is_none() {
            a.unresolved(
                a.options.undefined_roles,
                line,
                format!(
                    "Condition references undefined role '{}' in condition at line {}",
                    role, line
                ),
            );
        }
    }
}
