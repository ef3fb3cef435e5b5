//! Pass 4: security heuristics.
//!
//! - wildcard `can: *` on a role: RISK
//! - ALLOW covering `delete` reachable by a guest role: blocking ERROR
//! - any policy on a sensitive action with no condition: RISK
//! - ALLOW of a sensitive action whose condition never mentions an
//!   administrative role: RISK

use super::{Analysis, SENSITIVE_ACTIONS};
use crate::ast::{BinaryOp, Expr, Literal, PolicyRule};
use crate::error::Diagnostic;
use spl_interchange::Effect;

pub(super) fn run(a: &mut Analysis<'_>) {
    for grant in a.security.wildcard_permissions.clone() {
        a.warnings.push(Diagnostic::risk(
            grant.line,
            format!("SECURITY: Role '{}' has wildcard permissions (*)", grant.role),
        ));
    }

    let guest_role_defined = a.roles.iter().any(|r| is_guest_name(&r.name));

    for policy in a.policies.clone() {
        let sensitive = sensitive_actions(policy);
        if !sensitive.is_empty() && policy.condition.is_none() {
            a.security.overly_permissive += 1;
            a.warnings.push(Diagnostic::risk(
                policy.line,
                format!(
                    "Policy allows sensitive actions without conditions: {}",
                    sensitive.join(", ")
                ),
            ));
        }

        if policy.effect != Effect::Allow {
            continue;
        }
        if grants_guest_delete(policy, guest_role_defined) {
            a.security.guest_delete_permissions += 1;
            a.errors.push(Diagnostic::error(
                policy.line,
                "CRITICAL SECURITY RISK: Policy grants 'delete' to Guest role",
            ));
        }
        if !sensitive.is_empty() && !has_admin_context(policy.condition.as_ref()) {
            a.warnings.push(Diagnostic::risk(
                policy.line,
                "Policy grants sensitive actions without admin context",
            ));
        }
    }

    // Role-only programs get one ALLOW per role and resource at generation time.
    let synthesized = a.policies.is_empty()
        && a.options.synthesize_role_policies
        && !a.resources.is_empty();
    if synthesized {
        for role in a.roles.clone() {
            if !is_guest_name(&role.name) {
                continue;
            }
            let grants = role.texts("can");
            if grants.iter().any(|g| g == "delete" || g == "*") {
                a.security.guest_delete_permissions += 1;
                a.errors.push(Diagnostic::error(
                    role.line,
                    format!(
                        "CRITICAL SECURITY RISK: Role '{}' would be granted 'delete' on every resource",
                        role.name
                    ),
                ));
            }
        }
    }
}

fn is_guest_name(name: &str) -> bool {
    name.to_lowercase().contains("guest")
}

fn sensitive_actions(policy: &PolicyRule) -> Vec<&'static str> {
    SENSITIVE_ACTIONS
        .iter()
        .copied()
        .filter(|a| policy.covers_action(a))
        .collect()
}

fn grants_guest_delete(policy: &PolicyRule, guest_role_defined: bool) -> bool {
    if !policy.covers_action("delete") {
        return false;
    }
    match &policy.condition {
        Some(cond) => {
            admits_guest(cond, true) || (guest_role_defined && !cond.references_user_role())
        }
        None => guest_role_defined,
    }
}

/// A guest-named string literal appears with positive polarity. `NOT`
/// and `!=` each flip polarity, so `NOT (user.role != "Guest")` admits.
fn admits_guest(expr: &Expr, positive: bool) -> bool {
    match expr {
        Expr::Binary {
            op: BinaryOp::Neq,
            left,
            right,
            ..
        } => admits_guest(left, !positive) || admits_guest(right, !positive),
        Expr::Binary { left, right, .. } => {
            admits_guest(left, positive) || admits_guest(right, positive)
        }
        Expr::Unary { operand, .. } => admits_guest(operand, !positive),
        Expr::Attribute { .. } => false,
        Expr::Literal { value, .. } => {
            positive && matches!(value, Literal::Str(s) if is_guest_name(s))
        }
    }
}

fn has_admin_context(condition: Option<&Expr>) -> bool {
    condition.is_some_and(|c| c.to_condition_string().to_lowercase().contains("admin"))
}
