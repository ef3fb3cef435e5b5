//! Pass 3: conflict detection between policies on the same resource.
//!
//! Two policies conflict when their resource specs are equal, their
//! action sets overlap, and their conditions are not provably disjoint.
//! Disjointness is only proved for the simple case of both top-level
//! conjunctions pinning the same attribute to different literals with `==`.

use super::Analysis;
use crate::ast::{BinaryOp, Expr, Literal, PolicyRule};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    AllowDenyConflict,
    PrivilegeEscalation,
    LogicalContradiction,
    RedundantPolicy,
}

impl ConflictType {
    pub fn risk_score(&self) -> u8 {
        match self {
            ConflictType::PrivilegeEscalation => 95,
            ConflictType::AllowDenyConflict => 85,
            ConflictType::LogicalContradiction => 60,
            ConflictType::RedundantPolicy => 20,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::AllowDenyConflict => "ALLOW_DENY_CONFLICT",
            ConflictType::PrivilegeEscalation => "PRIVILEGE_ESCALATION",
            ConflictType::LogicalContradiction => "LOGICAL_CONTRADICTION",
            ConflictType::RedundantPolicy => "REDUNDANT_POLICY",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyConflict {
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub description: String,
    pub risk_score: u8,
    pub policy1_line: u32,
    pub policy2_line: u32,
}

pub(super) fn run(a: &mut Analysis<'_>) {
    let policies = &a.policies;
    let mut found = Vec::new();
    for (i, p1) in policies.iter().enumerate() {
        for p2 in &policies[i + 1..] {
            if p1.resource != p2.resource {
                continue;
            }
            let common = overlapping_actions(p1, p2);
            if common.is_empty() {
                continue;
            }
            if provably_disjoint(p1.condition.as_ref(), p2.condition.as_ref()) {
                continue;
            }
            found.push(classify(p1, p2, &common));
        }
    }
    a.conflicts = found;
}

fn overlapping_actions(p1: &PolicyRule, p2: &PolicyRule) -> Vec<String> {
    if p1.actions.iter().any(|x| x == "*") {
        return p2.actions.clone();
    }
    if p2.actions.iter().any(|x| x == "*") {
        return p1.actions.clone();
    }
    p1.actions
        .iter()
        .filter(|x| p2.actions.contains(x))
        .cloned()
        .collect()
}

fn same_condition(a: Option<&Expr>, b: Option<&Expr>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => x.to_condition_string() == y.to_condition_string(),
        _ => false,
    }
}

fn classify(p1: &PolicyRule, p2: &PolicyRule, common: &[String]) -> PolicyConflict {
    let actions = common.join(", ");
    let (conflict_type, description) = if p1.effect != p2.effect {
        let escalation = common.iter().any(|x| x == "delete" || x == "*");
        let kind = if escalation {
            ConflictType::PrivilegeEscalation
        } else {
            ConflictType::AllowDenyConflict
        };
        (
            kind,
            format!(
                "Conflicting policies on resource '{}' for action(s) {}: {} (line {}) vs {} (line {})",
                p1.resource, actions, p1.effect, p1.line, p2.effect, p2.line
            ),
        )
    } else if same_condition(p1.condition.as_ref(), p2.condition.as_ref()) {
        (
            ConflictType::RedundantPolicy,
            format!(
                "Redundant policies on resource '{}' for action(s) {}: {} (line {}) repeats {} (line {})",
                p1.resource, actions, p2.effect, p2.line, p1.effect, p1.line
            ),
        )
    } else {
        (
            ConflictType::LogicalContradiction,
            format!(
                "Overlapping {} policies on resource '{}' for action(s) {} with different conditions (lines {} and {})",
                p1.effect, p1.resource, actions, p1.line, p2.line
            ),
        )
    };
    PolicyConflict {
        conflict_type,
        description,
        risk_score: conflict_type.risk_score(),
        policy1_line: p1.line,
        policy2_line: p2.line,
    }
}

/// `attr == literal` terms among the top-level conjuncts.
fn pinned_attributes(expr: &Expr) -> Vec<((&str, &str), &Literal)> {
    expr.conjuncts()
        .into_iter()
        .filter_map(|c| match c {
            Expr::Binary {
                op: BinaryOp::Eq,
                left,
                right,
                ..
            } => match (left.as_ref(), right.as_ref()) {
                (Expr::Attribute { object, field, .. }, Expr::Literal { value, .. })
                | (Expr::Literal { value, .. }, Expr::Attribute { object, field, .. }) => {
                    Some(((object.as_str(), field.as_str()), value))
                }
                _ => None,
            },
            _ => None,
        })
        .collect()
}

/// Literals that no single runtime value can equal at once.
fn literals_distinct(a: &Literal, b: &Literal) -> bool {
    match (a, b) {
        (Literal::Str(x), Literal::Str(y)) => x != y,
        (Literal::Int(x), Literal::Int(y)) => x != y,
        (Literal::Bool(x), Literal::Bool(y)) => x != y,
        _ => false,
    }
}

fn provably_disjoint(a: Option<&Expr>, b: Option<&Expr>) -> bool {
    let (Some(a), Some(b)) = (a, b) else {
        return false;
    };
    let pins_a = pinned_attributes(a);
    let pins_b = pinned_attributes(b);
    pins_a.iter().any(|(attr_a, lit_a)| {
        pins_b
            .iter()
            .any(|(attr_b, lit_b)| attr_a == attr_b && literals_distinct(lit_a, lit_b))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::tests::analyze_src;

    const PRELUDE: &str = "ROLE Dev { can: read }\nROLE Ops { can: read }\nRESOURCE DB { path: \"/data\" }\n";

    fn conflicts_for(rules: &str) -> Vec<PolicyConflict> {
        analyze_src(&format!("{}{}", PRELUDE, rules)).conflicts
    }

    #[test]
    fn allow_deny_same_condition() {
        let c = conflicts_for(
            "ALLOW action: read ON RESOURCE: DB IF (user.role == \"Dev\")\nDENY action: read ON RESOURCE: DB IF (user.role == \"Dev\")",
        );
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].conflict_type, ConflictType::AllowDenyConflict);
        assert_eq!(c[0].risk_score, 85);
        assert_eq!((c[0].policy1_line, c[0].policy2_line), (4, 5));
        assert_eq!(
            c[0].description,
            "Conflicting policies on resource 'DB' for action(s) read: ALLOW (line 4) vs DENY (line 5)"
        );
    }

    #[test]
    fn delete_overlap_is_privilege_escalation() {
        let c = conflicts_for(
            "ALLOW action: * ON RESOURCE: DB IF (user.role == \"Ops\")\nDENY action: delete ON RESOURCE: DB",
        );
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].conflict_type, ConflictType::PrivilegeEscalation);
        assert_eq!(c[0].risk_score, 95);
    }

    #[test]
    fn disjoint_role_pins_do_not_conflict() {
        let c = conflicts_for(
            "ALLOW action: read ON RESOURCE: DB IF (user.role == \"Dev\" AND time.hour > 8)\nDENY action: read ON RESOURCE: DB IF (user.role == \"Ops\")",
        );
        assert!(c.is_empty(), "{:?}", c);
    }

    #[test]
    fn or_conditions_are_not_proved_disjoint() {
        let c = conflicts_for(
            "ALLOW action: read ON RESOURCE: DB IF (user.role == \"Dev\" OR user.role == \"Ops\")\nDENY action: read ON RESOURCE: DB IF (user.role == \"Ops\")",
        );
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn no_action_overlap_no_conflict() {
        let c = conflicts_for(
            "ALLOW action: read ON RESOURCE: DB\nDENY action: write ON RESOURCE: DB",
        );
        assert!(c.is_empty());
    }

    #[test]
    fn same_kind_pairs() {
        let c = conflicts_for(
            "ALLOW action: read ON RESOURCE: DB\nALLOW action: read ON RESOURCE: DB\nALLOW action: read ON RESOURCE: DB IF (time.hour < 12)",
        );
        let kinds: Vec<_> = c.iter().map(|c| c.conflict_type).collect();
        assert_eq!(
            kinds,
            vec![
                ConflictType::RedundantPolicy,
                ConflictType::LogicalContradiction,
                ConflictType::LogicalContradiction
            ]
        );
        assert_eq!(c[0].risk_score, 20);
    }
}
