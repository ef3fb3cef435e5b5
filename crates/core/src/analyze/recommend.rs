//! Pass 5: review suggestions derived from the earlier passes. Purely
//! advisory; nothing here affects `success`.

use super::{Analysis, ConflictType};

pub(super) fn run(a: &mut Analysis<'_>) {
    let mut out = Vec::new();

    for grant in &a.security.wildcard_permissions {
        out.push(format!(
            "Replace the wildcard on role '{}' (line {}) with the actions it needs",
            grant.role, grant.line
        ));
    }

    for c in &a.conflicts {
        match c.conflict_type {
            ConflictType::AllowDenyConflict | ConflictType::PrivilegeEscalation => out.push(format!(
                "DENY wins at runtime: review the conflicting policies at lines {} and {}",
                c.policy1_line, c.policy2_line
            )),
            ConflictType::RedundantPolicy => {
                out.push(format!("Remove the duplicate policy at line {}", c.policy2_line))
            }
            ConflictType::LogicalContradiction => {}
        }
    }

    if a.security.overly_permissive > 0 {
        out.push(format!(
            "Add IF conditions to {} unguarded sensitive ALLOW polic{}",
            a.security.overly_permissive,
            if a.security.overly_permissive == 1 { "y" } else { "ies" }
        ));
    }

    a.recommendations = out;
}
