//! Validated AST to policy-set IR.
//!
//! Conditions are serialized as normalized infix text (see
//! [`Expr::to_condition_string`](crate::ast::Expr::to_condition_string)).
//! A program with roles but no explicit policy gets one synthesized ALLOW
//! per role and resource, guarded by `user.role == "<Role>"`.

use crate::ast::{Definition, Literal, Program};
use spl_interchange::{
    Effect, PolicyDecl, PolicySet, PropertyMap, ResourceDecl, RoleDecl, UserDecl,
};

fn property_map(def: &Definition) -> PropertyMap {
    def.properties
        .iter()
        .map(|(k, vals)| (k.clone(), vals.iter().map(|v| v.to_json()).collect()))
        .collect()
}

/// Generate IR from a program that passed semantic analysis.
///
/// Only the first definition of a duplicated name is emitted; analysis
/// reports duplicates as errors so this only matters for callers that
/// generate regardless.
pub fn generate(program: &Program, synthesize_role_policies: bool) -> PolicySet {
    let mut roles: Vec<RoleDecl> = Vec::new();
    let mut users: Vec<UserDecl> = Vec::new();
    let mut resources: Vec<ResourceDecl> = Vec::new();

    for def in program.roles() {
        if roles.iter().all(|r| r.name != def.name) {
            roles.push(RoleDecl {
                name: def.name.clone(),
                permissions: def.texts("can"),
                properties: property_map(def),
                line: def.line,
            });
        }
    }
    for def in program.users() {
        if users.iter().all(|u| u.name != def.name) {
            users.push(UserDecl {
                name: def.name.clone(),
                role: def.first_text("role"),
                properties: property_map(def),
                line: def.line,
            });
        }
    }
    for def in program.resources() {
        if resources.iter().all(|r| r.name != def.name) {
            resources.push(ResourceDecl {
                name: def.name.clone(),
                path: def.first_text("path"),
                properties: property_map(def),
                line: def.line,
            });
        }
    }

    let mut policies: Vec<PolicyDecl> = program
        .policies()
        .map(|p| PolicyDecl {
            kind: p.effect,
            actions: p.actions.clone(),
            resource: p.resource.clone(),
            condition: p.condition.as_ref().map(|c| c.to_condition_string()),
            line: Some(p.line),
            synthesized: false,
        })
        .collect();

    if policies.is_empty() && synthesize_role_policies {
        policies = synthesize(&roles, &resources);
        tracing::debug!(count = policies.len(), "synthesized role policies");
    }

    PolicySet::new(roles, users, resources, policies)
}

fn synthesize(roles: &[RoleDecl], resources: &[ResourceDecl]) -> Vec<PolicyDecl> {
    let mut out = Vec::new();
    for role in roles {
        if role.permissions.is_empty() {
            continue;
        }
        let guard = Literal::Str(role.name.clone());
        for resource in resources {
            out.push(PolicyDecl {
                kind: Effect::Allow,
                actions: role.permissions.clone(),
                resource: resource.name.clone(),
                condition: Some(format!("(user.role == {})", guard)),
                line: None,
                synthesized: true,
            });
        }
    }
    out
}
