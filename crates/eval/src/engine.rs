//! The policy engine: an immutable index over one compiled policy set.
//!
//! Evaluation combines every matching policy with deny-overrides: any
//! matching DENY wins, otherwise any matching ALLOW, otherwise the default
//! is DENY. Business-level misses (unknown user, resource or role) and
//! condition failures all produce a DENY decision, never an error.

use crate::condition::{self, EvalError};
use crate::context::{AccessContext, EvaluationContext};
use serde::Serialize;
use spl_core::ast::Expr;
use spl_interchange::{
    from_interchange, Effect, InterchangeError, PolicyDecl, PolicySet, ResourceDecl, RoleDecl,
    UserDecl,
};
use std::collections::HashMap;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

// ── Decisions ───────────────────────────────────────────────────────

/// A policy that matched a request, as reported in a [`Decision`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedPolicy {
    #[serde(rename = "type")]
    pub kind: Effect,
    pub actions: Vec<String>,
    pub resource: String,
    pub condition: Option<String>,
    pub line: Option<u32>,
}

impl From<&PolicyDecl> for MatchedPolicy {
    fn from(p: &PolicyDecl) -> Self {
        MatchedPolicy {
            kind: p.kind,
            actions: p.actions.clone(),
            resource: p.resource.clone(),
            condition: p.condition.clone(),
            line: p.line,
        }
    }
}

/// The outcome of one access check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub decision: Effect,
    /// Human-readable explanation of why this decision was made.
    pub reason: String,
    pub matched_policies: Vec<MatchedPolicy>,
    /// Absent when the request was rejected before evaluation.
    pub evaluation_context: Option<EvaluationContext>,
    pub user: String,
    pub action: String,
    pub resource: String,
}

impl Decision {
    fn deny_early(user: &str, action: &str, resource: &str, reason: String) -> Self {
        Decision {
            allowed: false,
            decision: Effect::Deny,
            reason,
            matched_policies: Vec::new(),
            evaluation_context: None,
            user: user.to_owned(),
            action: action.to_owned(),
            resource: resource.to_owned(),
        }
    }
}

/// What a user could be granted, without evaluating any request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermissionView {
    pub username: String,
    pub role: Option<String>,
    /// The role's declared `can` set; empty when the role is unknown.
    pub role_permissions: Vec<String>,
    /// Every policy that is unconditioned or whose condition reads
    /// `user.role`. A superset of what can apply to this user.
    pub applicable_policies: Vec<PolicyDecl>,
}

/// The record handed to the audit log for one decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub user: String,
    pub action: String,
    pub resource: String,
    pub allowed: bool,
    pub reason: String,
}

impl AuditRecord {
    pub fn from_decision(decision: &Decision, at: OffsetDateTime) -> Self {
        AuditRecord {
            timestamp: at.format(&Rfc3339).unwrap_or_else(|_| at.to_string()),
            user: decision.user.clone(),
            action: decision.action.clone(),
            resource: decision.resource.clone(),
            allowed: decision.allowed,
            reason: decision.reason.clone(),
        }
    }
}

// ── Engine ──────────────────────────────────────────────────────────

/// A policy with its condition parsed once at load time.
#[derive(Debug, Clone)]
struct LoadedPolicy {
    decl: PolicyDecl,
    /// `Ok(None)` for unconditioned policies; `Err` when the IR text does
    /// not parse, in which case the policy never matches.
    condition: Result<Option<Expr>, EvalError>,
}

impl LoadedPolicy {
    fn load(decl: PolicyDecl) -> Self {
        let condition = match decl.condition.as_deref() {
            None => Ok(None),
            Some(text) => spl_core::parse_condition(text).map(Some).map_err(|diags| {
                let message = diags
                    .iter()
                    .map(|d| d.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                tracing::warn!(condition = text, %message, "policy condition does not parse");
                EvalError::Malformed { message }
            }),
        };
        LoadedPolicy { decl, condition }
    }

    fn applies_to(&self, action: &str, resource: &ResourceDecl) -> bool {
        resource_matches(&self.decl.resource, resource) && self.decl.covers_action(action)
    }

    fn holds(&self, ctx: &EvaluationContext) -> bool {
        match &self.condition {
            Ok(None) => true,
            Ok(Some(expr)) => condition::holds(expr, ctx),
            Err(_) => false,
        }
    }
}

/// Immutable, indexed view of one compiled policy set.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    set: PolicySet,
    roles: HashMap<String, usize>,
    users: HashMap<String, usize>,
    resources: HashMap<String, usize>,
    policies: Vec<LoadedPolicy>,
}

impl PolicyEngine {
    /// Index `set` for evaluation. The first entity of each name wins.
    pub fn load(set: PolicySet) -> Self {
        fn index<T>(items: &[T], name: impl Fn(&T) -> &str) -> HashMap<String, usize> {
            let mut map = HashMap::new();
            for (i, item) in items.iter().enumerate() {
                map.entry(name(item).to_owned()).or_insert(i);
            }
            map
        }
        let roles = index(&set.roles, |r: &RoleDecl| r.name.as_str());
        let users = index(&set.users, |u: &UserDecl| u.name.as_str());
        let resources = index(&set.resources, |r: &ResourceDecl| r.name.as_str());
        let policies = set.policies.iter().cloned().map(LoadedPolicy::load).collect();
        tracing::info!(
            roles = set.roles.len(),
            users = set.users.len(),
            resources = set.resources.len(),
            policies = set.policies.len(),
            "policy engine loaded"
        );
        PolicyEngine {
            set,
            roles,
            users,
            resources,
            policies,
        }
    }

    /// Load from IR JSON. This is the only fallible way to build an engine.
    pub fn from_json(doc: &serde_json::Value) -> Result<Self, InterchangeError> {
        Ok(PolicyEngine::load(from_interchange(doc)?))
    }

    pub fn policy_set(&self) -> &PolicySet {
        &self.set
    }

    pub fn user(&self, name: &str) -> Option<&UserDecl> {
        self.users.get(name).map(|&i| &self.set.users[i])
    }

    pub fn role(&self, name: &str) -> Option<&RoleDecl> {
        self.roles.get(name).map(|&i| &self.set.roles[i])
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceDecl> {
        self.resources.get(name).map(|&i| &self.set.resources[i])
    }

    /// Decide whether `username` may perform `action` on `resource_name`,
    /// using the current UTC time for unset time fields.
    pub fn check_access(
        &self,
        username: &str,
        action: &str,
        resource_name: &str,
        context: &AccessContext,
    ) -> Decision {
        self.check_access_at(username, action, resource_name, context, OffsetDateTime::now_utc())
    }

    /// [`check_access`](Self::check_access) with an explicit clock.
    pub fn check_access_at(
        &self,
        username: &str,
        action: &str,
        resource_name: &str,
        context: &AccessContext,
        now: OffsetDateTime,
    ) -> Decision {
        let decision = self.decide(username, action, resource_name, context, now);
        tracing::info!(
            user = username,
            action,
            resource = resource_name,
            decision = %decision.decision,
            matched = decision.matched_policies.len(),
            "access decision"
        );
        decision
    }

    fn decide(
        &self,
        username: &str,
        action: &str,
        resource_name: &str,
        context: &AccessContext,
        now: OffsetDateTime,
    ) -> Decision {
        let deny = |reason: String| Decision::deny_early(username, action, resource_name, reason);

        let Some(user) = self.user(username) else {
            return deny(format!("User '{}' not found", username));
        };
        let Some(resource) = self.resource(resource_name) else {
            return deny(format!("Resource '{}' not found", resource_name));
        };
        let Some(role) = user.role.as_deref().filter(|r| !r.is_empty()) else {
            return deny(format!("User '{}' has no role assigned", username));
        };
        if self.role(role).is_none() {
            return deny(format!(
                "Role '{}' assigned to user '{}' not found",
                role, username
            ));
        }

        let ctx = EvaluationContext::build(user, role, resource, context, now);
        let action = action.to_lowercase();

        let mut matched = Vec::new();
        let mut deny_found = false;
        let mut allow_found = false;
        for policy in &self.policies {
            if !policy.applies_to(&action, resource) || !policy.holds(&ctx) {
                continue;
            }
            match policy.decl.kind {
                Effect::Deny => deny_found = true,
                Effect::Allow => allow_found = true,
            }
            matched.push(MatchedPolicy::from(&policy.decl));
        }

        // DENY overrides ALLOW
        let (decision, reason) = if deny_found {
            (Effect::Deny, "Explicit DENY policy matched")
        } else if allow_found {
            (Effect::Allow, "ALLOW policy matched")
        } else {
            (Effect::Deny, "No matching policies (default deny)")
        };
        Decision {
            allowed: decision == Effect::Allow,
            decision,
            reason: reason.to_owned(),
            matched_policies: matched,
            evaluation_context: Some(ctx),
            user: username.to_owned(),
            action,
            resource: resource_name.to_owned(),
        }
    }

    /// The user's role, its capabilities and the policies that could apply
    /// to them. `None` when the user is unknown.
    pub fn get_user_permissions(&self, username: &str) -> Option<PermissionView> {
        let user = self.user(username)?;
        let role_permissions = user
            .role
            .as_deref()
            .and_then(|r| self.role(r))
            .map(|r| r.permissions.clone())
            .unwrap_or_default();
        let applicable_policies = self
            .policies
            .iter()
            .filter(|p| match &p.condition {
                Ok(None) => true,
                Ok(Some(expr)) => expr.references_user_role(),
                Err(_) => p
                    .decl
                    .condition
                    .as_deref()
                    .is_some_and(|c| c.contains("user.role")),
            })
            .map(|p| p.decl.clone())
            .collect();
        Some(PermissionView {
            username: username.to_owned(),
            role: user.role.clone(),
            role_permissions,
            applicable_policies,
        })
    }

    /// Audit record for `decision`, stamped with the current UTC time.
    pub fn audit(&self, decision: &Decision) -> AuditRecord {
        AuditRecord::from_decision(decision, OffsetDateTime::now_utc())
    }
}

/// A policy resource spec matches a resource by exact name or by a `*`
/// glob over the name. Specs starting with `/` are matched against the
/// resource's path instead.
pub fn resource_matches(spec: &str, resource: &ResourceDecl) -> bool {
    if spec.starts_with('/') {
        return resource
            .path
            .as_deref()
            .is_some_and(|path| glob_matches(spec, path));
    }
    spec == resource.name || glob_matches(spec, &resource.name)
}

/// Anchored glob where `*` matches zero or more characters.
///
/// Two cursors plus the most recent `*` and the value offset it is
/// currently absorbing up to; on a mismatch the star takes one more byte.
/// Runs in O(pattern x value) worst case with no recursion.
fn glob_matches(pattern: &str, value: &str) -> bool {
    let (pattern, value) = (pattern.as_bytes(), value.as_bytes());
    let (mut p, mut v) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while v < value.len() {
        match pattern.get(p) {
            Some(b'*') => {
                star = Some((p, v));
                p += 1;
            }
            Some(&c) if c == value[v] => {
                p += 1;
                v += 1;
            }
            _ => match star {
                Some((sp, sv)) => {
                    star = Some((sp, sv + 1));
                    p = sp + 1;
                    v = sv + 1;
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == b'*')
}
