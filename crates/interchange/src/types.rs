//! Typed structs representing the compiled policy-set IR.
//!
//! These are the only artifacts that outlive a compiler invocation. The
//! policy engine consumes them as-is; the persistence collaborator stores
//! them as JSON. Property values stay as `serde_json::Value` so that the
//! IR does not depend on the compiler's literal representation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// IR format version written into every generated policy set.
pub const IR_VERSION: &str = "1.0";

/// Declared properties of an entity. Every value is normalized to a list,
/// single values become one-element lists.
pub type PropertyMap = BTreeMap<String, Vec<serde_json::Value>>;

/// Whether a policy grants or forbids access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "ALLOW",
            Effect::Deny => "DENY",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Entities ────────────────────────────────────────────────────────

/// A ROLE definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleDecl {
    pub name: String,
    /// The role's `can` set in declaration order; `"*"` means every action.
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub properties: PropertyMap,
    pub line: u32,
}

/// A USER definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDecl {
    pub name: String,
    pub role: Option<String>,
    #[serde(default)]
    pub properties: PropertyMap,
    pub line: u32,
}

/// A RESOURCE definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDecl {
    pub name: String,
    pub path: Option<String>,
    #[serde(default)]
    pub properties: PropertyMap,
    pub line: u32,
}

// ── Policies ────────────────────────────────────────────────────────

/// One ALLOW/DENY rule. `condition` is the normalized infix text of the
/// guard expression, re-parseable by the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecl {
    #[serde(rename = "type")]
    pub kind: Effect,
    pub actions: Vec<String>,
    pub resource: String,
    pub condition: Option<String>,
    /// Source line; `None` for policies synthesized from role definitions.
    pub line: Option<u32>,
    #[serde(default)]
    pub synthesized: bool,
}

impl PolicyDecl {
    /// True when the policy's action set covers `action`.
    pub fn covers_action(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == "*" || a == action)
    }
}

// ── Metadata ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub roles: usize,
    pub users: usize,
    pub resources: usize,
    pub policies: usize,
    #[serde(default)]
    pub synthesized_policies: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub version: String,
    pub counts: Counts,
}

/// A complete compiled policy set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    pub roles: Vec<RoleDecl>,
    pub users: Vec<UserDecl>,
    pub resources: Vec<ResourceDecl>,
    pub policies: Vec<PolicyDecl>,
    pub metadata: Metadata,
}

impl PolicySet {
    /// Assemble a policy set, computing the metadata counts.
    pub fn new(
        roles: Vec<RoleDecl>,
        users: Vec<UserDecl>,
        resources: Vec<ResourceDecl>,
        policies: Vec<PolicyDecl>,
    ) -> Self {
        let counts = Counts {
            roles: roles.len(),
            users: users.len(),
            resources: resources.len(),
            policies: policies.len(),
            synthesized_policies: policies.iter().filter(|p| p.synthesized).count(),
        };
        PolicySet {
            roles,
            users,
            resources,
            policies,
            metadata: Metadata {
                version: IR_VERSION.to_owned(),
                counts,
            },
        }
    }

    /// Serialize to the nested key/value shape handed to persistence.
    pub fn to_value(&self) -> serde_json::Value {
        // Every field is a plain string/number/list/map; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
