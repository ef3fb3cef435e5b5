//! Semantic analysis over a parsed program.
//!
//! Five ordered passes share one [`Analysis`] state:
//!
//! 1. [`collect`] registers definitions in the symbol table and flags duplicates
//! 2. [`validate`] resolves user roles, policy resources, condition role
//!    literals and attribute accesses
//! 3. [`conflicts`] pairs up overlapping policies on the same resource
//! 4. [`security`] flags wildcard, guest-delete and unguarded sensitive grants
//! 5. [`recommend`] turns the findings into review suggestions
//!
//! Analysis never fails; the report's `success` is false iff it holds errors.

mod attributes;
mod collect;
mod conflicts;
mod recommend;
mod security;
mod validate;

use crate::ast::{Definition, PolicyRule, Program};
use crate::error::Diagnostic;
use crate::options::{CompileOptions, Strictness};
use crate::symbols::SymbolTable;
use serde::Serialize;

pub use conflicts::{ConflictType, PolicyConflict};

/// Actions that warrant a guard condition.
pub const SENSITIVE_ACTIONS: [&str; 3] = ["delete", "execute", "update"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub roles_defined: usize,
    pub users_defined: usize,
    pub resources_defined: usize,
    pub policies_defined: usize,
    pub conflicts_found: usize,
    pub undefined_references: usize,
    pub role_references_in_conditions: usize,
    pub security_risks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WildcardGrant {
    pub role: String,
    pub line: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SecurityIssues {
    pub wildcard_permissions: Vec<WildcardGrant>,
    pub guest_delete_permissions: usize,
    pub overly_permissive: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub success: bool,
    pub errors: Vec<Diagnostic>,
    /// WARNING and RISK diagnostics.
    pub warnings: Vec<Diagnostic>,
    pub conflicts: Vec<PolicyConflict>,
    pub statistics: Statistics,
    pub security_issues: SecurityIssues,
    pub recommendations: Vec<String>,
    pub symbol_table: SymbolTable,
}

impl AnalysisReport {
    /// Errors then warnings, each in discovery order.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors.iter().chain(self.warnings.iter())
    }
}

/// Working state threaded through the passes.
struct Analysis<'a> {
    options: &'a CompileOptions,
    symbols: SymbolTable,
    /// First definition of each name; duplicates are reported and dropped.
    roles: Vec<&'a Definition>,
    users: Vec<&'a Definition>,
    resources: Vec<&'a Definition>,
    policies: Vec<&'a PolicyRule>,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    conflicts: Vec<PolicyConflict>,
    security: SecurityIssues,
    undefined_references: usize,
    role_references: usize,
    recommendations: Vec<String>,
}

impl<'a> Analysis<'a> {
    fn new(options: &'a CompileOptions) -> Self {
        Analysis {
            options,
            symbols: SymbolTable::new(),
            roles: Vec::new(),
            users: Vec::new(),
            resources: Vec::new(),
            policies: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            conflicts: Vec::new(),
            security: SecurityIssues::default(),
            undefined_references: 0,
            role_references: 0,
            recommendations: Vec::new(),
        }
    }

    fn unresolved(&mut self, mode: Strictness, line: u32, message: String) {
        self.undefined_references += 1;
        match mode {
            Strictness::Strict => self.errors.push(Diagnostic::error(line, message)),
            Strictness::Lenient => self.warnings.push(Diagnostic::warning(line, message)),
        }
    }

    fn into_report(self) -> AnalysisReport {
        let statistics = Statistics {
            roles_defined: self.roles.len(),
            users_defined: self.users.len(),
            resources_defined: self.resources.len(),
            policies_defined: self.policies.len(),
            conflicts_found: self.conflicts.len(),
            undefined_references: self.undefined_references,
            role_references_in_conditions: self.role_references,
            security_risks: self.security.wildcard_permissions.len()
                + self.security.guest_delete_permissions,
        };
        AnalysisReport {
            success: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
            conflicts: self.conflicts,
            statistics,
            security_issues: self.security,
            recommendations: self.recommendations,
            symbol_table: self.symbols,
        }
    }
}

/// Run every pass over `program`.
pub fn analyze(program: &Program, options: &CompileOptions) -> AnalysisReport {
    let mut a = Analysis::new(options);
    collect::run(&mut a, program);
    validate::run(&mut a);
    conflicts::run(&mut a);
    security::run(&mut a);
    recommend::run(&mut a);

    tracing::debug!(
        errors = a.errors.len(),
        warnings = a.warnings.len(),
        conflicts = a.conflicts.len(),
        "semantic analysis finished"
    );
    a.into_report()
}
