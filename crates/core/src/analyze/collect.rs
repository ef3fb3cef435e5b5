//! Pass 1: register every definition and detect duplicate names per kind.

use super::{Analysis, WildcardGrant};
use crate::ast::{Definition, Program, Statement};
use crate::error::Diagnostic;
use crate::symbols::{Symbol, SymbolKind};
use std::collections::BTreeMap;

pub(super) fn run<'a>(a: &mut Analysis<'a>, program: &'a Program) {
    for stmt in &program.statements {
        match stmt {
            Statement::Role(def) => {
                if register(a, def, SymbolKind::Role, "role") {
                    a.roles.push(def);
                    if def.texts("can").iter().any(|p| p == "*") {
                        a.security.wildcard_permissions.push(WildcardGrant {
                            role: def.name.clone(),
                            line: def.line,
                        });
                    }
                }
            }
            Statement::User(def) => {
                if register(a, def, SymbolKind::User, "user") {
                    a.users.push(def);
                }
            }
            Statement::Resource(def) => {
                if register(a, def, SymbolKind::Resource, "resource") {
                    a.resources.push(def);
                }
            }
            Statement::Policy(rule) => a.policies.push(rule),
        }
    }
}

/// Define `def` in the global scope. Returns false (after reporting) on a duplicate.
fn register(a: &mut Analysis<'_>, def: &Definition, kind: SymbolKind, label: &str) -> bool {
    let attributes: BTreeMap<String, serde_json::Value> = def
        .properties
        .iter()
        .map(|(k, vals)| {
            let json: Vec<serde_json::Value> = vals.iter().map(|v| v.to_json()).collect();
            (k.clone(), serde_json::Value::Array(json))
        })
        .collect();
    let symbol = Symbol::new(&def.name, kind, def.line).with_attributes(attributes);
    match a.symbols.define(symbol) {
        Ok(()) => true,
        Err(first) => {
            a.errors.push(Diagnostic::error(
                def.line,
                format!(
                    "Duplicate {} definition: '{}' (first declared at line {})",
                    label, def.name, first.line
                ),
            ));
            false
        }
    }
}
