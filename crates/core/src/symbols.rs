//! Scoped symbol table.
//!
//! Scopes form a chain through parent links. The global scope (level 0)
//! is seeded with the built-in attribute namespaces as `Variable`
//! symbols whose `fields` attribute lists the readable fields. Scopes are
//! kept after they are exited so the whole table can be dumped.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Built-in attribute namespaces and their fields.
pub const NAMESPACES: [(&str, &[&str]); 5] = [
    (
        "user",
        &["role", "name", "id", "department", "clearance", "location"],
    ),
    ("time", &["hour", "minute", "day", "month", "year", "weekday", "date"]),
    (
        "request",
        &["ip", "method", "path", "headers", "user_agent"],
    ),
    ("resource", &["path", "type", "owner", "sensitivity"]),
    (
        "device",
        &["type", "id", "os", "browser", "location", "trusted"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SymbolKind {
    Role,
    User,
    Resource,
    Variable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub line: u32,
    pub scope_level: usize,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, line: u32) -> Self {
        Symbol {
            name: name.into(),
            kind,
            attributes: BTreeMap::new(),
            line,
            scope_level: 0,
        }
    }

    pub fn with_attributes(mut self, attributes: BTreeMap<String, serde_json::Value>) -> Self {
        self.attributes = attributes;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Scope {
    pub name: String,
    pub level: usize,
    pub parent: Option<usize>,
    pub symbols: Vec<Symbol>,
    #[serde(skip)]
    index: HashMap<(SymbolKind, String), usize>,
}

impl Scope {
    fn new(name: &str, level: usize, parent: Option<usize>) -> Self {
        Scope {
            name: name.to_owned(),
            level,
            parent,
            symbols: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn get(&self, kind: SymbolKind, name: &str) -> Option<&Symbol> {
        self.index
            .get(&(kind, name.to_owned()))
            .map(|&i| &self.symbols[i])
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    #[serde(skip)]
    current: usize,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = SymbolTable {
            scopes: vec![Scope::new("global", 0, None)],
            current: 0,
        };
        for (namespace, fields) in NAMESPACES {
            let mut attrs = BTreeMap::new();
            attrs.insert("fields".to_owned(), serde_json::json!(fields));
            let sym = Symbol::new(namespace, SymbolKind::Variable, 0).with_attributes(attrs);
            // The global scope starts empty; seeding cannot collide.
            let _ = table.define(sym);
        }
        table
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn current_level(&self) -> usize {
        self.scopes[self.current].level
    }

    /// Open a child scope of the current one and make it current.
    pub fn enter_scope(&mut self, name: &str) -> usize {
        let level = self.current_level() + 1;
        self.scopes
            .push(Scope::new(name, level, Some(self.current)));
        self.current = self.scopes.len() - 1;
        self.current
    }

    /// Return to the parent scope. The global scope is never exited.
    pub fn exit_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current].parent {
            self.current = parent;
        }
    }

    /// Bind `symbol` in the current scope. On a name clash within the same
    /// scope and kind, returns the existing binding and leaves it in place.
    pub fn define(&mut self, mut symbol: Symbol) -> Result<(), Symbol> {
        let level = self.current_level();
        let scope = &mut self.scopes[self.current];
        let key = (symbol.kind, symbol.name.clone());
        if let Some(&existing) = scope.index.get(&key) {
            return Err(scope.symbols[existing].clone());
        }
        symbol.scope_level = level;
        scope.index.insert(key, scope.symbols.len());
        scope.symbols.push(symbol);
        Ok(())
    }

    /// Look up a binding, walking outward through enclosing scopes.
    pub fn resolve(&self, kind: SymbolKind, name: &str) -> Option<&Symbol> {
        let mut idx = Some(self.current);
        while let Some(i) = idx {
            let scope = &self.scopes[i];
            if let Some(sym) = scope.get(kind, name) {
                return Some(sym);
            }
            idx = scope.parent;
        }
        None
    }

    /// Fields readable on a namespace, if `object` names one in scope.
    pub fn namespace_fields(&self, object: &str) -> Option<Vec<&str>> {
        let sym = self.resolve(SymbolKind::Variable, object)?;
        let fields = sym.attributes.get("fields")?.as_array()?;
        Some(fields.iter().filter_map(|f| f.as_str()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_namespaces_are_seeded() {
        let table = SymbolTable::new();
        let globals = &table.scopes()[0].symbols;
        assert_eq!(globals.len(), 5);
        assert!(globals.iter().all(|s| s.kind == SymbolKind::Variable));
        let fields = table.namespace_fields("device").unwrap();
        assert!(fields.contains(&"trusted"));
        assert!(table.namespace_fields("session").is_none());
    }

    #[test]
    fn duplicate_in_same_scope_returns_first() {
        let mut table = SymbolTable::new();
        table
            .define(Symbol::new("Admin", SymbolKind::Role, 3))
            .unwrap();
        let first = table
            .define(Symbol::new("Admin", SymbolKind::Role, 9))
            .unwrap_err();
        assert_eq!(first.line, 3);
        // Same name, different kind is fine.
        table
            .define(Symbol::new("Admin", SymbolKind::User, 10))
            .unwrap();
    }

    #[test]
    fn nested_scope_resolves_outward_and_shadows() {
        let mut table = SymbolTable::new();
        table.define(Symbol::new("DB", SymbolKind::Resource, 1)).unwrap();
        table.enter_scope("policy@4");
        assert_eq!(table.current_level(), 1);
        assert!(table.scopes()[1].symbols.is_empty());
        assert_eq!(table.resolve(SymbolKind::Resource, "DB").unwrap().line, 1);

        table.define(Symbol::new("DB", SymbolKind::Resource, 4)).unwrap();
        let inner = table.resolve(SymbolKind::Resource, "DB").unwrap();
        assert_eq!((inner.line, inner.scope_level), (4, 1));

        table.exit_scope();
        assert_eq!(table.resolve(SymbolKind::Resource, "DB").unwrap().line, 1);
        table.exit_scope();
        assert_eq!(table.current_level(), 0);
        assert_eq!(table.scopes().len(), 2);
    }
}
