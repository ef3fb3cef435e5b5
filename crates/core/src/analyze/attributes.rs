//! Attribute-access checks inside conditions. Unknown namespaces and
//! fields are warnings only; at runtime they make the condition false.

use super::Analysis;
use crate::ast::{Expr, PolicyRule};
use crate::error::Diagnostic;
use crate::symbols::{Symbol, SymbolKind, NAMESPACES};
use std::collections::BTreeMap;

/// Shadow the `resource` namespace in the current (policy) scope with one
/// that also exposes the targeted resource's own property names.
pub(super) fn bind_policy_resource(a: &mut Analysis<'_>, policy: &PolicyRule) {
    let Some(def) = a
        .resources
        .iter()
        .find(|r| r.name == policy.resource)
        .copied()
    else {
        return;
    };
    let mut fields: Vec<String> = NAMESPACES
        .iter()
        .find(|(ns, _)| *ns == "resource")
        .map(|(_, f)| f.iter().map(|s| s.to_string()).collect())
        .unwrap_or_default();
    fields.push("name".to_owned());
    for key in def.properties.keys() {
        if !fields.contains(key) {
            fields.push(key.clone());
        }
    }
    let mut attrs = BTreeMap::new();
    attrs.insert("fields".to_owned(), serde_json::json!(fields));
    attrs.insert("resource".to_owned(), serde_json::json!(def.name));
    let sym = Symbol::new("resource", SymbolKind::Variable, policy.line).with_attributes(attrs);
    // Fresh scope per policy; nothing else is bound in it.
    let _ = a.symbols.define(sym);
}

pub(super) fn check_condition(a: &mut Analysis<'_>, cond: &Expr) {
    let mut accesses = Vec::new();
    cond.walk(&mut |e| {
        if let Expr::Attribute {
            object,
            field,
            line,
        } = e
        {
            accesses.push((object.as_str(), field.as_str(), *line));
        }
    });

    for (object, field, line) in accesses {
        match a.symbols.namespace_fields(object) {
            None => a.warnings.push(Diagnostic::warning(
                line,
                format!("Unknown object in attribute access: '{}'", object),
            )),
            Some(fields) if !fields.contains(&field) => a.warnings.push(Diagnostic::warning(
                line,
                format!("Unknown attribute '{}' on object '{}'", field, object),
            )),
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::analyze::tests::analyze_src;

    const PRELUDE: &str = "ROLE Admin { can: read }\nRESOURCE DB { path: \"/d\", classification: \"secret\" }\n";

    fn warnings_for(condition: &str) -> Vec<String> {
        let src = format!(
            "{}ALLOW action: read ON RESOURCE: DB IF ({})",
            PRELUDE, condition
        );
        analyze_src(&src)
            .warnings
            .into_iter()
            .map(|w| w.message)
            .collect()
    }

    #[test]
    fn known_attributes_pass() {
        assert!(warnings_for("time.hour >= 9 AND device.trusted == true AND request.method == \"GET\"").is_empty());
    }

    #[test]
    fn unknown_field_on_known_object() {
        assert_eq!(
            warnings_for("user.shoe_size > 9"),
            vec!["Unknown attribute 'shoe_size' on object 'user'"]
        );
    }

    #[test]
    fn unknown_object() {
        assert_eq!(
            warnings_for("session.id == \"x\""),
            vec!["Unknown object in attribute access: 'session'"]
        );
    }

    #[test]
    fn targeted_resource_properties_are_readable() {
        assert!(warnings_for("resource.classification == \"secret\" AND resource.name == \"DB\"").is_empty());
        assert_eq!(
            warnings_for("resource.colour == \"red\""),
            vec!["Unknown attribute 'colour' on object 'resource'"]
        );
    }
}
