//! Deserialization from IR JSON documents into typed structs.
//!
//! The main entry point is [`from_interchange`], which takes a
//! `&serde_json::Value` and produces a [`PolicySet`].

use crate::types::*;

/// Errors during IR deserialization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterchangeError {
    /// The document is missing a required top-level field.
    #[error("policy set missing required field: '{field}'")]
    MissingField { field: String },
    /// The document declares an IR version this crate does not read.
    #[error("unsupported IR version '{found}' (expected '{}')", IR_VERSION)]
    UnsupportedVersion { found: String },
    /// An entry in one of the entity or policy lists is malformed.
    #[error("{section}[{index}]: {message}")]
    Malformed {
        section: String,
        index: usize,
        message: String,
    },
}

const SECTIONS: [&str; 4] = ["roles", "users", "resources", "policies"];

/// Deserialize an IR JSON document into a [`PolicySet`].
///
/// `metadata` is optional; when present its `version` must match
/// [`IR_VERSION`]. Counts are always recomputed from the entity lists.
pub fn from_interchange(doc: &serde_json::Value) -> Result<PolicySet, InterchangeError> {
    for section in SECTIONS {
        if !doc.get(section).is_some_and(|v| v.is_array()) {
            return Err(InterchangeError::MissingField {
                field: section.to_string(),
            });
        }
    }

    if let Some(version) = doc.get("metadata").and_then(|m| m.get("version")) {
        let found = version.as_str().unwrap_or_default();
        if found != IR_VERSION {
            return Err(InterchangeError::UnsupportedVersion {
                found: found.to_string(),
            });
        }
    }

    let roles: Vec<RoleDecl> = parse_section(doc, "roles")?;
    let users: Vec<UserDecl> = parse_section(doc, "users")?;
    let resources: Vec<ResourceDecl> = parse_section(doc, "resources")?;
    let policies: Vec<PolicyDecl> = parse_section(doc, "policies")?;

    Ok(PolicySet::new(roles, users, resources, policies))
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn parse_section<T: serde::de::DeserializeOwned>(
    doc: &serde_json::Value,
    section: &str,
) -> Result<Vec<T>, InterchangeError> {
    let entries = doc
        .get(section)
        .and_then(|v| v.as_array())
        .ok_or_else(|| InterchangeError::MissingField {
            field: section.to_string(),
        })?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            T::deserialize(entry).map_err(|e| InterchangeError::Malformed {
                section: section.to_string(),
                index,
                message: e.to_string(),
            })
        })
        .collect()
}
