//! Compile-time configuration, loadable from TOML.
//!
//! ```toml
//! max_errors = 10
//! undefined_roles = "strict"
//! undefined_resources = "lenient"
//! synthesize_role_policies = true
//! ```

use serde::{Deserialize, Serialize};

/// Default maximum number of syntax errors collected before the parser gives up.
pub const DEFAULT_MAX_ERRORS: usize = 10;

/// Whether an unresolved reference blocks compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Unresolved references are ERROR diagnostics.
    #[default]
    Strict,
    /// Unresolved references are WARNING diagnostics.
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileOptions {
    pub max_errors: usize,
    /// Role names used by USER definitions or compared against `user.role`.
    pub undefined_roles: Strictness,
    /// Plain identifiers used as a policy's resource.
    pub undefined_resources: Strictness,
    /// Generate one ALLOW per role and resource when no policy is declared.
    pub synthesize_role_policies: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            max_errors: DEFAULT_MAX_ERRORS,
            undefined_roles: Strictness::Strict,
            undefined_resources: Strictness::Strict,
            synthesize_role_policies: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("invalid compile options: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid compile options: {0}")]
    Invalid(String),
}

impl CompileOptions {
    /// Parse options from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(src: &str) -> Result<Self, OptionsError> {
        let options: CompileOptions = toml::from_str(src)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.max_errors == 0 {
            return Err(OptionsError::Invalid(
                "max_errors must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let opts = CompileOptions::from_toml_str("").unwrap();
        assert_eq!(opts, CompileOptions::default());
        assert_eq!(opts.max_errors, DEFAULT_MAX_ERRORS);
        assert!(opts.synthesize_role_policies);
    }

    #[test]
    fn lenient_modes_parse() {
        let opts = CompileOptions::from_toml_str(
            "undefined_roles = \"lenient\"\nsynthesize_role_policies = false\n",
        )
        .unwrap();
        assert_eq!(opts.undefined_roles, Strictness::Lenient);
        assert_eq!(opts.undefined_resources, Strictness::Strict);
        assert!(!opts.synthesize_role_policies);
    }

    #[test]
    fn zero_max_errors_rejected() {
        let err = CompileOptions::from_toml_str("max_errors = 0").unwrap_err();
        assert!(matches!(err, OptionsError::Invalid(_)));
    }

    #[test]
    fn unknown_key_rejected() {
        let err = CompileOptions::from_toml_str("strict = true").unwrap_err();
        assert!(matches!(err, OptionsError::Toml(_)));
    }
}
