//! End-to-end compilation of the fixtures in policies/.

use proptest::prelude::*;
use spl_core::{compile, CompileOptions, ConflictType, Severity, Stage, Strictness};
use std::path::Path;

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../policies")
        .join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e))
}

#[test]
fn role_only_program_synthesizes_wildcard_grant() {
    let out = compile(&fixture("scenario_a_role_only.spl"), &CompileOptions::default());
    assert!(out.success(), "{:?}", out.diagnostics);
    let ir = out.ir.unwrap();
    assert_eq!(ir.policies.len(), 1);
    let p = &ir.policies[0];
    assert_eq!(p.actions, vec!["*"]);
    assert_eq!(p.resource, "DB");
    assert_eq!(p.condition.as_deref(), Some("(user.role == \"Admin\")"));
    assert!(p.synthesized);
}

#[test]
fn allow_deny_conflict_is_reported_but_compiles() {
    let out = compile(&fixture("scenario_b_conflict.spl"), &CompileOptions::default());
    assert!(out.success(), "{:?}", out.diagnostics);
    let report = out.report.unwrap();
    assert_eq!(report.conflicts.len(), 1);
    let c = &report.conflicts[0];
    assert_eq!(c.conflict_type, ConflictType::AllowDenyConflict);
    assert_eq!(c.risk_score, 85);
    assert_eq!((c.policy1_line, c.policy2_line), (7, 8));
    assert_eq!(report.statistics.conflicts_found, 1);
}

#[test]
fn guest_delete_blocks_generation() {
    let out = compile(&fixture("scenario_c_guest_delete.spl"), &CompileOptions::default());
    assert!(!out.success());
    assert!(out.ir.is_none());
    let report = out.report.as_ref().unwrap();
    assert!(!report.success);
    let critical = out.errors().next().unwrap();
    assert_eq!(critical.line, 7);
    assert!(critical.message.starts_with("CRITICAL SECURITY RISK"));
}

#[test]
fn missing_colon_yields_no_ast() {
    let out = compile(&fixture("scenario_d_syntax.spl"), &CompileOptions::default());
    assert!(out.ast_text.is_none());
    assert!(out.report.is_none());
    assert!(!out.diagnostics.is_empty());
    let first = &out.diagnostics[0];
    assert_eq!(first.stage, Stage::Syntax);
    assert_eq!(first.severity, Severity::Error);
    assert_eq!(first.line, 1);
}

#[test]
fn office_example_compiles_with_conflicts() {
    let out = compile(&fixture("office.spl"), &CompileOptions::default());
    assert!(out.success(), "{:?}", out.diagnostics);
    let report = out.report.as_ref().unwrap();
    assert_eq!(report.statistics.roles_defined, 3);
    assert_eq!(report.statistics.users_defined, 3);
    assert_eq!(report.statistics.resources_defined, 2);
    assert_eq!(report.statistics.policies_defined, 5);
    assert_eq!(report.conflicts.len(), 2);
    assert!(report
        .conflicts
        .iter()
        .all(|c| c.conflict_type == ConflictType::AllowDenyConflict));
    let ir = out.ir.unwrap();
    assert_eq!(ir.metadata.counts.synthesized_policies, 0);
    assert_eq!(
        ir.policies[0].condition.as_deref(),
        Some("(((user.role == \"Developer\") AND (time.hour >= 9)) AND (time.hour < 18))")
    );
}

#[test]
fn token_listing_uses_kind_names() {
    let out = compile(&fixture("scenario_d_syntax.spl"), &CompileOptions::default());
    let kinds: Vec<_> = out.tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec!["ROLE", "IDENTIFIER", "LBRACE", "CAN", "ASTERISK", "RBRACE"]
    );
    assert_eq!(out.tokens[1].value, "Admin");
}

#[test]
fn compilation_is_deterministic() {
    let src = fixture("office.spl");
    let a = compile(&src, &CompileOptions::default());
    let b = compile(&src, &CompileOptions::default());
    assert_eq!(a.ir.unwrap().to_value(), b.ir.unwrap().to_value());
    assert_eq!(a.ast_text, b.ast_text);
}

#[test]
fn lenient_options_downgrade_undefined_references() {
    let src = "USER u { role: Ghost }\nRESOURCE DB { path: \"/d\" }\nALLOW action: read ON RESOURCE: Nowhere";
    let strict = compile(src, &CompileOptions::default());
    assert!(!strict.success());
    assert_eq!(strict.errors().count(), 2);

    let options = CompileOptions {
        undefined_roles: Strictness::Lenient,
        undefined_resources: Strictness::Lenient,
        ..CompileOptions::default()
    };
    let lenient = compile(src, &options);
    assert!(lenient.success(), "{:?}", lenient.diagnostics);
    assert_eq!(lenient.report.unwrap().statistics.undefined_references, 2);
}

#[test]
fn options_load_from_toml() {
    let options = CompileOptions::from_toml_str(
        "max_errors = 3\nundefined_roles = \"lenient\"\nsynthesize_role_policies = false\n",
    )
    .unwrap();
    let out = compile(&fixture("scenario_a_role_only.spl"), &options);
    assert!(out.ir.unwrap().policies.is_empty());
}

proptest! {
    #[test]
    fn compile_never_panics(src in "\\PC{0,200}") {
        let out = compile(&src, &CompileOptions::default());
        prop_assert_eq!(out.success(), out.errors().next().is_none() && out.ir.is_some());
    }

    #[test]
    fn lexer_reports_every_illegal_character(junk in "[@#$%^&|~`?;]{1,20}") {
        let (tokens, diagnostics) = spl_core::lex(&junk);
        prop_assert_eq!(diagnostics.len(), junk.chars().count());
        prop_assert_eq!(tokens.len(), 1);
    }
}
