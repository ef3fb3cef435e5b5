//! CLI integration tests for all subcommands.
//!
//! Uses `assert_cmd` to spawn the `spl` binary and verify
//! exit codes, stdout content, and stderr content.
//!
//! All tests set `current_dir` to the workspace root so that relative
//! paths to the policies/ fixtures resolve correctly.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Locate the workspace root by walking up from CARGO_MANIFEST_DIR.
fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    // crates/cli -> workspace root is two levels up
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

/// Helper: create a Command for the `spl` binary, rooted at workspace.
fn spl() -> Command {
    let mut cmd = cargo_bin_cmd!("spl");
    cmd.current_dir(workspace_root());
    cmd.env_remove("SPL_LOG").env_remove("RUST_LOG");
    cmd
}

/// Compile a fixture and write the IR (or manifest) into `dir`.
fn compile_to(dir: &TempDir, fixture: &str, manifest: bool) -> PathBuf {
    let mut cmd = spl();
    cmd.args(["compile", fixture]);
    if manifest {
        cmd.arg("--manifest");
    }
    let out = cmd.output().expect("run spl compile");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let path = dir.path().join(if manifest { "manifest.json" } else { "ir.json" });
    fs::write(&path, &out.stdout).unwrap();
    path
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    spl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SPL policy language toolchain"));
}

#[test]
fn version_exits_0() {
    spl()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("spl"));
}

// ──────────────────────────────────────────────
// 2. Front end
// ──────────────────────────────────────────────

#[test]
fn tokenize_lists_kinds() {
    spl()
        .args(["tokenize", "policies/scenario_d_syntax.spl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ROLE"))
        .stdout(predicate::str::contains("ASTERISK"));
}

#[test]
fn tokenize_json_is_an_array() {
    let out = spl()
        .args(["--output", "json", "tokenize", "policies/scenario_a_role_only.spl"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let tokens: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(tokens[0]["type"], "ROLE");
    assert_eq!(tokens[0]["line"], 3);
}

#[test]
fn parse_prints_ast() {
    spl()
        .args(["parse", "policies/scenario_b_conflict.spl"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Program("))
        .stdout(predicate::str::contains("Policy(type=DENY"));
}

#[test]
fn parse_error_exits_1_with_line() {
    spl()
        .args(["parse", "policies/scenario_d_syntax.spl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("[ERROR] line 1:"));
}

#[test]
fn check_reports_conflict() {
    spl()
        .args(["check", "policies/scenario_b_conflict.spl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[CONFLICT] ALLOW_DENY_CONFLICT (risk 85)"))
        .stdout(predicate::str::ends_with("ok\n"));
}

#[test]
fn check_guest_delete_fails() {
    spl()
        .args(["check", "policies/scenario_c_guest_delete.spl"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("CRITICAL SECURITY RISK"));
}

#[test]
fn check_json_carries_report() {
    let out = spl()
        .args(["--output", "json", "check", "policies/office.spl"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["report"]["statistics"]["policies_defined"], 5);
    assert_eq!(json["report"]["conflicts"].as_array().unwrap().len(), 2);
}

#[test]
fn compile_emits_ir() {
    let out = spl()
        .args(["compile", "policies/scenario_a_role_only.spl"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let ir: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(ir["metadata"]["version"], "1.0");
    assert_eq!(ir["policies"][0]["condition"], "(user.role == \"Admin\")");
}

#[test]
fn compile_failure_json_diagnostics() {
    spl()
        .args(["--output", "json", "compile", "policies/scenario_c_guest_delete.spl"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("\"success\": false"));
}

#[test]
fn missing_file_exits_1() {
    spl()
        .args(["compile", "policies/does_not_exist.spl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error reading file"));
}

#[test]
fn config_file_switches_to_lenient() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("loose.spl");
    fs::write(&src, "USER u { role: Ghost }\nRESOURCE DB { path: \"/d\" }\n").unwrap();
    let config = dir.path().join("spl.toml");
    fs::write(&config, "undefined_roles = \"lenient\"\n").unwrap();

    spl().arg("check").arg(&src).assert().failure();
    spl()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .arg(&src)
        .assert()
        .success()
        .stdout(predicate::str::contains("[WARNING]"));
}

#[test]
fn bad_config_exits_1() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("spl.toml");
    fs::write(&config, "max_errors = 0\n").unwrap();
    spl()
        .arg("--config")
        .arg(&config)
        .args(["check", "policies/office.spl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error in config"));
}

// ──────────────────────────────────────────────
// 3. IR commands
// ──────────────────────────────────────────────

#[test]
fn validate_compiled_ir() {
    let dir = TempDir::new().unwrap();
    let ir = compile_to(&dir, "policies/office.spl", false);
    spl()
        .arg("validate")
        .arg(&ir)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid ir"));
}

#[test]
fn validate_manifest_and_detect_tampering() {
    let dir = TempDir::new().unwrap();
    let path = compile_to(&dir, "policies/office.spl", true);
    spl()
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid manifest"));

    let mut doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    doc["ir"]["policies"][0]["type"] = serde_json::json!("DENY");
    fs::write(&path, doc.to_string()).unwrap();
    spl()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("etag mismatch"));
}

#[test]
fn validate_rejects_non_ir() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, r#"{"roles": "nope"}"#).unwrap();
    spl()
        .args(["--output", "json", "validate"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"valid\": false"));
}

#[test]
fn eval_from_source_allows_admin() {
    spl()
        .args([
            "eval",
            "policies/scenario_a_role_only.spl",
            "--user",
            "alice",
            "--action",
            "read",
            "--resource",
            "DB",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ALLOW: ALLOW policy matched"))
        .stdout(predicate::str::contains("(synthesized)"));
}

#[test]
fn eval_from_ir_with_context_json() {
    let dir = TempDir::new().unwrap();
    let ir = compile_to(&dir, "policies/office.spl", false);
    let ctx = dir.path().join("ctx.json");
    fs::write(&ctx, r#"{"time": {"hour": 10}, "device": {"trusted": true}}"#).unwrap();

    let out = spl()
        .args(["--output", "json", "eval"])
        .arg(&ir)
        .args(["--user", "bob", "--action", "write", "--resource", "Database", "--audit"])
        .arg("--context")
        .arg(&ctx)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["decision"]["allowed"], true);
    assert_eq!(json["decision"]["decision"], "ALLOW");
    assert_eq!(json["decision"]["evaluation_context"]["time"]["hour"], 10);
    assert_eq!(json["audit"]["user"], "bob");
}

#[test]
fn eval_unknown_user_denies() {
    spl()
        .args([
            "eval",
            "policies/office.spl",
            "--user",
            "mallory",
            "--action",
            "read",
            "--resource",
            "Reports",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("DENY: User 'mallory' not found"));
}

#[test]
fn eval_bad_context_exits_1() {
    let dir = TempDir::new().unwrap();
    let ctx = dir.path().join("ctx.json");
    fs::write(&ctx, r#"{"weather": "sunny"}"#).unwrap();
    spl()
        .args(["eval", "policies/office.spl", "--user", "bob", "--action", "read"])
        .args(["--resource", "Database", "--context"])
        .arg(&ctx)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error in context"));
}

#[test]
fn permissions_lists_role_and_policies() {
    spl()
        .args(["permissions", "policies/office.spl", "--user", "carol"])
        .assert()
        .success()
        .stdout(predicate::str::contains("role: Analyst"))
        .stdout(predicate::str::contains("permissions: read, list"))
        .stdout(predicate::str::contains("applicable policies: 3"));
}

#[test]
fn permissions_unknown_user_exits_1() {
    spl()
        .args(["--output", "json", "permissions", "policies/office.spl", "--user", "zed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""));
}
