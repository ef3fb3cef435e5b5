mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use spl_core::{CompileOptions, Diagnostic};
use spl_eval::{AccessContext, PolicyEngine};
use spl_interchange::PolicySet;
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// SPL policy language toolchain.
#[derive(Parser)]
#[command(name = "spl", version, about = "SPL policy language toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// TOML file with compile options (max_errors, undefined_roles, ...)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tokens of a .spl file
    Tokenize {
        /// Path to the .spl source file
        file: PathBuf,
    },

    /// Parse a .spl file and print its AST
    Parse {
        /// Path to the .spl source file
        file: PathBuf,
    },

    /// Run semantic analysis on a .spl file and report findings
    Check {
        /// Path to the .spl source file
        file: PathBuf,
    },

    /// Compile a .spl file to policy-set IR JSON
    Compile {
        /// Path to the .spl source file
        file: PathBuf,
        /// Wrap the IR in a manifest envelope with a content etag
        #[arg(long)]
        manifest: bool,
    },

    /// Validate IR JSON (or a manifest) against the IR JSON Schema
    Validate {
        /// Path to the IR JSON file
        ir: PathBuf,
    },

    /// Decide one access request
    Eval {
        /// Policy source: a .spl file, IR JSON or a manifest
        policy: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long)]
        action: String,
        #[arg(long)]
        resource: String,
        /// Path to a JSON file with optional time/request/device groups
        #[arg(long)]
        context: Option<PathBuf>,
        /// Include the audit record in the output
        #[arg(long)]
        audit: bool,
    },

    /// Show a user's role, capabilities and potentially applicable policies
    Permissions {
        /// Policy source: a .spl file, IR JSON or a manifest
        policy: PathBuf,
        #[arg(long)]
        user: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let options = load_options(cli.config.as_deref(), cli.output, cli.quiet);

    match cli.command {
        Commands::Tokenize { file } => cmd_tokenize(&file, cli.output, cli.quiet),
        Commands::Parse { file } => cmd_parse(&file, &options, cli.output, cli.quiet),
        Commands::Check { file } => cmd_check(&file, &options, cli.output, cli.quiet),
        Commands::Compile { file, manifest } => {
            cmd_compile(&file, manifest, &options, cli.output, cli.quiet)
        }
        Commands::Validate { ir } => cmd_validate(&ir, cli.output, cli.quiet),
        Commands::Eval {
            policy,
            user,
            action,
            resource,
            context,
            audit,
        } => cmd_eval(
            &policy,
            EvalRequest {
                user: &user,
                action: &action,
                resource: &resource,
                context: context.as_deref(),
                audit,
            },
            &options,
            cli.output,
            cli.quiet,
        ),
        Commands::Permissions { policy, user } => {
            cmd_permissions(&policy, &user, &options, cli.output, cli.quiet)
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable. `SPL_LOG` takes
/// precedence over `RUST_LOG`; the default level is `warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("SPL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_options(path: Option<&Path>, output: OutputFormat, quiet: bool) -> CompileOptions {
    let Some(path) = path else {
        return CompileOptions::default();
    };
    let src = read_file(path, output, quiet);
    match CompileOptions::from_toml_str(&src) {
        Ok(options) => {
            tracing::debug!(config = %path.display(), ?options, "loaded compile options");
            options
        }
        Err(e) => {
            let msg = format!("error in config '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

fn read_file(path: &Path, output: OutputFormat, quiet: bool) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

fn read_json(path: &Path, output: OutputFormat, quiet: bool) -> serde_json::Value {
    let src = read_file(path, output, quiet);
    match serde_json::from_str(&src) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("error parsing JSON in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    let pretty = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("serialization error: {}", e));
    println!("{}", pretty);
}

/// Print diagnostics to stderr: one line each in text mode, a JSON
/// object in json mode. Text output is suppressed by `--quiet`.
fn report_diagnostics(diagnostics: &[Diagnostic], output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Text => {
            if !quiet {
                for d in diagnostics {
                    eprintln!("{}", d);
                }
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({ "success": false, "diagnostics": diagnostics });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
}

// ──────────────────────────────────────────────
// Front-end commands
// ──────────────────────────────────────────────

fn cmd_tokenize(file: &Path, output: OutputFormat, quiet: bool) {
    let src = read_file(file, output, quiet);
    let (tokens, diagnostics) = spl_core::lex(&src);
    let records = spl_core::lexer::token_records(&tokens);
    match output {
        OutputFormat::Json => print_json(&records),
        OutputFormat::Text => {
            for t in &records {
                println!("{:>4}  {:<12} {}", t.line, t.kind, t.value);
            }
        }
    }
    if !diagnostics.is_empty() {
        report_diagnostics(&diagnostics, output, quiet);
        process::exit(1);
    }
}

fn cmd_parse(file: &Path, options: &CompileOptions, output: OutputFormat, quiet: bool) {
    let src = read_file(file, output, quiet);
    let (tokens, mut diagnostics) = spl_core::lex(&src);
    match spl_core::parse(&tokens, options.max_errors) {
        Ok(program) => {
            match output {
                OutputFormat::Json => {
                    print_json(&serde_json::json!({ "ast": program.to_string() }))
                }
                OutputFormat::Text => println!("{}", program),
            }
            if !diagnostics.is_empty() {
                report_diagnostics(&diagnostics, output, quiet);
                process::exit(1);
            }
        }
        Err(errors) => {
            diagnostics.extend(errors);
            report_diagnostics(&diagnostics, output, quiet);
            process::exit(1);
        }
    }
}

fn cmd_check(file: &Path, options: &CompileOptions, output: OutputFormat, quiet: bool) {
    let src = read_file(file, output, quiet);
    let out = spl_core::compile(&src, options);
    let failed = out.errors().next().is_some();

    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "success": !failed,
                "diagnostics": out.diagnostics,
                "report": out.report,
            });
            print_json(&json);
        }
        OutputFormat::Text => {
            for d in &out.diagnostics {
                println!("{}", d);
            }
            if let Some(report) = &out.report {
                for c in &report.conflicts {
                    println!(
                        "[CONFLICT] {} (risk {}): {}",
                        c.conflict_type, c.risk_score, c.description
                    );
                }
                if !quiet {
                    let s = &report.statistics;
                    println!(
                        "{} roles, {} users, {} resources, {} policies; {} conflicts, {} security risks",
                        s.roles_defined,
                        s.users_defined,
                        s.resources_defined,
                        s.policies_defined,
                        s.conflicts_found,
                        s.security_risks
                    );
                    for r in &report.recommendations {
                        println!("  - {}", r);
                    }
                }
            }
            if !quiet {
                println!("{}", if failed { "failed" } else { "ok" });
            }
        }
    }
    if failed {
        process::exit(1);
    }
}

fn cmd_compile(
    file: &Path,
    manifest: bool,
    options: &CompileOptions,
    output: OutputFormat,
    quiet: bool,
) {
    let src = read_file(file, output, quiet);
    let out = spl_core::compile(&src, options);
    let Some(ir) = out.ir else {
        report_diagnostics(&out.diagnostics, output, quiet);
        process::exit(1);
    };

    if output == OutputFormat::Text && !quiet {
        for d in &out.diagnostics {
            eprintln!("{}", d);
        }
    }
    let value = ir.to_value();
    if manifest {
        print_json(&manifest::build_manifest(value));
    } else {
        print_json(&value);
    }
}

// ──────────────────────────────────────────────
// IR commands
// ──────────────────────────────────────────────

static IR_SCHEMA_STR: &str = include_str!("../../../schema/ir-schema.json");

fn cmd_validate(ir_path: &Path, output: OutputFormat, quiet: bool) {
    let schema: serde_json::Value = match serde_json::from_str(IR_SCHEMA_STR) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("internal error: failed to parse embedded IR schema: {}", e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("internal error: failed to compile schema: {}", e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let doc = read_json(ir_path, output, quiet);

    // Manifests are detected by their etag field; the IR inside is validated.
    let is_manifest = doc.get("etag").is_some();
    let doc_type = if is_manifest { "manifest" } else { "ir" };
    let mut errors = Vec::new();
    let ir = if is_manifest {
        errors.extend(manifest::check_manifest(&doc));
        doc.get("ir").cloned().unwrap_or(serde_json::Value::Null)
    } else {
        doc
    };
    errors.extend(validator.iter_errors(&ir).map(|e| format!("{}", e)));

    if errors.is_empty() {
        if !quiet {
            match output {
                OutputFormat::Text => println!("valid {}", doc_type),
                OutputFormat::Json => {
                    print_json(&serde_json::json!({ "valid": true, "type": doc_type }))
                }
            }
        }
        return;
    }

    match output {
        OutputFormat::Text => {
            if !quiet {
                eprintln!("invalid {}", doc_type);
                for err in &errors {
                    eprintln!("  - {}", err);
                }
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "valid": false,
                "type": doc_type,
                "errors": errors
            });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
    process::exit(1);
}

/// Load a policy set from source, IR JSON or a manifest.
fn load_policy_set(
    path: &Path,
    options: &CompileOptions,
    output: OutputFormat,
    quiet: bool,
) -> PolicySet {
    if path.extension().is_some_and(|e| e == "spl") {
        let src = read_file(path, output, quiet);
        let out = spl_core::compile(&src, options);
        return match out.ir {
            Some(ir) => ir,
            None => {
                report_diagnostics(&out.diagnostics, output, quiet);
                process::exit(1);
            }
        };
    }

    let doc = read_json(path, output, quiet);
    let ir = match doc.get("etag") {
        Some(_) => doc.get("ir").cloned().unwrap_or(serde_json::Value::Null),
        None => doc,
    };
    match spl_interchange::from_interchange(&ir) {
        Ok(set) => set,
        Err(e) => {
            let msg = format!("error loading policy set '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

struct EvalRequest<'a> {
    user: &'a str,
    action: &'a str,
    resource: &'a str,
    context: Option<&'a Path>,
    audit: bool,
}

fn cmd_eval(
    policy: &Path,
    req: EvalRequest<'_>,
    options: &CompileOptions,
    output: OutputFormat,
    quiet: bool,
) {
    let engine = PolicyEngine::load(load_policy_set(policy, options, output, quiet));

    let context = match req.context {
        None => AccessContext::default(),
        Some(path) => {
            let doc = read_json(path, output, quiet);
            match AccessContext::from_json(&doc) {
                Ok(c) => c,
                Err(e) => {
                    let msg = format!("error in context '{}': {}", path.display(), e);
                    report_error(&msg, output, quiet);
                    process::exit(1);
                }
            }
        }
    };

    let decision = engine.check_access(req.user, req.action, req.resource, &context);
    let audit = req.audit.then(|| engine.audit(&decision));

    match output {
        OutputFormat::Json => {
            let mut json = serde_json::json!({ "decision": decision });
            if let Some(record) = &audit {
                json["audit"] = serde_json::json!(record);
            }
            print_json(&json);
        }
        OutputFormat::Text => {
            println!("{}: {}", decision.decision, decision.reason);
            if !quiet {
                for p in &decision.matched_policies {
                    let line = p
                        .line
                        .map_or_else(|| "synthesized".to_owned(), |l| format!("line {}", l));
                    println!(
                        "  matched {} [{}] ON {} IF {} ({})",
                        p.kind,
                        p.actions.join(", "),
                        p.resource,
                        p.condition.as_deref().unwrap_or("always"),
                        line
                    );
                }
                if let Some(record) = &audit {
                    println!(
                        "audit: {} {} {} {} -> {}",
                        record.timestamp,
                        record.user,
                        record.action,
                        record.resource,
                        if record.allowed { "allowed" } else { "denied" }
                    );
                }
            }
        }
    }
}

fn cmd_permissions(
    policy: &Path,
    user: &str,
    options: &CompileOptions,
    output: OutputFormat,
    quiet: bool,
) {
    let engine = PolicyEngine::load(load_policy_set(policy, options, output, quiet));
    let Some(view) = engine.get_user_permissions(user) else {
        report_error(&format!("User '{}' not found", user), output, quiet);
        process::exit(1);
    };

    match output {
        OutputFormat::Json => print_json(&view),
        OutputFormat::Text => {
            println!("user: {}", view.username);
            println!("role: {}", view.role.as_deref().unwrap_or("(none)"));
            println!("permissions: {}", view.role_permissions.join(", "));
            println!("applicable policies: {}", view.applicable_policies.len());
            if !quiet {
                for p in &view.applicable_policies {
                    println!(
                        "  {} [{}] ON {} IF {}",
                        p.kind,
                        p.actions.join(", "),
                        p.resource,
                        p.condition.as_deref().unwrap_or("always")
                    );
                }
            }
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
