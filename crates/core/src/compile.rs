//! Source text to IR in one call: lex, parse, analyze, generate.
//!
//! This is a thin orchestrator that calls each stage in order and stops at
//! the first stage that fails, keeping everything produced so far.

use crate::analyze::{self, AnalysisReport};
use crate::codegen;
use crate::error::Diagnostic;
use crate::lexer::{self, TokenRecord};
use crate::options::CompileOptions;
use crate::parser;
use serde::Serialize;
use spl_interchange::PolicySet;

#[derive(Debug, Clone, Serialize)]
pub struct CompileOutput {
    pub tokens: Vec<TokenRecord>,
    /// AST listing; absent when parsing failed.
    pub ast_text: Option<String>,
    /// Every diagnostic from every stage that ran, in stage order.
    pub diagnostics: Vec<Diagnostic>,
    /// Absent when parsing failed.
    pub report: Option<AnalysisReport>,
    /// Present only when no stage reported an error.
    pub ir: Option<PolicySet>,
}

impl CompileOutput {
    pub fn success(&self) -> bool {
        self.ir.is_some()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

/// Compile `source`.
///
/// Lexical errors do not stop parsing or analysis, but like any other
/// error they prevent IR generation.
pub fn compile(source: &str, options: &CompileOptions) -> CompileOutput {
    let (tokens, lex_diagnostics) = lexer::lex(source);
    tracing::debug!(
        tokens = tokens.len(),
        errors = lex_diagnostics.len(),
        "lexical analysis finished"
    );

    let mut out = CompileOutput {
        tokens: lexer::token_records(&tokens),
        ast_text: None,
        diagnostics: lex_diagnostics,
        report: None,
        ir: None,
    };

    let program = match parser::parse(&tokens, options.max_errors) {
        Ok(program) => program,
        Err(errors) => {
            tracing::debug!(errors = errors.len(), "syntax analysis failed");
            out.diagnostics.extend(errors);
            return out;
        }
    };
    tracing::debug!(statements = program.statements.len(), "syntax analysis finished");
    out.ast_text = Some(program.to_string());

    let report = analyze::analyze(&program, options);
    out.diagnostics.extend(report.diagnostics().cloned());
    out.report = Some(report);
    if out.diagnostics.iter().any(Diagnostic::is_error) {
        return out;
    }

    let ir = codegen::generate(&program, options.synthesize_role_policies);
    tracing::debug!(
        policies = ir.policies.len(),
        synthesized = ir.metadata.counts.synthesized_policies,
        "IR generated"
    );
    out.ir = Some(ir);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;

    #[test]
    fn syntax_failure_keeps_tokens() {
        let out = compile("ROLE Admin { can * }", &CompileOptions::default());
        assert!(!out.success());
        assert!(out.ast_text.is_none());
        assert!(out.report.is_none());
        assert_eq!(out.tokens.len(), 6);
        assert_eq!(out.diagnostics[0].stage, Stage::Syntax);
    }

    #[test]
    fn lexical_error_blocks_generation_but_analysis_runs() {
        let out = compile(
            "ROLE Admin { can: read } @\nRESOURCE DB { path: \"/d\" }",
            &CompileOptions::default(),
        );
        assert!(out.report.is_some());
        assert!(out.ir.is_none());
        assert_eq!(out.errors().count(), 1);
        assert_eq!(out.diagnostics[0].stage, Stage::Lexical);
    }

    #[test]
    fn success_produces_ir_and_ast_text() {
        let out = compile(
            "ROLE Admin { can: * }\nRESOURCE DB { path: \"/data\" }",
            &CompileOptions::default(),
        );
        assert!(out.success(), "{:?}", out.diagnostics);
        let ast = out.ast_text.as_deref().unwrap();
        assert!(ast.starts_with("Program(\n  Role(name=Admin, properties={can: *}, line=1)"));
        // The wildcard RISK is reported but does not block.
        assert_eq!(out.diagnostics.len(), 1);
    }
}
