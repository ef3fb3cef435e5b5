//! spl-core: compiler for the SPL access-control policy language.
//!
//! Turns policy source text into the policy-set IR defined in
//! `spl-interchange`, reporting line-tagged diagnostics along the way.
//!
//! # Public API
//!
//! - [`compile()`] -- run every stage and collect the results
//! - [`lex()`], [`parse()`], [`analyze()`], [`generate()`] -- the
//!   individual stages
//! - [`parse_condition()`] -- re-parse an IR condition string
//! - [`CompileOptions`] -- strictness and synthesis settings
//! - [`Diagnostic`] -- the message type every stage reports

pub mod analyze;
pub mod ast;
pub mod codegen;
pub mod compile;
pub mod error;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod symbols;

// ── Convenience re-exports: key types ────────────────────────────────

pub use analyze::{AnalysisReport, ConflictType, PolicyConflict};
pub use ast::{BinaryOp, Expr, Literal, Program, Statement, UnaryOp};
pub use compile::CompileOutput;
pub use error::{Diagnostic, Severity, Stage};
pub use options::{CompileOptions, OptionsError, Strictness};
pub use symbols::{SymbolKind, SymbolTable};

// ── Convenience re-exports: stage entry points ───────────────────────

pub use analyze::analyze;
pub use codegen::generate;
pub use compile::compile;
pub use lexer::lex;
pub use parser::{parse, parse_condition};
