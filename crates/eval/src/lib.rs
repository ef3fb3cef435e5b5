//! SPL policy engine -- loads a compiled policy set and decides access
//! requests against it.
//!
//! The engine consumes the IR produced by `spl-core` (or its JSON form),
//! never source text. Decisions are deny-overrides and fail closed: an
//! unknown user, resource or role, and any condition that cannot be
//! evaluated, all end in DENY with a readable reason.

pub mod condition;
pub mod context;
pub mod engine;
pub mod shared;
pub mod value;

pub use condition::EvalError;
pub use context::{AccessContext, DeviceContext, EvaluationContext, RequestContext, TimeContext};
pub use engine::{AuditRecord, Decision, MatchedPolicy, PermissionView, PolicyEngine};
pub use shared::SharedEngine;
pub use value::Value;
