//! spl-interchange: the compiled policy-set IR shared by compiler and engine.
//!
//! Provides typed structs for every IR section (roles, users, resources,
//! policies, metadata) and a single `from_interchange()` entry point that
//! deserializes a `serde_json::Value` document into a `PolicySet`.
//!
//! The compiler in spl-core produces a `PolicySet`; the engine in
//! spl-eval consumes one. Neither depends on the other's internals.

pub mod deserialize;
pub mod types;

pub use deserialize::{from_interchange, InterchangeError};
pub use types::*;
