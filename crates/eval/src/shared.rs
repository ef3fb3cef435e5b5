//! A caller-owned handle for swapping engines at runtime.
//!
//! Engines are never mutated after load. Activating a new policy set
//! means loading a fresh engine and publishing it here; readers holding
//! the previous `Arc` keep evaluating against the old set until they
//! call [`SharedEngine::current`] again.

use crate::engine::PolicyEngine;
use arc_swap::ArcSwap;
use std::sync::Arc;

#[derive(Debug)]
pub struct SharedEngine {
    inner: ArcSwap<PolicyEngine>,
}

impl SharedEngine {
    pub fn new(engine: PolicyEngine) -> Self {
        SharedEngine {
            inner: ArcSwap::from_pointee(engine),
        }
    }

    /// The engine published most recently.
    pub fn current(&self) -> Arc<PolicyEngine> {
        self.inner.load_full()
    }

    /// Publish `engine` and return the one it replaces.
    pub fn publish(&self, engine: PolicyEngine) -> Arc<PolicyEngine> {
        tracing::info!(
            policies = engine.policy_set().policies.len(),
            "publishing policy engine"
        );
        self.inner.swap(Arc::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AccessContext;
    use spl_core::{compile, CompileOptions};
    use std::thread;

    fn engine_for(src: &str) -> PolicyEngine {
        let out = compile(src, &CompileOptions::default());
        PolicyEngine::load(out.ir.expect("source should compile"))
    }

    const PRELUDE: &str = "ROLE Dev { can: read }\nUSER bob { role: Dev }\nRESOURCE DB { path: \"/d\" }\n";

    #[test]
    fn publish_swaps_for_new_readers_only() {
        let shared = SharedEngine::new(engine_for(&format!(
            "{}ALLOW action: read ON RESOURCE: DB",
            PRELUDE
        )));
        let before = shared.current();
        let old = shared.publish(engine_for(&format!(
            "{}DENY action: read ON RESOURCE: DB",
            PRELUDE
        )));
        assert!(Arc::ptr_eq(&before, &old));

        let ctx = AccessContext::default();
        assert!(before.check_access("bob", "read", "DB", &ctx).allowed);
        assert!(!shared.current().check_access("bob", "read", "DB", &ctx).allowed);
    }

    #[test]
    fn concurrent_readers_share_one_engine() {
        let shared = Arc::new(SharedEngine::new(engine_for(&format!(
            "{}ALLOW action: read ON RESOURCE: DB IF (user.role == \"Dev\")",
            PRELUDE
        ))));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    shared
                        .current()
                        .check_access("bob", "read", "DB", &AccessContext::default())
                        .allowed
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
    }

    #[test]
    fn readers_see_a_complete_engine_while_writers_publish() {
        let allow = format!("{}ALLOW action: read ON RESOURCE: DB", PRELUDE);
        let deny = format!("{}DENY action: read ON RESOURCE: DB", PRELUDE);
        let shared = Arc::new(SharedEngine::new(engine_for(&allow)));

        let writer = {
            let shared = Arc::clone(&shared);
            let (allow, deny) = (engine_for(&allow), engine_for(&deny));
            thread::spawn(move || {
                for i in 0..50 {
                    let next = if i % 2 == 0 { deny.clone() } else { allow.clone() };
                    shared.publish(next);
                }
            })
        };
        for _ in 0..200 {
            let engine = shared.current();
            assert_eq!(engine.policy_set().policies.len(), 1);
            let decision = engine.check_access("bob", "read", "DB", &AccessContext::default());
            assert_eq!(decision.matched_policies.len(), 1);
        }
        writer.join().unwrap();
    }
}
