use std::sync::Arc;

use log::debug;

use super::{AdmissionGate, Verdict};
use crate::core::{AdmissionContext, CancelCause};

pub const GATE_NAME: &str = "duplicate";
pub const PRIORITY: i32 = 100;

pub fn create_gate() -> Arc<dyn AdmissionGate> {
    Arc::new(DuplicateGate)
}

/// Coalesces a commit into the unfinished request already bound to its
/// target when both share a cache key, and supersedes it otherwise.
pub struct DuplicateGate;

impl AdmissionGate for DuplicateGate {
    fn name(&self) -> &str {
        GATE_NAME
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn check(&self, ctx: &AdmissionContext<'_>) -> Verdict {
        let Some(target) = ctx.target() else {
            return Verdict::Pass;
        };
        let Some(existing) = ctx.registry.lookup(target) else {
            return Verdict::Pass;
        };

        if existing.cache_key() == ctx.cache_key {
            debug!(
                "Don't need to cancel, target {} keeps request {} - {}",
                target,
                existing.id(),
                existing.name()
            );
            return Verdict::Reuse(existing);
        }

        debug!(
            "Superseding request {} on target {} - {}",
            existing.id(),
            target,
            existing.name()
        );
        existing.cancel_with(CancelCause::Superseded);
        Verdict::Pass
    }
}
