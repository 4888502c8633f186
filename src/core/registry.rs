//! Target slot registry
//!
//! One slot per display surface. A slot remembers which request currently
//! owns the surface (as a non-owning back-reference) and the last committed
//! URI/options pair so a recycled surface can be rebound later.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use log::debug;

use super::traits::{RequestBinding, RequestId, TargetId};
use crate::{options::OptionOverrides, orchestration::Request};

/// Last committed URI and caller options of a target, before derivation.
#[derive(Clone, Debug)]
pub struct ReattachSnapshot {
    pub uri: String,
    pub overrides: OptionOverrides,
}

struct SlotBinding {
    id: RequestId,
    request: Weak<Request>,
}

#[derive(Default)]
struct TargetSlot {
    current: Option<SlotBinding>,
    snapshot: Option<Arc<ReattachSnapshot>>,
}

/// Registry of target slots keyed by surface identity.
///
/// Mutated only from the admission path; completion callbacks only read it.
#[derive(Default)]
pub struct SlotRegistry {
    slots: DashMap<TargetId, TargetSlot>,
}

impl SlotRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `request` the current request of `target`, replacing any prior one.
    pub fn bind(&self, target: TargetId, request: &Arc<Request>) {
        debug!("Binding request {} to target {}", request.id(), target);
        self.slots.entry(target).or_default().current = Some(SlotBinding {
            id: request.id(),
            request: Arc::downgrade(request),
        });
    }

    /// Current unfinished request of `target`.
    ///
    /// Entries whose request is gone or already terminal are dropped here,
    /// which is how a slot is unbound once its request settles.
    pub fn lookup(&self, target: TargetId) -> Option<Arc<Request>> {
        let mut slot = self.slots.get_mut(&target)?;
        let live = slot
            .current
            .as_ref()
            .and_then(|binding| binding.request.upgrade())
            .filter(|request| !request.is_finished());
        if live.is_none() && slot.current.take().is_some() {
            debug!("Target {} unbound, its request settled", target);
        }
        live
    }

    /// Resolve a binding rendered on a surface back to its request, if that
    /// request is still the current one for the target.
    pub fn resolve(&self, binding: &RequestBinding) -> Option<Arc<Request>> {
        let slot = self.slots.get(&binding.target)?;
        slot.current
            .as_ref()
            .filter(|current| current.id == binding.request)
            .and_then(|current| current.request.upgrade())
    }

    /// Whether `request` is still the one bound to `target`.
    pub fn is_current(&self, target: TargetId, request: RequestId) -> bool {
        self.slots
            .get(&target)
            .and_then(|slot| slot.current.as_ref().map(|current| current.id == request))
            .unwrap_or(false)
    }

    /// Drop the current binding of `target`, returning the request if it is
    /// still alive.
    pub fn release(&self, target: TargetId) -> Option<Arc<Request>> {
        let mut slot = self.slots.get_mut(&target)?;
        slot.current.take().and_then(|binding| binding.request.upgrade())
    }

    pub fn save_snapshot(&self, target: TargetId, snapshot: ReattachSnapshot) {
        self.slots.entry(target).or_default().snapshot = Some(Arc::new(snapshot));
    }

    pub fn snapshot(&self, target: TargetId) -> Option<Arc<ReattachSnapshot>> {
        self.slots.get(&target).and_then(|slot| slot.snapshot.clone())
    }

    /// Forget everything about a destroyed surface.
    pub fn forget(&self, target: TargetId) {
        debug!("Forgetting target {}", target);
        self.slots.remove(&target);
    }

    /// Get registry counts for monitoring
    pub fn get_stats(&self) -> SlotStats {
        let bound_count = self
            .slots
            .iter()
            .filter(|slot| slot.current.is_some())
            .count();
        SlotStats {
            slot_count: self.slots.len(),
            bound_count,
        }
    }
}

/// Statistics about registry contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStats {
    pub slot_count: usize,
    pub bound_count: usize,
}
