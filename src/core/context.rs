//! Admission context
//!
//! Per-commit state threaded through the gate chain.

use std::sync::Arc;

use super::{
    container::Collaborators,
    registry::SlotRegistry,
    traits::{DisplaySurface, TargetId},
};
use crate::options::{CacheKey, RequestDescriptor, ResolvedOptions};

/// Everything a gate may read while deciding on one commit
pub struct AdmissionContext<'a> {
    pub descriptor: &'a RequestDescriptor,
    pub options: &'a Arc<ResolvedOptions>,
    /// Present for display-bound requests only
    pub cache_key: Option<&'a CacheKey>,
    /// Present for display-bound requests only
    pub surface: Option<&'a Arc<dyn DisplaySurface>>,
    pub collaborators: &'a Collaborators,
    pub registry: &'a SlotRegistry,
}

impl<'a> AdmissionContext<'a> {
    pub fn is_display_bound(&self) -> bool {
        self.surface.is_some()
    }

    pub fn target(&self) -> Option<TargetId> {
        self.surface.map(|surface| surface.id())
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}
