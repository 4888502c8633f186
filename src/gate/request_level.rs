use std::sync::Arc;

use log::{debug, warn};

use super::{AdmissionGate, Termination, Verdict};
use crate::{
    core::{AdmissionContext, CancelCause, SurfaceImage},
    options::{LevelOrigin, RequestLevel},
};

pub const GATE_NAME: &str = "request-level";
pub const PRIORITY: i32 = 200;

pub fn create_gate() -> Arc<dyn AdmissionGate> {
    Arc::new(RequestLevelGate)
}

/// Enforces how far a commit may reach.
///
/// `Memory` stops every display-bound commit that missed the memory cache.
/// `Local` stops network URIs without a disk cache entry.
pub struct RequestLevelGate;

impl RequestLevelGate {
    fn memory_only(&self, ctx: &AdmissionContext<'_>) -> Verdict {
        let cause = match ctx.options.level_origin {
            Some(LevelOrigin::PauseLoad) => CancelCause::PauseLoad,
            _ => CancelCause::LevelMemory,
        };
        warn!("Canceled, {} - {}", cause, ctx.name());

        let image = ctx
            .options
            .loading_image
            .clone()
            .map_or(SurfaceImage::Empty, SurfaceImage::Placeholder);
        Verdict::Terminate(Termination::canceled(cause, Some(image)))
    }

    fn local_only(&self, ctx: &AdmissionContext<'_>) -> Verdict {
        let is_network = ctx
            .descriptor
            .scheme
            .is_some_and(|scheme| scheme.is_network());
        if !is_network || ctx.collaborators.disk_cache().has(&ctx.descriptor.uri) {
            return Verdict::Pass;
        }

        let cause = match ctx.options.level_origin {
            Some(LevelOrigin::PauseDownload) => CancelCause::PauseDownload,
            _ => CancelCause::LevelLocal,
        };
        debug!("Canceled, {} - {}", cause, ctx.name());

        let image = ctx.options.paused_image.clone().map(SurfaceImage::Placeholder);
        if image.is_none() && ctx.is_display_bound() {
            warn!("Paused image is not configured - {}", ctx.name());
        }
        let clear_animation = image.is_some();
        Verdict::Terminate(Termination {
            clear_animation,
            ..Termination::canceled(cause, image)
        })
    }
}

impl AdmissionGate for RequestLevelGate {
    fn name(&self) -> &str {
        GATE_NAME
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn check(&self, ctx: &AdmissionContext<'_>) -> Verdict {
        match ctx.options.request_level {
            RequestLevel::Memory if ctx.is_display_bound() => self.memory_only(ctx),
            RequestLevel::Local => self.local_only(ctx),
            _ => Verdict::Pass,
        }
    }
}
