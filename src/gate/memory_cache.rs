use std::sync::Arc;

use log::{info, warn};

use super::{AdmissionGate, Outcome, Termination, Verdict};
use crate::core::{AdmissionContext, ImageFrom, SurfaceImage};

pub const GATE_NAME: &str = "memory-cache";
pub const PRIORITY: i32 = 300;

pub fn create_gate() -> Arc<dyn AdmissionGate> {
    Arc::new(MemoryCacheGate)
}

/// Serves display-bound commits straight from the memory cache.
///
/// Released entries are evicted and treated as a miss.
pub struct MemoryCacheGate;

impl AdmissionGate for MemoryCacheGate {
    fn name(&self) -> &str {
        GATE_NAME
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn check(&self, ctx: &AdmissionContext<'_>) -> Verdict {
        let Some(key) = ctx.cache_key else {
            return Verdict::Pass;
        };
        if !ctx.is_display_bound() || !ctx.options.cache_in_memory {
            return Verdict::Pass;
        }

        let cache = ctx.collaborators.memory_cache();
        let Some(image) = cache.get(key) else {
            return Verdict::Pass;
        };

        if image.is_released() {
            warn!(
                "Memory cache entry released, evicting: {} - {}",
                image.info(),
                ctx.name()
            );
            cache.remove(key);
            return Verdict::Pass;
        }

        info!("From memory cache: {} - {}", image.info(), ctx.name());
        let mime_type = image.mime_type().map(str::to_string);
        Verdict::Terminate(Termination {
            outcome: Outcome::Completed {
                from: ImageFrom::MemoryCache,
                mime_type,
            },
            image: Some(SurfaceImage::Cached(image)),
            clear_animation: false,
        })
    }
}
