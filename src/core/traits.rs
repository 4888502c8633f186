//! Core traits for PixSIX collaborators
//!
//! Everything past admission (fetching, disk persistence, decoding, drawing)
//! is reached through these narrow interfaces.

use std::{fmt, sync::Arc};

use uuid::Uuid;

use super::{
    error::ImageResult,
    status::{CancelCause, FailCause, ImageFrom},
};
use crate::{
    display::ImageDisplayer,
    options::{
        CacheKey, ImageHolder, OptionOverrides, Policy, RequestDescriptor, ResolvedOptions,
        ScaleType, Size,
    },
};

/// Stable identity of a display surface, used to key the slot registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Identity of a submitted request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-owning back-reference from something rendered on a surface to the
/// request that put it there. Resolved through the slot registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestBinding {
    pub target: TargetId,
    pub request: RequestId,
}

/// A decoded image held by the memory cache.
pub trait CachedImage: Send + Sync + fmt::Debug {
    /// Released images must not be drawn again.
    fn is_released(&self) -> bool;

    /// Short human readable description for logs.
    fn info(&self) -> String;

    fn mime_type(&self) -> Option<&str> {
        None
    }
}

/// What a surface is asked to show.
#[derive(Clone, Debug)]
pub enum SurfaceImage {
    /// Nothing.
    Empty,
    /// A static placeholder (failed, paused, or loading outside a request).
    Placeholder(ImageHolder),
    /// Loading placeholder bound to the request that owns the surface. It
    /// must only be drawn while the binding is still current.
    Loading {
        holder: Option<ImageHolder>,
        binding: RequestBinding,
    },
    /// Memory-cache hit, applied synchronously without animation.
    Cached(Arc<dyn CachedImage>),
    /// Result of a finished request, drawn through its displayer.
    Displayed {
        image: Arc<dyn CachedImage>,
        displayer: Arc<dyn ImageDisplayer>,
    },
}

/// Observer of one commit.
pub trait RequestListener: Send + Sync {
    fn on_started(&self) {}

    fn on_progress(&self, _done: u64, _total: u64) {}

    fn on_completed(&self, _from: ImageFrom, _mime_type: Option<&str>) {}

    fn on_failed(&self, _cause: &FailCause) {}

    fn on_canceled(&self, _cause: CancelCause) {}
}

/// Reusable display target.
pub trait DisplaySurface: Send + Sync {
    fn id(&self) -> TargetId;

    /// Options attached to the surface itself; the base layer of every commit.
    fn options(&self) -> Option<OptionOverrides> {
        None
    }

    fn set_options(&self, _options: OptionOverrides) {}

    /// Layout size if the surface has fixed, non-wrapping dimensions.
    fn fixed_size(&self) -> Option<Size>;

    /// Current laid-out size, if a layout pass already happened.
    fn measured_size(&self) -> Option<Size> {
        self.fixed_size()
    }

    fn scale_type(&self) -> ScaleType;

    fn set_image(&self, image: SurfaceImage);

    fn clear_animation(&self);

    fn bound_request(&self) -> Option<RequestBinding>;

    fn set_bound_request(&self, binding: Option<RequestBinding>);

    /// Listener used when the caller does not pass one.
    fn listener(&self) -> Option<Arc<dyn RequestListener>> {
        None
    }

    /// Run `task` on the thread that owns this surface. Completion callbacks
    /// arrive on arbitrary threads and go through here before touching the
    /// surface.
    fn run_on_owner(&self, task: Box<dyn FnOnce() + Send>) {
        task()
    }
}

/// Decoded-image cache. Implementations are internally synchronized.
pub trait MemoryCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Arc<dyn CachedImage>>;

    fn put(&self, key: CacheKey, image: Arc<dyn CachedImage>);

    fn remove(&self, key: &CacheKey) -> Option<Arc<dyn CachedImage>>;
}

/// Existence check against the downloaded-bytes cache.
pub trait DiskCache: Send + Sync {
    fn has(&self, uri: &str) -> bool;
}

/// Target measurement used during options resolution.
pub trait SizeCalculator: Send + Sync {
    /// Size to derive a resize from, `None` while the target is unmeasured.
    fn measure(&self, target: &dyn DisplaySurface) -> Option<Size>;

    /// Max decode size implied by the target's fixed dimensions.
    fn max_size(&self, target: &dyn DisplaySurface) -> Option<Size>;

    /// Fallback bound capping decode cost.
    fn default_max_size(&self, policy: &Policy) -> Size;
}

/// Callbacks the execution collaborator drives for one job. May be invoked
/// from any thread.
pub trait ExecutionCallbacks: Send + Sync {
    fn on_running(&self);

    fn on_progress(&self, done: u64, total: u64);

    fn on_completed(&self, image: Arc<dyn CachedImage>, from: ImageFrom);

    fn on_failed(&self, cause: FailCause);

    /// The job was abandoned by the collaborator itself.
    fn on_canceled(&self);
}

/// One job inside the execution collaborator.
pub trait ExecutionHandle: Send + Sync {
    fn submit(&self) -> ImageResult<()>;

    /// Best effort; does not guarantee immediate reclamation.
    fn cancel(&self);

    fn is_finished(&self) -> bool;
}

/// Fetch/decode/display pipeline past admission.
pub trait RequestExecutor: Send + Sync {
    fn new_request(
        &self,
        descriptor: &RequestDescriptor,
        options: &Arc<ResolvedOptions>,
        callbacks: Arc<dyn ExecutionCallbacks>,
    ) -> ImageResult<Box<dyn ExecutionHandle>>;
}
