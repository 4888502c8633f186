//! Request lifecycle
//!
//! A [`Request`] exists from the moment a commit clears the gate chain. It
//! owns the state machine past `Submitted` and receives the execution
//! collaborator's callbacks, which may arrive on any thread.

use std::sync::{Arc, Weak};

use log::{debug, info, warn};
use once_cell::sync::OnceCell;

use crate::{
    core::{
        AtomicState, CachedImage, CancelCause, DisplaySurface, ExecutionCallbacks,
        ExecutionHandle, FailCause, ImageFrom, ImageResult, MemoryCache, RequestBinding,
        RequestId, RequestListener, RequestState, SlotRegistry, SurfaceImage,
    },
    options::{CacheKey, RequestDescriptor, ResolvedOptions},
};

/// A submitted request.
pub struct Request {
    id: RequestId,
    descriptor: RequestDescriptor,
    options: Arc<ResolvedOptions>,
    cache_key: Option<CacheKey>,
    state: AtomicState,
    listener: Option<Arc<dyn RequestListener>>,
    surface: Option<Weak<dyn DisplaySurface>>,
    registry: Weak<SlotRegistry>,
    memory_cache: Arc<dyn MemoryCache>,
    execution: OnceCell<Box<dyn ExecutionHandle>>,
}

impl Request {
    pub(crate) fn new(
        descriptor: RequestDescriptor,
        options: Arc<ResolvedOptions>,
        cache_key: Option<CacheKey>,
        listener: Option<Arc<dyn RequestListener>>,
        surface: Option<&Arc<dyn DisplaySurface>>,
        registry: &Arc<SlotRegistry>,
        memory_cache: Arc<dyn MemoryCache>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: RequestId::new(),
            descriptor,
            options,
            cache_key,
            state: AtomicState::new(RequestState::Submitted),
            listener,
            surface: surface.map(Arc::downgrade),
            registry: Arc::downgrade(registry),
            memory_cache,
            execution: OnceCell::new(),
        })
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn uri(&self) -> &str {
        &self.descriptor.uri
    }

    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    pub fn options(&self) -> &Arc<ResolvedOptions> {
        &self.options
    }

    pub fn cache_key(&self) -> Option<&CacheKey> {
        self.cache_key.as_ref()
    }

    pub fn state(&self) -> RequestState {
        self.state.load()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn is_canceled(&self) -> bool {
        self.state() == RequestState::Cancelled
    }

    /// Identity rendered on the surface alongside this request's placeholder.
    pub fn binding(&self) -> Option<RequestBinding> {
        self.descriptor.target.map(|target| RequestBinding {
            target,
            request: self.id,
        })
    }

    /// Whether this request still owns its target. Headless requests always do.
    pub fn is_current(&self) -> bool {
        let Some(target) = self.descriptor.target else {
            return true;
        };
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.is_current(target, self.id))
    }

    /// Cancel the request. Idempotent; a no-op once the request is terminal.
    pub fn cancel(&self) -> bool {
        self.cancel_with(CancelCause::Explicit)
    }

    pub(crate) fn cancel_with(&self, cause: CancelCause) -> bool {
        if !self.state.finish(RequestState::Cancelled) {
            return false;
        }
        debug!("Canceled, {} - {}", cause, self.name());
        if let Some(listener) = &self.listener {
            listener.on_canceled(cause);
        }
        if let Some(execution) = self.execution.get() {
            if !execution.is_finished() {
                execution.cancel();
            }
        }
        true
    }

    pub(crate) fn attach(&self, execution: Box<dyn ExecutionHandle>) {
        if self.execution.set(execution).is_err() {
            warn!("Execution already attached - {}", self.name());
        }
    }

    /// Hand the attached job to the execution collaborator.
    pub(crate) fn submit(&self) -> ImageResult<()> {
        match self.execution.get() {
            Some(execution) => execution.submit(),
            None => Err(crate::core::ImageError::Internal(format!(
                "no execution attached to request {}",
                self.id
            ))),
        }
    }

    /// Cancel the attached job regardless of state, so a job that was never
    /// spawned drops the callbacks pointing back at this request.
    pub(crate) fn abandon_execution(&self) {
        if let Some(execution) = self.execution.get() {
            execution.cancel();
        }
    }

    fn surface(&self) -> Option<Arc<dyn DisplaySurface>> {
        self.surface.as_ref().and_then(Weak::upgrade)
    }

    /// Draw `image` on the owner thread of the surface, if this request is
    /// still current there by then.
    fn render(&self, image: SurfaceImage) {
        let (Some(surface), Some(target)) = (self.surface(), self.descriptor.target) else {
            return;
        };
        let registry = self.registry.clone();
        let id = self.id;
        let owner = surface.clone();
        owner.run_on_owner(Box::new(move || {
            let current = registry
                .upgrade()
                .is_some_and(|registry| registry.is_current(target, id));
            if current {
                surface.set_image(image);
            } else {
                debug!("Request {} lost target {} before rendering", id, target);
            }
        }));
    }

    /// A display-bound result arriving after the target moved on is dropped
    /// and the request finishes as superseded.
    fn abandon_if_stale(&self) -> bool {
        if self.is_current() {
            return false;
        }
        info!("Target no longer bound, result ignored - {}", self.name());
        self.cancel_with(CancelCause::Superseded);
        true
    }
}

impl ExecutionCallbacks for Request {
    fn on_running(&self) {
        if !self.state.advance(RequestState::Submitted, RequestState::Running) {
            debug!(
                "Request already {} when running - {}",
                self.state(),
                self.name()
            );
        }
    }

    fn on_progress(&self, done: u64, total: u64) {
        if self.is_finished() {
            return;
        }
        if let Some(listener) = &self.listener {
            listener.on_progress(done, total);
        }
    }

    fn on_completed(&self, image: Arc<dyn CachedImage>, from: ImageFrom) {
        if self.options.cache_in_memory {
            if let Some(key) = &self.cache_key {
                self.memory_cache.put(key.clone(), image.clone());
            }
        }

        if self.abandon_if_stale() || !self.state.finish(RequestState::Completed) {
            return;
        }
        info!("Completed from {:?}: {} - {}", from, image.info(), self.name());
        if let Some(listener) = &self.listener {
            listener.on_completed(from, image.mime_type());
        }
        self.render(SurfaceImage::Displayed {
            image,
            displayer: self.options.displayer.clone(),
        });
    }

    fn on_failed(&self, cause: FailCause) {
        if self.abandon_if_stale() || !self.state.finish(RequestState::Failed) {
            return;
        }
        warn!("Failed, {} - {}", cause, self.name());
        if let Some(listener) = &self.listener {
            listener.on_failed(&cause);
        }
        if let Some(holder) = self.options.failed_image.clone() {
            self.render(SurfaceImage::Placeholder(holder));
        }
    }

    fn on_canceled(&self) {
        self.cancel_with(CancelCause::Explicit);
    }
}

/// Outcome of a commit that ended inside the gate chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub state: RequestState,
    pub name: String,
}

/// What a display commit hands back to the caller.
#[derive(Clone)]
pub enum RequestHandle {
    /// A submitted request, possibly shared with an earlier commit.
    Active(Arc<Request>),
    /// The commit was settled by a gate; no request exists.
    Settled(Settlement),
}

impl RequestHandle {
    pub fn state(&self) -> RequestState {
        match self {
            RequestHandle::Active(request) => request.state(),
            RequestHandle::Settled(settlement) => settlement.state,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RequestHandle::Active(request) => request.name(),
            RequestHandle::Settled(settlement) => &settlement.name,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn is_canceled(&self) -> bool {
        self.state() == RequestState::Cancelled
    }

    pub fn request(&self) -> Option<&Arc<Request>> {
        match self {
            RequestHandle::Active(request) => Some(request),
            RequestHandle::Settled(_) => None,
        }
    }

    /// Cancel the underlying request, if any. Returns whether this call
    /// performed the cancellation.
    pub fn cancel(&self) -> bool {
        match self {
            RequestHandle::Active(request) => request.cancel(),
            RequestHandle::Settled(_) => false,
        }
    }
}
