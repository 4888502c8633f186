//! Commit entry points
//!
//! [`Engine`] ties the pipeline together: resolve options, run the gate
//! chain, then either settle the commit in place or hand a new [`Request`]
//! to the execution collaborator.

use std::sync::Arc;

use arc_swap::ArcSwap;
use log::{debug, info, warn};

use super::lifecycle::{Request, RequestHandle, Settlement};
use crate::{
    config::Config,
    core::{
        AdmissionContext, Collaborators, DisplaySurface, ExecutionCallbacks, FailCause,
        ImageResult, ReattachSnapshot, RequestBinding, RequestListener, SlotRegistry,
        SurfaceImage, TargetId,
    },
    gate::{GateChain, Outcome, Termination, Verdict},
    options::{
        resolve::merge_layers, resolve_display, resolve_load, CacheKey, OptionOverrides, Policy,
        PresetId, RequestDescriptor, ResolvedOptions,
    },
};

/// Admission and coalescing front-end.
pub struct Engine {
    policy: ArcSwap<Policy>,
    collaborators: Collaborators,
    registry: Arc<SlotRegistry>,
    gates: GateChain,
}

impl Engine {
    /// Create an engine with the default policy and every registered gate
    pub fn new(collaborators: Collaborators) -> Self {
        Self::with_policy(Policy::default(), collaborators)
    }

    pub fn with_policy(policy: Policy, collaborators: Collaborators) -> Self {
        Self {
            policy: ArcSwap::new(Arc::new(policy)),
            collaborators,
            registry: Arc::new(SlotRegistry::new()),
            gates: GateChain::standard(),
        }
    }

    /// Create an engine whose policy comes from `config`
    ///
    /// # Errors
    /// Returns an error when a configured preset cannot be materialized
    pub fn from_config(config: &Config, collaborators: Collaborators) -> ImageResult<Self> {
        Ok(Self::with_policy(Policy::from_config(config)?, collaborators))
    }

    /// Replace the gate chain
    pub fn with_gates(mut self, gates: GateChain) -> Self {
        self.gates = gates;
        self
    }

    /// Current policy snapshot
    pub fn policy(&self) -> Arc<Policy> {
        self.policy.load_full()
    }

    pub fn set_policy(&self, policy: Policy) {
        self.policy.store(Arc::new(policy));
    }

    pub fn set_pause_download(&self, paused: bool) {
        info!("Pause download: {paused}");
        self.policy.rcu(|policy| Policy {
            pause_download: paused,
            ..Policy::clone(policy)
        });
    }

    pub fn set_pause_load(&self, paused: bool) {
        info!("Pause load: {paused}");
        self.policy.rcu(|policy| Policy {
            pause_load: paused,
            ..Policy::clone(policy)
        });
    }

    /// Register or replace a named preset
    pub fn put_preset(&self, id: impl Into<PresetId>, overrides: OptionOverrides) {
        let id = id.into();
        self.policy.rcu(|policy| {
            let mut policy = Policy::clone(policy);
            policy.presets.insert(id.clone(), overrides.clone());
            policy
        });
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn registry(&self) -> &Arc<SlotRegistry> {
        &self.registry
    }

    /// Whether something rendered under `binding` may still be drawn.
    pub fn is_current(&self, binding: &RequestBinding) -> bool {
        self.registry.is_current(binding.target, binding.request)
    }

    /// Show `uri` on `surface`.
    ///
    /// # Errors
    /// Returns `Configuration` for option contracts the surface cannot honour,
    /// and the executor's error if it refuses the job. Invalid URIs and
    /// policy stops are reported to the listener, not returned.
    pub fn display(
        &self,
        uri: &str,
        surface: &Arc<dyn DisplaySurface>,
        overrides: OptionOverrides,
        listener: Option<Arc<dyn RequestListener>>,
    ) -> ImageResult<RequestHandle> {
        let uri = uri.trim();
        let listener = listener.or_else(|| surface.listener());
        let policy = self.policy.load_full();
        let target = surface.id();

        self.registry.save_snapshot(
            target,
            ReattachSnapshot {
                uri: uri.to_string(),
                overrides: overrides.clone(),
            },
        );

        if let Some(listener) = &listener {
            listener.on_started();
        }

        let merged = merge_layers(surface.options(), &policy, &overrides);
        let resolution = resolve_display(
            uri,
            &merged,
            &policy,
            surface.as_ref(),
            self.collaborators.size_calculator().as_ref(),
        )?;

        let descriptor = RequestDescriptor::new(uri, Some(target), resolution.name);
        let options = Arc::new(resolution.options);
        let cache_key = resolution.cache_key;

        let verdict = self.gates.run(&AdmissionContext {
            descriptor: &descriptor,
            options: &options,
            cache_key: cache_key.as_ref(),
            surface: Some(surface),
            collaborators: &self.collaborators,
            registry: &self.registry,
        });

        match verdict {
            Verdict::Pass => self
                .submit(descriptor, options, cache_key, listener, Some(surface))
                .map(RequestHandle::Active),
            Verdict::Reuse(existing) => Ok(RequestHandle::Active(existing)),
            Verdict::Terminate(termination) => {
                self.unbind(target, surface.as_ref());
                apply_image(surface.as_ref(), &termination);
                notify(listener.as_deref(), &termination.outcome);
                Ok(RequestHandle::Settled(Settlement {
                    state: termination.state(),
                    name: descriptor.name,
                }))
            }
        }
    }

    /// Re-commit the last URI and options committed on `surface`, after the
    /// surface was recycled and rebound. `None` if it never displayed anything.
    pub fn redisplay(&self, surface: &Arc<dyn DisplaySurface>) -> ImageResult<Option<RequestHandle>> {
        let Some(snapshot) = self.registry.snapshot(surface.id()) else {
            debug!("Nothing to redisplay on target {}", surface.id());
            return Ok(None);
        };
        self.display(&snapshot.uri, surface, snapshot.overrides.clone(), None)
            .map(Some)
    }

    /// Load `uri` without a display target.
    ///
    /// Returns `None` when the commit ended in the gate chain.
    pub fn load(
        &self,
        uri: &str,
        overrides: OptionOverrides,
        listener: Option<Arc<dyn RequestListener>>,
    ) -> ImageResult<Option<Arc<Request>>> {
        let uri = uri.trim();
        let policy = self.policy.load_full();
        let merged = merge_layers(None, &policy, &overrides);
        let resolution = resolve_load(
            uri,
            &merged,
            &policy,
            self.collaborators.size_calculator().as_ref(),
        );

        if let Some(listener) = &listener {
            listener.on_started();
        }

        let descriptor = RequestDescriptor::new(uri, None, resolution.name);
        let options = Arc::new(resolution.options);

        let verdict = self.gates.run(&AdmissionContext {
            descriptor: &descriptor,
            options: &options,
            cache_key: None,
            surface: None,
            collaborators: &self.collaborators,
            registry: &self.registry,
        });

        match verdict {
            Verdict::Pass => self
                .submit(descriptor, options, None, listener, None)
                .map(Some),
            Verdict::Reuse(existing) => Ok(Some(existing)),
            Verdict::Terminate(termination) => {
                notify(listener.as_deref(), &termination.outcome);
                Ok(None)
            }
        }
    }

    /// Request behind the binding drawn on `surface`, while it is still the
    /// current one for that surface.
    pub fn bound_request(&self, surface: &dyn DisplaySurface) -> Option<Arc<Request>> {
        surface
            .bound_request()
            .and_then(|binding| self.registry.resolve(&binding))
    }

    /// Cancel whatever request currently owns `surface`.
    pub fn cancel(&self, surface: &dyn DisplaySurface) -> bool {
        let Some(request) = self.bound_request(surface) else {
            return false;
        };
        self.registry.release(surface.id());
        surface.set_bound_request(None);
        request.cancel()
    }

    /// Copy a registered preset into the surface's own options, so later
    /// commits on it start from that preset. `false` if `id` is unknown.
    pub fn use_preset(&self, surface: &dyn DisplaySurface, id: impl Into<PresetId>) -> bool {
        let id = id.into();
        let policy = self.policy.load();
        let Some(preset) = policy.preset(&id) else {
            warn!("Preset '{}' not found, surface {} unchanged", id.as_str(), surface.id());
            return false;
        };
        let mut options = surface.options().unwrap_or_default();
        options.apply(preset);
        surface.set_options(options);
        true
    }

    /// Forget a destroyed surface, canceling its request.
    pub fn forget(&self, target: TargetId) {
        if let Some(request) = self.registry.release(target) {
            request.cancel();
        }
        self.registry.forget(target);
    }

    fn submit(
        &self,
        descriptor: RequestDescriptor,
        options: Arc<ResolvedOptions>,
        cache_key: Option<CacheKey>,
        listener: Option<Arc<dyn RequestListener>>,
        surface: Option<&Arc<dyn DisplaySurface>>,
    ) -> ImageResult<Arc<Request>> {
        let request = Request::new(
            descriptor,
            options,
            cache_key,
            listener.clone(),
            surface,
            &self.registry,
            self.collaborators.memory_cache().clone(),
        );

        let callbacks: Arc<dyn ExecutionCallbacks> = request.clone();
        let execution = match self.collaborators.executor().new_request(
            request.descriptor(),
            request.options(),
            callbacks,
        ) {
            Ok(execution) => execution,
            Err(e) => {
                if let Some(listener) = &listener {
                    listener.on_failed(&FailCause::Execution(e.to_string()));
                }
                return Err(e);
            }
        };
        request.attach(execution);

        if let (Some(surface), Some(binding)) = (surface, request.binding()) {
            self.registry.bind(binding.target, &request);
            surface.set_bound_request(Some(binding));
            surface.set_image(SurfaceImage::Loading {
                holder: request.options().loading_image.clone(),
                binding,
            });
        }

        debug!("Submitting request {} - {}", request.id(), request.name());
        if let Err(e) = request.submit() {
            request.on_failed(FailCause::Execution(e.to_string()));
            request.abandon_execution();
            return Err(e);
        }
        Ok(request)
    }

    fn unbind(&self, target: TargetId, surface: &dyn DisplaySurface) {
        if let Some(previous) = self.registry.release(target) {
            debug!(
                "Target {} released request {} - {}",
                target,
                previous.id(),
                previous.name()
            );
        }
        surface.set_bound_request(None);
    }
}

fn apply_image(surface: &dyn DisplaySurface, termination: &Termination) {
    if termination.clear_animation {
        surface.clear_animation();
    }
    if let Some(image) = &termination.image {
        surface.set_image(image.clone());
    }
}

fn notify(listener: Option<&dyn RequestListener>, outcome: &Outcome) {
    let Some(listener) = listener else {
        return;
    };
    match outcome {
        Outcome::Completed { from, mime_type } => listener.on_completed(*from, mime_type.as_deref()),
        Outcome::Failed(cause) => listener.on_failed(cause),
        Outcome::Canceled(cause) => listener.on_canceled(*cause),
    }
}
