pub mod duplicate;
pub mod memory_cache;
pub mod request_level;
pub mod uri;

use std::{collections::HashMap, sync::Arc};

use log::debug;
use once_cell::sync::Lazy;

use crate::{
    core::{
        AdmissionContext, CancelCause, FailCause, ImageError, ImageFrom, ImageResult,
        RequestState, SurfaceImage,
    },
    orchestration::Request,
};

/// One admission check.
///
/// Gates run synchronously on the calling thread and must stay fast: no I/O
/// beyond cache lookups.
pub trait AdmissionGate: Send + Sync {
    /// Return the name of this gate
    fn name(&self) -> &str;

    /// Return the priority of this gate. Higher priorities run first.
    fn priority(&self) -> i32;

    /// Decide on the commit described by `ctx`.
    ///
    /// # Returns
    ///
    /// * `Verdict::Pass` to continue with the next gate
    /// * `Verdict::Terminate` to end the commit without creating a request
    /// * `Verdict::Reuse` to hand back an in-flight request instead
    fn check(&self, ctx: &AdmissionContext<'_>) -> Verdict;
}

/// Terminal notification produced by a short-circuiting gate.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Completed {
        from: ImageFrom,
        mime_type: Option<String>,
    },
    Failed(FailCause),
    Canceled(CancelCause),
}

/// How a gate ends a commit: what the surface shows and what the listener hears.
#[derive(Clone, Debug)]
pub struct Termination {
    pub outcome: Outcome,
    /// `None` leaves the surface image untouched.
    pub image: Option<SurfaceImage>,
    pub clear_animation: bool,
}

impl Termination {
    pub fn failed(cause: FailCause, image: Option<SurfaceImage>) -> Self {
        Self {
            outcome: Outcome::Failed(cause),
            image,
            clear_animation: false,
        }
    }

    pub fn canceled(cause: CancelCause, image: Option<SurfaceImage>) -> Self {
        Self {
            outcome: Outcome::Canceled(cause),
            image,
            clear_animation: true,
        }
    }

    pub fn state(&self) -> RequestState {
        match self.outcome {
            Outcome::Completed { .. } => RequestState::SatisfiedFromCache,
            Outcome::Failed(_) => RequestState::Failed,
            Outcome::Canceled(_) => RequestState::Cancelled,
        }
    }
}

pub enum Verdict {
    Pass,
    Terminate(Termination),
    Reuse(Arc<Request>),
}

/// Ordered, short-circuiting chain of gates.
#[derive(Default, Clone)]
pub struct GateChain {
    gates: Vec<Arc<dyn AdmissionGate>>,
}

impl GateChain {
    /// Build a chain from `gates`, ordered by descending priority.
    pub fn new(mut gates: Vec<Arc<dyn AdmissionGate>>) -> Self {
        gates.sort_by_key(|gate| std::cmp::Reverse(gate.priority()));
        Self { gates }
    }

    /// Every registered gate, highest priority first.
    pub fn standard() -> Self {
        Self::new(GATE_BUILDER_REGISTRY.values().map(|builder| builder()).collect())
    }

    /// Build a chain from registered gate names.
    ///
    /// # Errors
    /// Returns `UnknownComponent` for names without a registered factory
    pub fn from_names(names: &[&str]) -> ImageResult<Self> {
        let gates = names
            .iter()
            .map(|name| build_gate(name))
            .collect::<ImageResult<Vec<_>>>()?;
        Ok(Self::new(gates))
    }

    pub fn names(&self) -> Vec<&str> {
        self.gates.iter().map(|gate| gate.name()).collect()
    }

    pub fn run(&self, ctx: &AdmissionContext<'_>) -> Verdict {
        for gate in self.gates.iter() {
            match gate.check(ctx) {
                Verdict::Pass => continue,
                verdict => {
                    debug!("Gate '{}' settled {}", gate.name(), ctx.name());
                    return verdict;
                }
            }
        }
        Verdict::Pass
    }
}

pub type GateCreateFn = fn() -> Arc<dyn AdmissionGate>;

/// Global registry mapping gate names to their factory functions.
static GATE_BUILDER_REGISTRY: Lazy<HashMap<&'static str, GateCreateFn>> = Lazy::new(|| {
    let arr: Vec<(&str, GateCreateFn)> = vec![
        (uri::URI_GATE_NAME, uri::create_uri_gate), // 500
        (uri::SCHEME_GATE_NAME, uri::create_scheme_gate), // 400
        (memory_cache::GATE_NAME, memory_cache::create_gate), // 300
        (request_level::GATE_NAME, request_level::create_gate), // 200
        (duplicate::GATE_NAME, duplicate::create_gate), // 100
    ];
    arr.into_iter().collect()
});

/// Creates a gate by its registered name.
pub fn build_gate(name: &str) -> ImageResult<Arc<dyn AdmissionGate>> {
    GATE_BUILDER_REGISTRY
        .get(name)
        .map(|builder| builder())
        .ok_or_else(|| ImageError::UnknownComponent(format!("gate '{name}'")))
}
