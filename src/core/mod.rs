//! Core abstractions and interfaces for PixSIX
//!
//! This module provides the collaborator traits, the request state machine,
//! the target slot registry and the unified error type.

pub mod container;
pub mod context;
pub mod error;
pub mod registry;
pub mod status;
pub mod traits;


// Re-export commonly used types
pub use container::Collaborators;
pub use context::AdmissionContext;
pub use error::{ErrorContext, ImageError, ImageResult};
pub use registry::{ReattachSnapshot, SlotRegistry, SlotStats};
pub use status::{AtomicState, CancelCause, FailCause, ImageFrom, RequestState};
pub use traits::*;
