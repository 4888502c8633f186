//! Request orchestration layer
//!
//! Commit entry points, the request lifecycle and the tokio-backed
//! execution collaborator.

pub mod engine;
pub mod executor;
pub mod lifecycle;


pub use engine::Engine;
pub use executor::{FetchedImage, ImageSource, TokioExecutor};
pub use lifecycle::{Request, RequestHandle, Settlement};
