//! This crate contains the admission and coalescing front-end of the PixSIX image loader.
//!
//! It turns a "show this image with these options" call into either an instant
//! memory-cache hit or a coordinated asynchronous fetch/decode/display job.

pub mod cache;
pub mod config;
pub mod core;
pub mod display;
pub mod gate;
pub mod logging;
pub mod options;
pub mod orchestration;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::core::{ImageError, ImageResult};
pub use orchestration::{Engine, Request, RequestHandle};
