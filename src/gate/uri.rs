use std::sync::Arc;

use log::warn;

use super::{AdmissionGate, Termination, Verdict};
use crate::core::{AdmissionContext, FailCause, SurfaceImage};

pub const URI_GATE_NAME: &str = "uri";
pub const URI_GATE_PRIORITY: i32 = 500;

pub const SCHEME_GATE_NAME: &str = "uri-scheme";
pub const SCHEME_GATE_PRIORITY: i32 = 400;

pub fn create_uri_gate() -> Arc<dyn AdmissionGate> {
    Arc::new(UriGate)
}

pub fn create_scheme_gate() -> Arc<dyn AdmissionGate> {
    Arc::new(SchemeGate)
}

fn failed(ctx: &AdmissionContext<'_>, cause: FailCause) -> Verdict {
    let image = ctx
        .options
        .failed_image
        .clone()
        .map(SurfaceImage::Placeholder);
    Verdict::Terminate(Termination::failed(cause, image))
}

/// Rejects blank URIs.
pub struct UriGate;

impl AdmissionGate for UriGate {
    fn name(&self) -> &str {
        URI_GATE_NAME
    }

    fn priority(&self) -> i32 {
        URI_GATE_PRIORITY
    }

    fn check(&self, ctx: &AdmissionContext<'_>) -> Verdict {
        if !ctx.descriptor.is_blank() {
            return Verdict::Pass;
        }
        warn!("Uri is empty, request failed: {}", ctx.name());
        failed(ctx, FailCause::UriEmpty)
    }
}

/// Rejects URIs that match no supported scheme.
pub struct SchemeGate;

impl AdmissionGate for SchemeGate {
    fn name(&self) -> &str {
        SCHEME_GATE_NAME
    }

    fn priority(&self) -> i32 {
        SCHEME_GATE_PRIORITY
    }

    fn check(&self, ctx: &AdmissionContext<'_>) -> Verdict {
        if ctx.descriptor.scheme.is_some() {
            return Verdict::Pass;
        }
        warn!(
            "Unknown uri scheme '{}', request failed: {}",
            ctx.descriptor.uri,
            ctx.name()
        );
        failed(ctx, FailCause::UriUnsupported)
    }
}
