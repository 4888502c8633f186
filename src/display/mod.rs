//! Image processors and displayers.
//!
//! Processing and transition rendering happen downstream; this crate only
//! needs their identities (processor keys feed the cache key) and whether a
//! displayer animates from the placeholder.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use once_cell::sync::Lazy;

use crate::core::{ImageError, ImageResult};

/// Post-decode pixel transformation.
pub trait ImageProcessor: Send + Sync + fmt::Debug {
    /// Stable identity, appended to the cache key.
    fn key(&self) -> &str;
}

/// Renders a finished image into its surface.
pub trait ImageDisplayer: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Whether this displayer cross-fades from the current placeholder.
    fn is_transition(&self) -> bool {
        false
    }

    fn duration(&self) -> Duration {
        Duration::ZERO
    }
}

pub const CROP_PROCESSOR: &str = "crop";
pub const DEFAULT_DISPLAYER: &str = "default";
pub const TRANSITION_DISPLAYER: &str = "transition";
pub const FADE_IN_DISPLAYER: &str = "fade-in";

const DEFAULT_ANIMATION_DURATION: Duration = Duration::from_millis(400);

/// Crops the decoded image to the resize bounds according to its scale type.
#[derive(Debug, Default, Clone, Copy)]
pub struct CropProcessor;

impl ImageProcessor for CropProcessor {
    fn key(&self) -> &str {
        CROP_PROCESSOR
    }
}

/// Swaps the image in without animation.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDisplayer;

impl ImageDisplayer for DefaultDisplayer {
    fn name(&self) -> &str {
        DEFAULT_DISPLAYER
    }
}

/// Cross-fades from the loading placeholder to the final image.
#[derive(Debug, Clone, Copy)]
pub struct TransitionDisplayer {
    pub duration: Duration,
}

impl Default for TransitionDisplayer {
    fn default() -> Self {
        Self {
            duration: DEFAULT_ANIMATION_DURATION,
        }
    }
}

impl ImageDisplayer for TransitionDisplayer {
    fn name(&self) -> &str {
        TRANSITION_DISPLAYER
    }

    fn is_transition(&self) -> bool {
        true
    }

    fn duration(&self) -> Duration {
        self.duration
    }
}

/// Fades the final image in over an empty surface.
#[derive(Debug, Clone, Copy)]
pub struct FadeInDisplayer {
    pub duration: Duration,
}

impl Default for FadeInDisplayer {
    fn default() -> Self {
        Self {
            duration: DEFAULT_ANIMATION_DURATION,
        }
    }
}

impl ImageDisplayer for FadeInDisplayer {
    fn name(&self) -> &str {
        FADE_IN_DISPLAYER
    }

    fn duration(&self) -> Duration {
        self.duration
    }
}

pub type ProcessorCreateFn = fn() -> Arc<dyn ImageProcessor>;
pub type DisplayerCreateFn = fn() -> Arc<dyn ImageDisplayer>;

fn create_crop_processor() -> Arc<dyn ImageProcessor> {
    Arc::new(CropProcessor)
}

fn create_default_displayer() -> Arc<dyn ImageDisplayer> {
    Arc::new(DefaultDisplayer)
}

fn create_transition_displayer() -> Arc<dyn ImageDisplayer> {
    Arc::new(TransitionDisplayer::default())
}

fn create_fade_in_displayer() -> Arc<dyn ImageDisplayer> {
    Arc::new(FadeInDisplayer::default())
}

static PROCESSOR_BUILDER_REGISTRY: Lazy<HashMap<&'static str, ProcessorCreateFn>> =
    Lazy::new(|| {
        let arr: Vec<(&str, ProcessorCreateFn)> = vec![(CROP_PROCESSOR, create_crop_processor)];
        arr.into_iter().collect()
    });

static DISPLAYER_BUILDER_REGISTRY: Lazy<HashMap<&'static str, DisplayerCreateFn>> =
    Lazy::new(|| {
        let arr: Vec<(&str, DisplayerCreateFn)> = vec![
            (DEFAULT_DISPLAYER, create_default_displayer),
            (TRANSITION_DISPLAYER, create_transition_displayer),
            (FADE_IN_DISPLAYER, create_fade_in_displayer),
        ];
        arr.into_iter().collect()
    });

/// Creates a processor by its registered name.
///
/// # Errors
/// Returns `UnknownComponent` for names without a registered factory
pub fn build_processor(name: &str) -> ImageResult<Arc<dyn ImageProcessor>> {
    PROCESSOR_BUILDER_REGISTRY
        .get(name)
        .map(|builder| builder())
        .ok_or_else(|| ImageError::UnknownComponent(format!("processor '{name}'")))
}

/// Creates a displayer by its registered name.
///
/// # Errors
/// Returns `UnknownComponent` for names without a registered factory
pub fn build_displayer(name: &str) -> ImageResult<Arc<dyn ImageDisplayer>> {
    DISPLAYER_BUILDER_REGISTRY
        .get(name)
        .map(|builder| builder())
        .ok_or_else(|| ImageError::UnknownComponent(format!("displayer '{name}'")))
}

pub fn is_known_processor(name: &str) -> bool {
    PROCESSOR_BUILDER_REGISTRY.contains_key(name)
}

pub fn is_known_displayer(name: &str) -> bool {
    DISPLAYER_BUILDER_REGISTRY.contains_key(name)
}

/// The processor installed when a resize is requested without one.
pub fn default_processor() -> Arc<dyn ImageProcessor> {
    create_crop_processor()
}

pub fn default_displayer() -> Arc<dyn ImageDisplayer> {
    create_default_displayer()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_known_components() {
        assert_eq!(build_processor("crop").unwrap().key(), "crop");
        assert!(build_displayer("transition").unwrap().is_transition());
        assert!(!build_displayer("fade-in").unwrap().is_transition());
        assert_eq!(build_displayer("default").unwrap().name(), "default");
    }

    #[test]
    fn test_build_unknown_component() {
        let err = build_processor("blur").unwrap_err();
        assert!(matches!(err, ImageError::UnknownComponent(_)));
        assert!(build_displayer("zoom").is_err());
        assert!(!is_known_displayer("zoom"));
    }
}
