//! Options resolution engine.
//!
//! Layers are applied lowest first: surface options, named preset, caller
//! overrides. Derived defaults fill what is still unset, and global policy
//! is applied last so it always wins over caller intent.

use log::{debug, warn};

use super::{
    CacheKey, LevelOrigin, OptionOverrides, Policy, RequestLevel, ResolvedOptions, ScaleType,
};
use crate::{
    config_error,
    core::{DisplaySurface, ImageResult, SizeCalculator},
    display::{default_displayer, default_processor},
};

/// Output of resolution for one commit.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub options: ResolvedOptions,
    /// Present for display-bound requests only.
    pub cache_key: Option<CacheKey>,
    pub name: String,
}

/// Merge the surface's own options, the requested preset and the caller's
/// overrides into one override set.
pub fn merge_layers(
    base: Option<OptionOverrides>,
    policy: &Policy,
    caller: &OptionOverrides,
) -> OptionOverrides {
    let mut merged = base.unwrap_or_default();
    let preset = caller.preset.as_ref().or(merged.preset.as_ref()).cloned();
    if let Some(id) = preset {
        match policy.preset(&id) {
            Some(preset) => merged.apply(preset),
            None => warn!("Preset '{}' not found, ignored", id.as_str()),
        }
    }
    merged.apply(caller);
    merged
}

struct Target<'a> {
    surface: &'a dyn DisplaySurface,
    sizes: &'a dyn SizeCalculator,
}

fn derive(
    overrides: &OptionOverrides,
    policy: &Policy,
    sizes: &dyn SizeCalculator,
    target: Option<&Target<'_>>,
) -> ResolvedOptions {
    let mut resize = overrides.resize;
    if let Some(target) = target {
        if overrides.resize_by_fixed_size == Some(true) {
            // Unmeasured targets leave resize unset.
            resize = target.sizes.measure(target.surface).map(Into::into);
        }
        if let Some(resize) = resize.as_mut() {
            if resize.scale_type.is_none() {
                resize.scale_type = Some(target.surface.scale_type());
            }
        }
    }

    let processor = overrides
        .processor
        .clone()
        .or_else(|| resize.map(|_| default_processor()));

    let max_size = overrides
        .max_size
        .or_else(|| target.and_then(|t| t.sizes.max_size(t.surface)))
        .unwrap_or_else(|| sizes.default_max_size(policy));

    let (request_level, level_origin) = match overrides.request_level {
        Some(level) => (level, None),
        None if target.is_some() && policy.pause_load => {
            (RequestLevel::Memory, Some(LevelOrigin::PauseLoad))
        }
        None if policy.pause_download => (RequestLevel::Local, Some(LevelOrigin::PauseDownload)),
        None => (RequestLevel::Net, None),
    };

    ResolvedOptions {
        cache_in_disk: overrides.cache_in_disk.unwrap_or(true) && policy.cache_in_disk,
        cache_in_memory: target.is_some()
            && overrides.cache_in_memory.unwrap_or(true)
            && policy.cache_in_memory,
        max_size,
        resize,
        force_use_resize: overrides.force_use_resize.unwrap_or(false),
        decode_animated: overrides.decode_animated.unwrap_or(false),
        low_quality: overrides.low_quality.unwrap_or(false) || policy.low_quality_image,
        pixel_format: overrides.pixel_format,
        processor,
        displayer: overrides.displayer.clone().unwrap_or_else(default_displayer),
        loading_image: overrides.loading_image.clone(),
        failed_image: overrides.failed_image.clone(),
        paused_image: overrides.paused_image.clone(),
        request_level,
        level_origin,
    }
}

/// A transition cross-fades from the loading placeholder into the final
/// image, which is only computable against a fixed, center-cropped surface.
fn check_transition_contract(
    uri: &str,
    options: &ResolvedOptions,
    surface: &dyn DisplaySurface,
) -> ImageResult<()> {
    if !options.displayer.is_transition() || options.loading_image.is_none() {
        return Ok(());
    }

    let fixed_size = surface.fixed_size().filter(|size| !size.is_empty());
    let scale_type = surface.scale_type();
    if fixed_size.is_some() && scale_type == ScaleType::CenterCrop {
        return Ok(());
    }

    let size = fixed_size.map_or_else(|| "unbounded".to_string(), |size| size.to_string());
    debug!("Transition contract violated for {uri}");
    Err(config_error!(
        "If you use a transition displayer and a loading image, the surface size must be fixed and its scale type must be center_crop. Now size is {}, scale type is {}",
        size,
        scale_type.as_str()
    ))
}

/// Resolve the options of a display-bound request.
///
/// # Errors
/// Returns `Configuration` when a transition displayer with a loading
/// placeholder targets a surface without fixed size or center-crop scaling
pub fn resolve_display(
    uri: &str,
    overrides: &OptionOverrides,
    policy: &Policy,
    surface: &dyn DisplaySurface,
    sizes: &dyn SizeCalculator,
) -> ImageResult<Resolution> {
    let target = Target { surface, sizes };
    let options = derive(overrides, policy, sizes, Some(&target));
    check_transition_contract(uri, &options, surface)?;

    let cache_key = match &overrides.memory_cache_id {
        Some(id) => CacheKey::from(id.as_str()),
        None => CacheKey::compute(uri, &options),
    };
    let name = overrides
        .name
        .clone()
        .unwrap_or_else(|| cache_key.as_str().to_string());

    Ok(Resolution {
        options,
        cache_key: Some(cache_key),
        name,
    })
}

/// Resolve the options of a headless load request. Target-derived rules and
/// pause-load do not apply.
pub fn resolve_load(
    uri: &str,
    overrides: &OptionOverrides,
    policy: &Policy,
    sizes: &dyn SizeCalculator,
) -> Resolution {
    let options = derive(overrides, policy, sizes, None);
    let name = overrides.name.clone().unwrap_or_else(|| uri.to_string());
    Resolution {
        options,
        cache_key: None,
        name,
    }
}
