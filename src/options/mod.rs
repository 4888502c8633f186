//! Request options: caller overrides, the runtime policy snapshot, and the
//! fully resolved option set handed to the gate chain.

pub mod cache_key;
pub mod resolve;
pub mod size;
pub mod uri;

use std::{collections::HashMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    config::Config,
    core::ImageResult,
    display::{ImageDisplayer, ImageProcessor},
};

pub use cache_key::CacheKey;
pub use resolve::{resolve_display, resolve_load, Resolution};
pub use size::FixedSizeCalculator;
pub use uri::{RequestDescriptor, UriScheme};

/// Width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct Size {
    #[validate(range(min = 1))]
    pub width: u32,
    #[validate(range(min = 1))]
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How an image is fitted into its target bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleType {
    Matrix,
    FitXy,
    FitStart,
    FitCenter,
    FitEnd,
    Center,
    CenterCrop,
    CenterInside,
}

impl ScaleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleType::Matrix => "matrix",
            ScaleType::FitXy => "fit_xy",
            ScaleType::FitStart => "fit_start",
            ScaleType::FitCenter => "fit_center",
            ScaleType::FitEnd => "fit_end",
            ScaleType::Center => "center",
            ScaleType::CenterCrop => "center_crop",
            ScaleType::CenterInside => "center_inside",
        }
    }
}

/// Target dimensions for post-decode cropping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub scale_type: Option<ScaleType>,
}

impl Resize {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            scale_type: None,
        }
    }

    pub fn with_scale(width: u32, height: u32, scale_type: ScaleType) -> Self {
        Self {
            width,
            height,
            scale_type: Some(scale_type),
        }
    }
}

impl From<Size> for Resize {
    fn from(size: Size) -> Self {
        Resize::new(size.width, size.height)
    }
}

/// Decoded pixel layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Alpha8,
    Rgb565,
    Argb4444,
    Argb8888,
}

impl PixelFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PixelFormat::Alpha8 => "alpha_8",
            PixelFormat::Rgb565 => "rgb_565",
            PixelFormat::Argb4444 => "argb_4444",
            PixelFormat::Argb8888 => "argb_8888",
        }
    }
}

/// How far a request may reach to find its image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestLevel {
    /// Memory cache, disk cache and network.
    #[default]
    Net,
    /// Memory and disk cache only; network URIs without a disk entry are not fetched.
    Local,
    /// Memory cache only.
    Memory,
}

/// Why a request level was imposed instead of chosen by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LevelOrigin {
    PauseDownload,
    PauseLoad,
}

/// Reference to a placeholder image resource (loading, failed, paused).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageHolder(pub String);

impl ImageHolder {
    pub fn new(resource: impl Into<String>) -> Self {
        Self(resource.into())
    }

    pub fn resource(&self) -> &str {
        &self.0
    }
}

/// Opaque identifier of a named option preset.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PresetId(String);

impl PresetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PresetId {
    fn from(value: &str) -> Self {
        PresetId(value.to_string())
    }
}

impl From<String> for PresetId {
    fn from(value: String) -> Self {
        PresetId(value)
    }
}

/// Caller-facing option layer. Every field is optional; unset fields are
/// filled by lower layers or derived during resolution.
#[derive(Clone, Debug, Default)]
pub struct OptionOverrides {
    pub name: Option<String>,
    pub memory_cache_id: Option<String>,
    pub cache_in_disk: Option<bool>,
    pub cache_in_memory: Option<bool>,
    pub request_level: Option<RequestLevel>,
    pub decode_animated: Option<bool>,
    pub max_size: Option<Size>,
    pub resize: Option<Resize>,
    pub resize_by_fixed_size: Option<bool>,
    pub force_use_resize: Option<bool>,
    pub low_quality: Option<bool>,
    pub pixel_format: Option<PixelFormat>,
    pub processor: Option<Arc<dyn ImageProcessor>>,
    pub displayer: Option<Arc<dyn ImageDisplayer>>,
    pub loading_image: Option<ImageHolder>,
    pub failed_image: Option<ImageHolder>,
    pub paused_image: Option<ImageHolder>,
    pub preset: Option<PresetId>,
}

macro_rules! merge_fields {
    ($dst:expr, $src:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$src.$field {
                $dst.$field = Some(value.clone());
            }
        )+
    };
}

impl OptionOverrides {
    /// Layer `newer` on top of `self`: fields set in `newer` win, unset fields
    /// keep their current value.
    pub fn apply(&mut self, newer: &OptionOverrides) {
        merge_fields!(
            self,
            newer,
            name,
            memory_cache_id,
            cache_in_disk,
            cache_in_memory,
            request_level,
            decode_animated,
            max_size,
            resize,
            resize_by_fixed_size,
            force_use_resize,
            low_quality,
            pixel_format,
            processor,
            displayer,
            loading_image,
            failed_image,
            paused_image,
            preset,
        );
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn preset(mut self, id: impl Into<PresetId>) -> Self {
        self.preset = Some(id.into());
        self
    }

    pub fn request_level(mut self, level: RequestLevel) -> Self {
        self.request_level = Some(level);
        self
    }

    pub fn resize(mut self, resize: Resize) -> Self {
        self.resize = Some(resize);
        self
    }

    pub fn resize_by_fixed_size(mut self) -> Self {
        self.resize_by_fixed_size = Some(true);
        self
    }

    pub fn max_size(mut self, width: u32, height: u32) -> Self {
        self.max_size = Some(Size::new(width, height));
        self
    }

    pub fn disable_memory_cache(mut self) -> Self {
        self.cache_in_memory = Some(false);
        self
    }

    pub fn disable_disk_cache(mut self) -> Self {
        self.cache_in_disk = Some(false);
        self
    }

    pub fn low_quality(mut self) -> Self {
        self.low_quality = Some(true);
        self
    }

    pub fn processor(mut self, processor: Arc<dyn ImageProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn displayer(mut self, displayer: Arc<dyn ImageDisplayer>) -> Self {
        self.displayer = Some(displayer);
        self
    }

    pub fn loading_image(mut self, holder: impl Into<String>) -> Self {
        self.loading_image = Some(ImageHolder::new(holder));
        self
    }

    pub fn failed_image(mut self, holder: impl Into<String>) -> Self {
        self.failed_image = Some(ImageHolder::new(holder));
        self
    }

    pub fn paused_image(mut self, holder: impl Into<String>) -> Self {
        self.paused_image = Some(ImageHolder::new(holder));
        self
    }
}

/// Fully populated option set. Built once per commit and never mutated.
#[derive(Clone, Debug)]
pub struct ResolvedOptions {
    pub cache_in_disk: bool,
    pub cache_in_memory: bool,
    pub max_size: Size,
    pub resize: Option<Resize>,
    pub force_use_resize: bool,
    pub decode_animated: bool,
    pub low_quality: bool,
    pub pixel_format: Option<PixelFormat>,
    pub processor: Option<Arc<dyn ImageProcessor>>,
    pub displayer: Arc<dyn ImageDisplayer>,
    pub loading_image: Option<ImageHolder>,
    pub failed_image: Option<ImageHolder>,
    pub paused_image: Option<ImageHolder>,
    pub request_level: RequestLevel,
    pub level_origin: Option<LevelOrigin>,
}

/// Process-wide policy, read once per admission and passed explicitly to
/// the resolution engine.
#[derive(Clone, Debug)]
pub struct Policy {
    pub cache_in_disk: bool,
    pub cache_in_memory: bool,
    pub low_quality_image: bool,
    pub pause_download: bool,
    pub pause_load: bool,
    pub default_max_size: Size,
    pub presets: HashMap<PresetId, OptionOverrides>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            cache_in_disk: true,
            cache_in_memory: true,
            low_quality_image: false,
            pause_download: false,
            pause_load: false,
            default_max_size: Config::default_max_size(),
            presets: HashMap::new(),
        }
    }
}

impl Policy {
    /// Build a policy snapshot from a validated configuration, materializing
    /// the named presets through the component registries.
    pub fn from_config(config: &Config) -> ImageResult<Self> {
        let presets = config
            .presets
            .iter()
            .map(|(name, preset)| {
                log::debug!("Configuring preset: {name}");
                Ok((PresetId::from(name.as_str()), preset.to_overrides()?))
            })
            .collect::<ImageResult<HashMap<_, _>>>()?;

        Ok(Self {
            cache_in_disk: config.cache.disk,
            cache_in_memory: config.cache.memory,
            low_quality_image: config.low_quality_image,
            pause_download: config.pause_download,
            pause_load: config.pause_load,
            default_max_size: config.default_max_size,
            presets,
        })
    }

    pub fn preset(&self, id: &PresetId) -> Option<&OptionOverrides> {
        self.presets.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_only_overwrites_set_fields() {
        let mut base = OptionOverrides::default()
            .max_size(100, 100)
            .loading_image("res/loading")
            .request_level(RequestLevel::Local);
        let newer = OptionOverrides::default()
            .max_size(200, 300)
            .failed_image("res/failed");

        base.apply(&newer);

        assert_eq!(base.max_size, Some(Size::new(200, 300)));
        assert_eq!(base.loading_image, Some(ImageHolder::new("res/loading")));
        assert_eq!(base.failed_image, Some(ImageHolder::new("res/failed")));
        assert_eq!(base.request_level, Some(RequestLevel::Local));
    }

    #[test]
    fn test_size_is_empty() {
        assert!(Size::new(0, 10).is_empty());
        assert!(Size::new(10, 0).is_empty());
        assert!(!Size::new(1, 1).is_empty());
        assert_eq!(Size::new(3, 4).to_string(), "3x4");
    }
}
