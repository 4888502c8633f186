use std::{collections::HashMap, fs, str::FromStr};

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{
    core::{ErrorContext, ImageResult},
    display::{build_displayer, build_processor, is_known_displayer, is_known_processor},
    options::{ImageHolder, OptionOverrides, PixelFormat, RequestLevel, Resize, Size},
};

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub cache: CacheConfig,

    pub low_quality_image: bool,
    pub pause_download: bool,
    pub pause_load: bool,

    #[validate(nested)]
    pub default_max_size: Size,

    #[validate(nested)]
    pub executor: ExecutorConfig,

    #[validate(nested)]
    pub log: Option<Log>,

    #[validate(nested)]
    pub presets: HashMap<String, PresetConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            low_quality_image: false,
            pause_download: false,
            pause_load: false,
            default_max_size: Self::default_max_size(),
            executor: ExecutorConfig::default(),
            log: None,
            presets: HashMap::new(),
        }
    }
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> ImageResult<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path)?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    pub fn from_yaml(conf_str: &str) -> ImageResult<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str)?;

        trace!("Loaded conf: {conf:?}");

        // use validator to validate conf file
        conf.validate()?;

        Ok(conf)
    }

    pub fn to_yaml(&self) -> ImageResult<String> {
        serde_yaml::to_string(self).with_context("Unable to serialize conf")
    }

    /// Decode bound used when neither the caller nor the surface sets one.
    pub fn default_max_size() -> Size {
        Size::new(1080, 1920)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CacheConfig {
    pub disk: bool,
    pub memory: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            disk: true,
            memory: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct ExecutorConfig {
    #[serde(default = "ExecutorConfig::default_max_concurrency")]
    #[validate(range(min = 1))]
    pub max_concurrency: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: Self::default_max_concurrency(),
        }
    }
}

impl ExecutorConfig {
    fn default_max_concurrency() -> usize {
        10
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Log {
    pub path: String,
    #[serde(default = "Log::default_level")]
    #[validate(custom(function = "Log::validate_level"))]
    pub level: String,
}

impl Log {
    fn default_level() -> String {
        "info".to_string()
    }

    fn validate_level(level: &str) -> Result<(), ValidationError> {
        log::LevelFilter::from_str(level)
            .map(|_| ())
            .map_err(|_| ValidationError::new("invalid_log_level"))
    }
}

/// A named option preset as written in the config file. Processors and
/// displayers are referenced by their registered names.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "PresetConfig::validate_components"))]
pub struct PresetConfig {
    pub cache_in_disk: Option<bool>,
    pub cache_in_memory: Option<bool>,
    pub request_level: Option<RequestLevel>,
    pub decode_animated: Option<bool>,
    #[validate(nested)]
    pub max_size: Option<Size>,
    pub resize: Option<Resize>,
    pub resize_by_fixed_size: Option<bool>,
    pub force_use_resize: Option<bool>,
    pub low_quality: Option<bool>,
    pub pixel_format: Option<PixelFormat>,
    pub processor: Option<String>,
    pub displayer: Option<String>,
    pub loading_image: Option<ImageHolder>,
    pub failed_image: Option<ImageHolder>,
    pub paused_image: Option<ImageHolder>,
}

impl PresetConfig {
    fn validate_components(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.processor {
            if !is_known_processor(name) {
                let mut err = ValidationError::new("unknown_processor");
                err.add_param("name".into(), name);
                return Err(err);
            }
        }
        if let Some(name) = &self.displayer {
            if !is_known_displayer(name) {
                let mut err = ValidationError::new("unknown_displayer");
                err.add_param("name".into(), name);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Materialize this preset into an override layer.
    pub fn to_overrides(&self) -> ImageResult<OptionOverrides> {
        let processor = self
            .processor
            .as_deref()
            .map(build_processor)
            .transpose()?;
        let displayer = self
            .displayer
            .as_deref()
            .map(build_displayer)
            .transpose()?;

        Ok(OptionOverrides {
            cache_in_disk: self.cache_in_disk,
            cache_in_memory: self.cache_in_memory,
            request_level: self.request_level,
            decode_animated: self.decode_animated,
            max_size: self.max_size,
            resize: self.resize,
            resize_by_fixed_size: self.resize_by_fixed_size,
            force_use_resize: self.force_use_resize,
            low_quality: self.low_quality,
            pixel_format: self.pixel_format,
            processor,
            displayer,
            loading_image: self.loading_image.clone(),
            failed_image: self.failed_image.clone(),
            paused_image: self.paused_image.clone(),
            ..Default::default()
        })
    }
}
