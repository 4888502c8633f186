use std::fmt::{self, Write};

use super::ResolvedOptions;

/// Memory-cache identity of a decoded image: the URI plus every option that
/// changes the decoded pixels.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn compute(uri: &str, options: &ResolvedOptions) -> Self {
        let mut key = String::from(uri);
        // Writing into a String cannot fail.
        let _ = write!(key, "_maxSize({})", options.max_size);
        if let Some(resize) = &options.resize {
            let _ = write!(key, "_resize({}x{}", resize.width, resize.height);
            if let Some(scale_type) = resize.scale_type {
                let _ = write!(key, ",{}", scale_type.as_str());
            }
            key.push(')');
            if options.force_use_resize {
                key.push_str("_forceUseResize");
            }
        }
        if options.low_quality {
            key.push_str("_lowQuality");
        }
        if options.decode_animated {
            key.push_str("_animated");
        }
        if let Some(processor) = &options.processor {
            let _ = write!(key, "_{}", processor.key());
        }
        if let Some(format) = options.pixel_format {
            let _ = write!(key, "_pixelFormat({})", format.as_str());
        }
        CacheKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        CacheKey(value)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        CacheKey(value.to_string())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
