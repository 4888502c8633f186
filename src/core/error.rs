//! Unified error handling for PixSIX
//!
//! Caller-input problems (blank URI, unknown scheme) are not errors here: they are
//! reported to the request listener. This type covers what has to abort a commit
//! or a configuration load.

use std::fmt;

/// Unified error types for the admission pipeline
#[derive(Debug)]
pub enum ImageError {
    /// Configuration-contract violations and invalid configuration
    Configuration(String),

    /// I/O errors while loading configuration or writing logs
    Io(std::io::Error),

    /// YAML parse failures
    Yaml(serde_yaml::Error),

    /// Configuration validation failures
    Validation(validator::ValidationErrors),

    /// A processor, displayer or gate name that no factory is registered for
    UnknownComponent(String),

    /// The execution collaborator refused or lost a job
    Execution(String),

    /// Internal system errors
    Internal(String),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            ImageError::Io(err) => write!(f, "I/O error: {err}"),
            ImageError::Yaml(err) => write!(f, "YAML error: {err}"),
            ImageError::Validation(err) => write!(f, "Validation error: {err}"),
            ImageError::UnknownComponent(name) => write!(f, "Unknown component: {name}"),
            ImageError::Execution(msg) => write!(f, "Execution error: {msg}"),
            ImageError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ImageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageError::Io(err) => Some(err),
            ImageError::Yaml(err) => Some(err),
            ImageError::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ImageError {
    fn from(err: std::io::Error) -> Self {
        ImageError::Io(err)
    }
}

impl From<serde_yaml::Error> for ImageError {
    fn from(err: serde_yaml::Error) -> Self {
        ImageError::Yaml(err)
    }
}

impl From<validator::ValidationErrors> for ImageError {
    fn from(err: validator::ValidationErrors) -> Self {
        ImageError::Validation(err)
    }
}

/// Result type alias for admission operations
pub type ImageResult<T> = std::result::Result<T, ImageError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> ImageResult<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn with_context(self, context: &str) -> ImageResult<T> {
        self.map_err(|e| ImageError::Internal(format!("{context}: {e}")))
    }
}

/// Convenience macro for configuration errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::ImageError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::ImageError::Configuration(format!($fmt, $($arg)*))
    };
}
