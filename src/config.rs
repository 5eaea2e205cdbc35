//! Service configuration.
//!
//! Everything the service needs from its environment lives in one
//! [`ServiceConfig`], built through [`ServiceConfigBuilder`]. `build()`
//! rejects a missing shared secret and a model-artifact path that is not a
//! directory.

use crate::backend::rich_model::validate_artifacts_path;
use crate::error::ConvertError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the conversion service.
///
/// # Example
/// ```rust
/// use docconv::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .shared_secret("s3cret")
///     .pandoc_binary("/usr/local/bin/pandoc")
///     .build()
///     .unwrap();
/// assert_eq!(config.download_timeout_secs, 120);
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Secret shared with the upstream system. Checked on inbound
    /// submissions and sent on outbound callbacks.
    pub shared_secret: String,

    /// Local directory holding the rich-model engine's model artifacts.
    /// If None, the engine fetches or locates its models itself.
    pub artifacts_path: Option<PathBuf>,

    /// Universal converter executable. Default: `pandoc` (looked up on `PATH`).
    pub pandoc_binary: String,

    /// Rich-model engine executable. Default: `docling` (looked up on `PATH`).
    pub docling_binary: String,

    /// Source download timeout in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-artifact upload timeout in seconds. Default: 120.
    pub upload_timeout_secs: u64,

    /// Callback timeout in seconds. Default: 30.
    pub callback_timeout_secs: u64,

    /// Per-invocation universal converter timeout in seconds. Default: 120.
    pub converter_timeout_secs: u64,

    /// Rich-model engine timeout in seconds. Default: 600.
    pub engine_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            shared_secret: String::new(),
            artifacts_path: None,
            pandoc_binary: "pandoc".to_string(),
            docling_binary: "docling".to_string(),
            download_timeout_secs: 120,
            upload_timeout_secs: 120,
            callback_timeout_secs: 30,
            converter_timeout_secs: 120,
            engine_timeout_secs: 600,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("shared_secret", &"<redacted>")
            .field("artifacts_path", &self.artifacts_path)
            .field("pandoc_binary", &self.pandoc_binary)
            .field("docling_binary", &self.docling_binary)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .field("callback_timeout_secs", &self.callback_timeout_secs)
            .field("converter_timeout_secs", &self.converter_timeout_secs)
            .field("engine_timeout_secs", &self.engine_timeout_secs)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }

    pub fn converter_timeout(&self) -> Duration {
        Duration::from_secs(self.converter_timeout_secs)
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn shared_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.shared_secret = secret.into();
        self
    }

    pub fn artifacts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.artifacts_path = Some(path.into());
        self
    }

    pub fn pandoc_binary(mut self, bin: impl Into<String>) -> Self {
        self.config.pandoc_binary = bin.into();
        self
    }

    pub fn docling_binary(mut self, bin: impl Into<String>) -> Self {
        self.config.docling_binary = bin.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs.max(1);
        self
    }

    pub fn callback_timeout_secs(mut self, secs: u64) -> Self {
        self.config.callback_timeout_secs = secs.max(1);
        self
    }

    pub fn converter_timeout_secs(mut self, secs: u64) -> Self {
        self.config.converter_timeout_secs = secs.max(1);
        self
    }

    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.config.engine_timeout_secs = secs.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ConvertError> {
        let c = &self.config;
        if c.shared_secret.trim().is_empty() {
            return Err(ConvertError::Configuration(
                "shared secret (CONVERSION_SERVICE_KEY) is not set".into(),
            ));
        }
        if let Some(ref path) = c.artifacts_path {
            validate_artifacts_path(path)?;
        }
        if c.pandoc_binary.trim().is_empty() || c.docling_binary.trim().is_empty() {
            return Err(ConvertError::Configuration(
                "converter binary names must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
