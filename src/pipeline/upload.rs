//! Artifact upload to pre-signed storage URLs.
//!
//! One PUT per artifact, no retry.

use crate::error::{truncate_chars, ConvertError, MAX_UPLOAD_BODY_CHARS};
use crate::job::OutputTarget;
use crate::transport::HttpTransport;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Pushes artifact bytes to their [`OutputTarget`]s.
#[derive(Clone)]
pub struct ArtifactUploader {
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl ArtifactUploader {
    pub fn new(transport: Arc<dyn HttpTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// PUT `bytes` to the target's (token-adjusted) URL.
    pub async fn upload(
        &self,
        target: &OutputTarget,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ConvertError> {
        let url = target.upload_url();
        let size = bytes.len();
        debug!(bucket = %target.bucket, key = %target.key, size, "Uploading artifact");

        let response = self
            .transport
            .put(&url, bytes, content_type, self.timeout)
            .await
            .map_err(|e| ConvertError::Upload {
                status: None,
                detail: format!("{} ({})", e, target.key),
            })?;

        if !response.is_success() {
            let body = truncate_chars(&response.text(), MAX_UPLOAD_BODY_CHARS);
            return Err(ConvertError::Upload {
                status: Some(response.status),
                detail: format!("HTTP {} {}", response.status, body),
            });
        }

        info!(key = %target.key, size, "Uploaded artifact");
        Ok(())
    }
}
