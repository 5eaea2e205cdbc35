//! Completion callback.
//!
//! Exactly one callback is sent per job, whatever happened before it.
//! Delivery is a single attempt. A failure is returned to the caller, which
//! logs and drops it; upstream, a TTL sweep marks such jobs as failed.

use crate::error::ConvertError;
use crate::job::{ArtifactKind, ConversionJob};
use crate::transport::HttpTransport;
use crate::SERVICE_KEY_HEADER;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Body of the completion callback.
///
/// Storage keys are present only for artifacts that were actually uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub source_uid: String,
    pub conversion_job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docling_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pandoc_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctags_key: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

impl CallbackPayload {
    /// A pessimistic payload: not successful, nothing uploaded.
    pub fn pending(job: &ConversionJob) -> Self {
        Self {
            source_uid: job.source_uid.clone(),
            conversion_job_id: job.conversion_job_id.clone(),
            md_key: None,
            docling_key: None,
            pandoc_key: None,
            html_key: None,
            doctags_key: None,
            success: false,
            error: None,
        }
    }

    fn slot(&mut self, kind: ArtifactKind) -> &mut Option<String> {
        match kind {
            ArtifactKind::Markdown => &mut self.md_key,
            ArtifactKind::DoclingJson => &mut self.docling_key,
            ArtifactKind::PandocAst => &mut self.pandoc_key,
            ArtifactKind::Html => &mut self.html_key,
            ArtifactKind::DocTags => &mut self.doctags_key,
        }
    }

    /// Storage key recorded for `kind`, if it was uploaded.
    pub fn key(&self, kind: ArtifactKind) -> Option<&str> {
        match kind {
            ArtifactKind::Markdown => self.md_key.as_deref(),
            ArtifactKind::DoclingJson => self.docling_key.as_deref(),
            ArtifactKind::PandocAst => self.pandoc_key.as_deref(),
            ArtifactKind::Html => self.html_key.as_deref(),
            ArtifactKind::DocTags => self.doctags_key.as_deref(),
        }
    }

    /// Record that `kind` landed at `key`.
    pub fn record_upload(&mut self, kind: ArtifactKind, key: impl Into<String>) {
        *self.slot(kind) = Some(key.into());
    }
}

/// Posts [`CallbackPayload`]s, authenticated with the shared secret.
#[derive(Clone)]
pub struct CallbackReporter {
    transport: Arc<dyn HttpTransport>,
    shared_secret: String,
    timeout: Duration,
}

impl CallbackReporter {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        shared_secret: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            shared_secret: shared_secret.into(),
            timeout,
        }
    }

    /// POST `payload` to `callback_url`. Single attempt.
    pub async fn report(
        &self,
        callback_url: &str,
        payload: &CallbackPayload,
    ) -> Result<(), ConvertError> {
        let body = serde_json::to_value(payload)
            .map_err(|e| ConvertError::Internal(format!("callback payload: {e}")))?;
        let headers = [(SERVICE_KEY_HEADER, self.shared_secret.as_str())];

        let response = self
            .transport
            .post_json(callback_url, &body, &headers, self.timeout)
            .await
            .map_err(|e| ConvertError::Callback {
                url: callback_url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(ConvertError::Callback {
                url: callback_url.to_string(),
                reason: format!("HTTP {}", response.status),
            });
        }

        debug!(status = response.status, "Callback delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::OutputTarget;

    fn job() -> ConversionJob {
        ConversionJob::new(
            "src",
            "job",
            "pdf",
            "https://x.test/s",
            OutputTarget {
                bucket: "b".into(),
                key: "k.md".into(),
                signed_upload_url: "https://x.test/u".into(),
                token: None,
            },
            "https://x.test/cb",
        )
    }

    #[test]
    fn pending_payload_serialises_null_error_and_no_keys() {
        let v = serde_json::to_value(CallbackPayload::pending(&job())).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "source_uid": "src",
                "conversion_job_id": "job",
                "success": false,
                "error": null
            })
        );
    }

    #[test]
    fn recorded_keys_are_serialised() {
        let mut p = CallbackPayload::pending(&job());
        p.record_upload(ArtifactKind::Markdown, "k.md");
        p.record_upload(ArtifactKind::PandocAst, "k.pandoc.ast.json");
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["md_key"], "k.md");
        assert_eq!(v["pandoc_key"], "k.pandoc.ast.json");
        assert!(v.get("docling_key").is_none());
        assert_eq!(p.key(ArtifactKind::PandocAst), Some("k.pandoc.ast.json"));
        assert_eq!(p.key(ArtifactKind::Html), None);
    }
}
