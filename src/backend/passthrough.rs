//! Passthrough backend (`mdast` track): plain text is already Markdown.

use crate::backend::ArtifactSet;
use crate::error::ConvertError;
use crate::job::ConversionJob;
use crate::pipeline::input;
use crate::transport::HttpTransport;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct PassthroughBackend {
    transport: Arc<dyn HttpTransport>,
    download_timeout: Duration,
}

impl fmt::Debug for PassthroughBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassthroughBackend")
            .field("download_timeout", &self.download_timeout)
            .finish_non_exhaustive()
    }
}

impl PassthroughBackend {
    pub fn new(transport: Arc<dyn HttpTransport>, download_timeout: Duration) -> Self {
        Self {
            transport,
            download_timeout,
        }
    }

    /// Download the source and return it as UTF-8 Markdown.
    ///
    /// Invalid byte sequences become U+FFFD; malformed input never fails.
    pub async fn convert(&self, job: &ConversionJob) -> Result<ArtifactSet, ConvertError> {
        let raw = input::download_bytes(
            self.transport.as_ref(),
            &job.source_download_url,
            self.download_timeout,
        )
        .await?;

        let markdown = match String::from_utf8(raw) {
            Ok(text) => text.into_bytes(),
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned().into_bytes(),
        };

        info!(markdown_bytes = markdown.len(), "Passthrough conversion finished");
        Ok(ArtifactSet::new(markdown))
    }
}
