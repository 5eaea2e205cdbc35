//! Conversion backends.
//!
//! Each track maps to exactly one backend variant. The mapping is the pure
//! function [`Backends::select`]; nothing downstream inspects backend types.
//!
//! ```text
//! Track::Passthrough         ──▶ passthrough   (download, lossy UTF-8)
//! Track::RichModel           ──▶ rich_model    (document engine, remote URL)
//! Track::UniversalConverter  ──▶ universal     (temp file, converter ×2)
//! ```
//!
//! Beyond its own artifacts, a rich-model job may ask for the converter's
//! AST and a universal-converter job may ask for the engine's structured
//! JSON. [`Backends::convert`] adds those cross-track artifacts when the
//! source type is readable by the other side.

pub mod passthrough;
pub mod process;
pub mod rich_model;
pub mod universal;

use crate::error::ConvertError;
use crate::job::{ArtifactKind, ConversionJob, Track};
use std::collections::BTreeMap;
use tracing::debug;

pub use passthrough::PassthroughBackend;
pub use rich_model::{
    DoclingCli, DocumentEngine, EngineOutput, ExportFormat, RichModelBackend, SharedEngine,
};
pub use universal::{ConverterRunner, PandocCli, UniversalConverterBackend};

/// The artifacts produced by one backend invocation.
///
/// Markdown is always present. Supplemental blobs are keyed by kind and
/// iterate in upload order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    markdown: Vec<u8>,
    supplemental: BTreeMap<ArtifactKind, Vec<u8>>,
}

impl ArtifactSet {
    pub fn new(markdown: impl Into<Vec<u8>>) -> Self {
        Self {
            markdown: markdown.into(),
            supplemental: BTreeMap::new(),
        }
    }

    pub fn with(mut self, kind: ArtifactKind, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(kind, bytes.into());
        self
    }

    /// Add a supplemental artifact. Markdown is fixed at construction.
    pub fn insert(&mut self, kind: ArtifactKind, bytes: Vec<u8>) {
        debug_assert!(kind != ArtifactKind::Markdown, "markdown is set by ArtifactSet::new");
        if kind != ArtifactKind::Markdown {
            self.supplemental.insert(kind, bytes);
        }
    }

    pub fn markdown(&self) -> &[u8] {
        &self.markdown
    }

    pub fn get(&self, kind: ArtifactKind) -> Option<&[u8]> {
        match kind {
            ArtifactKind::Markdown => Some(&self.markdown),
            other => self.supplemental.get(&other).map(Vec::as_slice),
        }
    }

    pub fn supplemental_count(&self) -> usize {
        self.supplemental.len()
    }

    /// Consume the set: Markdown, then supplementals in upload order.
    pub fn into_parts(self) -> (Vec<u8>, Vec<(ArtifactKind, Vec<u8>)>) {
        (self.markdown, self.supplemental.into_iter().collect())
    }
}

/// A selected backend, borrowed from [`Backends`].
#[derive(Debug, Clone, Copy)]
pub enum Backend<'a> {
    Passthrough(&'a PassthroughBackend),
    RichModel(&'a RichModelBackend),
    UniversalConverter(&'a UniversalConverterBackend),
}

impl Backend<'_> {
    pub async fn convert(&self, job: &ConversionJob) -> Result<ArtifactSet, ConvertError> {
        match self {
            Backend::Passthrough(b) => b.convert(job).await,
            Backend::RichModel(b) => b.convert(job).await,
            Backend::UniversalConverter(b) => b.convert(job).await,
        }
    }
}

/// All backends the service can dispatch to.
#[derive(Clone)]
pub struct Backends {
    pub passthrough: PassthroughBackend,
    pub rich_model: RichModelBackend,
    pub universal: UniversalConverterBackend,
}

impl Backends {
    /// The backend serving `track`.
    pub fn select(&self, track: Track) -> Backend<'_> {
        match track {
            Track::Passthrough => Backend::Passthrough(&self.passthrough),
            Track::RichModel => Backend::RichModel(&self.rich_model),
            Track::UniversalConverter => Backend::UniversalConverter(&self.universal),
        }
    }

    /// Run the track's backend, then add requested cross-track artifacts.
    pub async fn convert(
        &self,
        track: Track,
        job: &ConversionJob,
    ) -> Result<ArtifactSet, ConvertError> {
        let mut set = self.select(track).convert(job).await?;

        match track {
            Track::RichModel if job.requests(ArtifactKind::PandocAst) => {
                if let Some(ast) = self.universal.convert_ast(job).await? {
                    set.insert(ArtifactKind::PandocAst, ast);
                }
            }
            Track::UniversalConverter if job.requests(ArtifactKind::DoclingJson) => {
                if let Some(json) = self.rich_model.convert_structured(job).await? {
                    set.insert(ArtifactKind::DoclingJson, json);
                }
            }
            _ => {}
        }

        debug!(
            track = %track,
            supplemental = set.supplemental_count(),
            "Backend produced artifact set"
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn parts_come_out_in_upload_order() {
        let set = ArtifactSet::new("md")
            .with(ArtifactKind::DocTags, "tags")
            .with(ArtifactKind::DoclingJson, "{}")
            .with(ArtifactKind::Html, "<p/>");
        let (markdown, rest) = set.into_parts();
        assert_eq!(markdown, b"md");
        let kinds: Vec<ArtifactKind> = rest.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            [ArtifactKind::DoclingJson, ArtifactKind::Html, ArtifactKind::DocTags]
        );
    }

    #[test]
    fn get_covers_markdown_and_supplementals() {
        let set = ArtifactSet::new("md").with(ArtifactKind::PandocAst, "{}");
        assert_eq!(set.get(ArtifactKind::Markdown), Some(&b"md"[..]));
        assert_eq!(set.get(ArtifactKind::PandocAst), Some(&b"{}"[..]));
        assert_eq!(set.get(ArtifactKind::Html), None);
    }

    struct Offline;

    #[async_trait::async_trait]
    impl crate::transport::HttpTransport for Offline {
        async fn get(
            &self,
            _: &str,
            _: Duration,
        ) -> Result<crate::transport::HttpResponse, crate::transport::TransportError> {
            Err(crate::transport::TransportError::new("offline"))
        }
        async fn put(
            &self,
            _: &str,
            _: Vec<u8>,
            _: &str,
            _: Duration,
        ) -> Result<crate::transport::HttpResponse, crate::transport::TransportError> {
            Err(crate::transport::TransportError::new("offline"))
        }
        async fn post_json(
            &self,
            _: &str,
            _: &serde_json::Value,
            _: &[(&str, &str)],
            _: Duration,
        ) -> Result<crate::transport::HttpResponse, crate::transport::TransportError> {
            Err(crate::transport::TransportError::new("offline"))
        }
    }

    #[test]
    fn selected_backend_is_debuggable() {
        let transport: Arc<dyn crate::transport::HttpTransport> = Arc::new(Offline);
        let timeout = Duration::from_secs(5);
        let backends = Backends {
            passthrough: PassthroughBackend::new(Arc::clone(&transport), timeout),
            rich_model: RichModelBackend::new(Arc::new(SharedEngine::lazy(|| {
                Err(ConvertError::Internal("unused".into()))
            }))),
            universal: UniversalConverterBackend::new(
                Arc::new(PandocCli::new("pandoc", timeout)),
                transport,
                timeout,
            ),
        };

        let passthrough = format!("{:?}", backends.select(Track::Passthrough));
        assert!(passthrough.starts_with("Passthrough(PassthroughBackend"), "got: {passthrough}");
        let universal = format!("{:?}", backends.select(Track::UniversalConverter));
        assert!(universal.contains("download_timeout: 5s"), "got: {universal}");
        let rich = format!("{:?}", backends.select(Track::RichModel));
        assert!(rich.starts_with("RichModel("), "got: {rich}");
    }
}
