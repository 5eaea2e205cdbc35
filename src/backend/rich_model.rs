//! Rich-model backend (`docling` track).
//!
//! ## Engine lifecycle
//!
//! One [`SharedEngine`] is created per process and handed to the backend
//! explicitly. The engine is built on first use and then reused read-only
//! until the process exits; there is no teardown.
//!
//! A configured model-artifact path that is not a directory is reported as
//! [`ConvertError::Configuration`]. The engine never falls back to
//! downloading models.

use crate::backend::{process, ArtifactSet};
use crate::canonical::canonicalize_bytes;
use crate::error::ConvertError;
use crate::job::{ArtifactKind, ConversionJob, SourceType};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Source types the engine is known to handle. Used to decide whether a job
/// on another track can also get a structured-tree export.
pub const ENGINE_SOURCE_TYPES: &[&str] = &["docx", "pdf", "pptx", "xlsx", "html", "htm", "csv"];

pub fn engine_supports(source_type: &SourceType) -> bool {
    ENGINE_SOURCE_TYPES.contains(&source_type.as_str())
}

/// Export formats the engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Markdown,
    Json,
    Html,
    DocTags,
}

impl ExportFormat {
    /// Name understood by the engine's `--to` flag.
    pub fn engine_name(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
            ExportFormat::Html => "html",
            ExportFormat::DocTags => "doctags",
        }
    }

    /// File extension of the engine's output for this format.
    pub fn extension(self) -> &'static str {
        self.engine_name()
    }
}

/// What the engine returned for one document. Formats it could not export
/// are simply absent.
#[derive(Debug, Default)]
pub struct EngineOutput {
    exports: HashMap<ExportFormat, Vec<u8>>,
}

impl EngineOutput {
    pub fn insert(&mut self, format: ExportFormat, bytes: Vec<u8>) {
        self.exports.insert(format, bytes);
    }

    pub fn with(mut self, format: ExportFormat, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(format, bytes.into());
        self
    }

    pub fn take(&mut self, format: ExportFormat) -> Option<Vec<u8>> {
        self.exports.remove(&format)
    }
}

/// A document-understanding engine.
#[async_trait]
pub trait DocumentEngine: Send + Sync {
    /// Convert the document at `source_url`, producing at most `formats`.
    async fn convert(
        &self,
        source_url: &str,
        formats: &[ExportFormat],
    ) -> Result<EngineOutput, ConvertError>;
}

/// Reject a model-artifact path that is not an existing directory.
pub fn validate_artifacts_path(path: &Path) -> Result<(), ConvertError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ConvertError::Configuration(format!(
            "model artifacts path is not a directory: {}",
            path.display()
        )))
    }
}

// ── Docling CLI engine ───────────────────────────────────────────────────

/// [`DocumentEngine`] driving the `docling` command-line tool.
///
/// The engine reads the source URL itself; outputs are written to a
/// job-scoped temp directory and read back by extension.
#[derive(Debug, Clone)]
pub struct DoclingCli {
    binary: PathBuf,
    artifacts_path: Option<PathBuf>,
    timeout: Duration,
}

impl DoclingCli {
    /// Locate the binary and validate the model-artifact path.
    pub fn new(
        binary: &str,
        artifacts_path: Option<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, ConvertError> {
        if let Some(ref path) = artifacts_path {
            validate_artifacts_path(path)?;
        }
        let binary = which::which(binary).map_err(|e| ConvertError::BackendUnavailable {
            backend: "docling".into(),
            reason: format!("cannot locate '{binary}': {e}"),
        })?;

        info!(
            binary = %binary.display(),
            artifacts_path = ?artifacts_path,
            "Document engine ready"
        );
        Ok(Self {
            binary,
            artifacts_path,
            timeout,
        })
    }

    fn args(&self, source_url: &str, out_dir: &Path, formats: &[ExportFormat]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![source_url.into(), "--output".into(), out_dir.into()];
        for format in formats {
            args.push("--to".into());
            args.push(format.engine_name().into());
        }
        if let Some(ref path) = self.artifacts_path {
            args.push("--artifacts-path".into());
            args.push(path.into());
        }
        args
    }
}

/// First file in `dir` with the given extension.
async fn find_export(dir: &Path, extension: &str) -> std::io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut first: Option<PathBuf> = None;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.extension().is_some_and(|e| e == extension) {
            continue;
        }
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if first.as_ref().map_or(true, |f| path < *f) {
            first = Some(path);
        }
    }
    Ok(first)
}

#[async_trait]
impl DocumentEngine for DoclingCli {
    async fn convert(
        &self,
        source_url: &str,
        formats: &[ExportFormat],
    ) -> Result<EngineOutput, ConvertError> {
        let out_dir = TempDir::new().map_err(|e| ConvertError::Internal(format!("tempdir: {e}")))?;
        let args = self.args(source_url, out_dir.path(), formats);

        process::run("docling", &self.binary, args, self.timeout).await?;

        let mut output = EngineOutput::default();
        for &format in formats {
            let found = find_export(out_dir.path(), format.extension())
                .await
                .map_err(|e| ConvertError::Internal(format!("reading engine output: {e}")))?;
            match found {
                Some(path) => {
                    let bytes = tokio::fs::read(&path)
                        .await
                        .map_err(|e| ConvertError::Internal(format!("reading {}: {e}", path.display())))?;
                    output.insert(format, bytes);
                }
                None => debug!(format = format.engine_name(), "Engine produced no export"),
            }
        }
        Ok(output)
    }
}

// ── Shared engine handle ─────────────────────────────────────────────────

type EngineFactory = Box<dyn Fn() -> Result<Arc<dyn DocumentEngine>, ConvertError> + Send + Sync>;

/// Process-wide, lazily built engine.
///
/// Construction is attempted on first use; a failed attempt is not cached,
/// so a later job retries it.
pub struct SharedEngine {
    cell: OnceCell<Arc<dyn DocumentEngine>>,
    factory: EngineFactory,
}

impl fmt::Debug for SharedEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedEngine")
            .field("initialised", &self.cell.get().is_some())
            .finish()
    }
}

impl SharedEngine {
    /// Engine built on first use by `factory`.
    pub fn lazy<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn DocumentEngine>, ConvertError> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Box::new(factory),
        }
    }

    /// Docling CLI engine configured from the service settings.
    pub fn docling(binary: String, artifacts_path: Option<PathBuf>, timeout: Duration) -> Self {
        Self::lazy(move || {
            let engine = DoclingCli::new(&binary, artifacts_path.clone(), timeout)?;
            Ok(Arc::new(engine) as Arc<dyn DocumentEngine>)
        })
    }

    /// Already-built engine.
    pub fn ready(engine: Arc<dyn DocumentEngine>) -> Self {
        let cell = OnceCell::new();
        // Fresh cell: cannot already be set.
        let _ = cell.set(engine);
        Self {
            cell,
            factory: Box::new(|| -> Result<Arc<dyn DocumentEngine>, ConvertError> {
                Err(ConvertError::Internal("engine factory called on a ready engine".into()))
            }),
        }
    }

    /// The engine, building it if this is the first use.
    pub fn get(&self) -> Result<Arc<dyn DocumentEngine>, ConvertError> {
        self.cell
            .get_or_try_init(|| (self.factory)())
            .map(Arc::clone)
    }
}

// ── Backend ──────────────────────────────────────────────────────────────

/// Backend for the `docling` track.
#[derive(Debug, Clone)]
pub struct RichModelBackend {
    engine: Arc<SharedEngine>,
}

impl RichModelBackend {
    pub fn new(engine: Arc<SharedEngine>) -> Self {
        Self { engine }
    }

    /// Markdown plus whichever of JSON / HTML / DocTags the job requested.
    pub async fn convert(&self, job: &ConversionJob) -> Result<ArtifactSet, ConvertError> {
        let engine = self.engine.get()?;

        let mut formats = vec![ExportFormat::Markdown];
        for (kind, format) in [
            (ArtifactKind::DoclingJson, ExportFormat::Json),
            (ArtifactKind::Html, ExportFormat::Html),
            (ArtifactKind::DocTags, ExportFormat::DocTags),
        ] {
            if job.requests(kind) {
                formats.push(format);
            }
        }

        let mut output = engine.convert(&job.source_download_url, &formats).await?;
        let markdown = output.take(ExportFormat::Markdown).ok_or_else(|| {
            ConvertError::Conversion("document engine produced no Markdown".into())
        })?;

        let mut set = ArtifactSet::new(markdown);
        if job.requests(ArtifactKind::DoclingJson) {
            match output.take(ExportFormat::Json) {
                Some(raw) => set.insert(ArtifactKind::DoclingJson, canonicalize_bytes(&raw)?),
                None => warn!("Engine could not export structured JSON; omitting"),
            }
        }
        for (kind, format) in [
            (ArtifactKind::Html, ExportFormat::Html),
            (ArtifactKind::DocTags, ExportFormat::DocTags),
        ] {
            if !job.requests(kind) {
                continue;
            }
            match output.take(format) {
                Some(bytes) => set.insert(kind, bytes),
                None => warn!(artifact = %kind, "Engine could not export; omitting"),
            }
        }

        info!(
            markdown_bytes = set.markdown().len(),
            supplemental = set.supplemental_count(),
            "Rich-model conversion finished"
        );
        Ok(set)
    }

    /// Canonical structured-tree JSON only, for jobs on another track that
    /// asked for it. `Ok(None)` if the source type is not an engine format or
    /// the engine could not export JSON.
    pub async fn convert_structured(
        &self,
        job: &ConversionJob,
    ) -> Result<Option<Vec<u8>>, ConvertError> {
        if !engine_supports(&job.source_type) {
            debug!(source_type = %job.source_type, "Engine does not read this type; skipping JSON");
            return Ok(None);
        }
        let engine = self.engine.get()?;
        let mut output = engine
            .convert(&job.source_download_url, &[ExportFormat::Json])
            .await?;
        output
            .take(ExportFormat::Json)
            .map(|raw| canonicalize_bytes(&raw))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullEngine;

    #[async_trait]
    impl DocumentEngine for NullEngine {
        async fn convert(
            &self,
            _: &str,
            _: &[ExportFormat],
        ) -> Result<EngineOutput, ConvertError> {
            Ok(EngineOutput::default().with(ExportFormat::Markdown, "# x\n"))
        }
    }

    #[test]
    fn engine_is_built_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let shared = SharedEngine::lazy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullEngine) as Arc<dyn DocumentEngine>)
        });
        shared.get().unwrap();
        shared.get().unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_build_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let shared = SharedEngine::lazy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ConvertError::BackendUnavailable {
                backend: "docling".into(),
                reason: "not installed".into(),
            })
        });
        assert!(shared.get().is_err());
        assert!(shared.get().is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalid_artifacts_path_is_fatal_configuration() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = DoclingCli::new("docling", Some(file.path().to_path_buf()), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, ConvertError::Configuration(_)), "got: {err:?}");
    }

    #[test]
    fn missing_binary_is_backend_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = DoclingCli::new(
            "definitely-not-a-docling-binary",
            Some(dir.path().to_path_buf()),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::BackendUnavailable { .. }), "got: {err:?}");
    }

    #[test]
    fn cli_args_include_formats_and_artifacts_path() {
        let engine = DoclingCli {
            binary: PathBuf::from("docling"),
            artifacts_path: Some(PathBuf::from("/models")),
            timeout: Duration::from_secs(1),
        };
        let args = engine.args(
            "https://x.test/doc.pdf",
            Path::new("/tmp/out"),
            &[ExportFormat::Markdown, ExportFormat::DocTags],
        );
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "https://x.test/doc.pdf",
                "--output",
                "/tmp/out",
                "--to",
                "md",
                "--to",
                "doctags",
                "--artifacts-path",
                "/models"
            ]
        );
    }

    #[tokio::test]
    async fn exports_are_found_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("doc.md"), "# x").await.unwrap();
        tokio::fs::write(dir.path().join("doc.json"), "{}").await.unwrap();
        tokio::fs::create_dir(dir.path().join("images.doctags")).await.unwrap();

        let md = find_export(dir.path(), "md").await.unwrap();
        assert_eq!(md, Some(dir.path().join("doc.md")));
        assert!(find_export(dir.path(), "json").await.unwrap().is_some());
        assert!(find_export(dir.path(), "doctags").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_export_by_name_wins() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("b.md"), "b").await.unwrap();
        tokio::fs::write(dir.path().join("a.md"), "a").await.unwrap();

        let found = find_export(dir.path(), "md").await.unwrap();
        assert_eq!(found, Some(dir.path().join("a.md")));
    }
}
