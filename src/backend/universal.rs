//! Universal-converter backend (`pandoc` track).
//!
//! The source is downloaded into a job-scoped temp file and the converter is
//! run twice against it: once to GitHub-flavoured Markdown, once to its JSON
//! AST. The AST is rewritten canonically before it leaves this module.

use crate::backend::{process, ArtifactSet};
use crate::canonical::canonicalize_bytes;
use crate::error::ConvertError;
use crate::job::{ArtifactKind, ConversionJob, SourceType, Track};
use crate::pipeline::input;
use crate::transport::HttpTransport;
use async_trait::async_trait;
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Converter writer producing the Markdown artifact.
pub const MARKDOWN_WRITER: &str = "gfm";

/// Converter writer producing the AST artifact.
pub const AST_WRITER: &str = "json";

/// How the converter reads one source type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderSpec {
    /// Value passed to `--from`.
    pub reader: &'static str,
    /// Suffix of the materialised temp file.
    pub suffix: &'static str,
}

const READERS: &[(&str, ReaderSpec)] = &[
    ("docx", ReaderSpec { reader: "docx", suffix: ".docx" }),
    ("html", ReaderSpec { reader: "html", suffix: ".html" }),
    ("htm", ReaderSpec { reader: "html", suffix: ".html" }),
    ("txt", ReaderSpec { reader: "markdown", suffix: ".txt" }),
    ("md", ReaderSpec { reader: "markdown", suffix: ".md" }),
    ("markdown", ReaderSpec { reader: "markdown", suffix: ".md" }),
    ("rst", ReaderSpec { reader: "rst", suffix: ".rst" }),
    ("tex", ReaderSpec { reader: "latex", suffix: ".tex" }),
    ("latex", ReaderSpec { reader: "latex", suffix: ".tex" }),
    ("odt", ReaderSpec { reader: "odt", suffix: ".odt" }),
    ("epub", ReaderSpec { reader: "epub", suffix: ".epub" }),
    ("rtf", ReaderSpec { reader: "rtf", suffix: ".rtf" }),
    ("org", ReaderSpec { reader: "org", suffix: ".org" }),
];

/// Reader for `source_type`, or `None` if the converter cannot read it.
pub fn reader_for(source_type: &SourceType) -> Option<ReaderSpec> {
    READERS
        .iter()
        .find(|(tag, _)| *tag == source_type.as_str())
        .map(|(_, spec)| *spec)
}

/// Temp-file suffix for `source_type`; `.bin` when unmapped.
pub fn temp_suffix(source_type: &SourceType) -> &'static str {
    reader_for(source_type).map_or(".bin", |spec| spec.suffix)
}

/// Runs the converter binary on a local file.
#[async_trait]
pub trait ConverterRunner: Send + Sync {
    /// Convert `input` from `reader` to `writer`, returning stdout.
    async fn run(&self, input: &Path, reader: &str, writer: &str) -> Result<Vec<u8>, ConvertError>;
}

/// [`ConverterRunner`] that shells out to a pandoc binary.
#[derive(Debug, Clone)]
pub struct PandocCli {
    binary: String,
    timeout: Duration,
}

impl PandocCli {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ConverterRunner for PandocCli {
    async fn run(&self, input: &Path, reader: &str, writer: &str) -> Result<Vec<u8>, ConvertError> {
        let args: [&OsStr; 5] = [
            OsStr::new("--from"),
            OsStr::new(reader),
            OsStr::new("--to"),
            OsStr::new(writer),
            input.as_os_str(),
        ];
        process::run("pandoc", &self.binary, args, self.timeout).await
    }
}

/// Backend for the `pandoc` track.
#[derive(Clone)]
pub struct UniversalConverterBackend {
    runner: Arc<dyn ConverterRunner>,
    transport: Arc<dyn HttpTransport>,
    download_timeout: Duration,
}

impl fmt::Debug for UniversalConverterBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniversalConverterBackend")
            .field("download_timeout", &self.download_timeout)
            .finish_non_exhaustive()
    }
}

impl UniversalConverterBackend {
    pub fn new(
        runner: Arc<dyn ConverterRunner>,
        transport: Arc<dyn HttpTransport>,
        download_timeout: Duration,
    ) -> Self {
        Self {
            runner,
            transport,
            download_timeout,
        }
    }

    fn reader(job: &ConversionJob) -> Result<ReaderSpec, ConvertError> {
        reader_for(&job.source_type).ok_or_else(|| ConvertError::UnsupportedSourceType {
            track: Track::UniversalConverter.to_string(),
            source_type: job.source_type.to_string(),
        })
    }

    /// Markdown plus canonical AST.
    pub async fn convert(&self, job: &ConversionJob) -> Result<ArtifactSet, ConvertError> {
        // Rejected before touching the network or disk.
        let spec = Self::reader(job)?;

        let source = input::materialize(
            self.transport.as_ref(),
            &job.source_download_url,
            temp_suffix(&job.source_type),
            self.download_timeout,
        )
        .await?;

        let markdown = self
            .runner
            .run(source.path(), spec.reader, MARKDOWN_WRITER)
            .await?;
        let raw_ast = self.runner.run(source.path(), spec.reader, AST_WRITER).await?;
        let ast = canonicalize_bytes(&raw_ast)?;

        info!(
            reader = spec.reader,
            markdown_bytes = markdown.len(),
            ast_bytes = ast.len(),
            "Universal converter finished"
        );

        Ok(ArtifactSet::new(markdown).with(ArtifactKind::PandocAst, ast))
    }

    /// Canonical AST only, for jobs on another track that asked for it.
    ///
    /// Returns `Ok(None)` when the converter cannot read the source type.
    pub async fn convert_ast(&self, job: &ConversionJob) -> Result<Option<Vec<u8>>, ConvertError> {
        let Some(spec) = reader_for(&job.source_type) else {
            debug!(source_type = %job.source_type, "No converter reader; skipping AST");
            return Ok(None);
        };

        let source = input::materialize(
            self.transport.as_ref(),
            &job.source_download_url,
            temp_suffix(&job.source_type),
            self.download_timeout,
        )
        .await?;

        let raw_ast = self.runner.run(source.path(), spec.reader, AST_WRITER).await?;
        Ok(Some(canonicalize_bytes(&raw_ast)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_table() {
        assert_eq!(reader_for(&"rst".into()).unwrap().reader, "rst");
        assert_eq!(reader_for(&"htm".into()).unwrap().suffix, ".html");
        assert_eq!(reader_for(&"LaTeX".into()).unwrap().reader, "latex");
        assert!(reader_for(&"pdf".into()).is_none());
        assert!(reader_for(&"png".into()).is_none());
    }

    #[test]
    fn unmapped_suffix_defaults_to_bin() {
        assert_eq!(temp_suffix(&"png".into()), ".bin");
        assert_eq!(temp_suffix(&"org".into()), ".org");
    }
}
