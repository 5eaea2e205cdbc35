//! Job model: what a caller asks for and where each artifact must land.
//!
//! [`ConvertRequest`] is the wire shape accepted by `POST /convert` and by
//! `docconv run`. It is validated once into an immutable [`ConversionJob`],
//! which is what the orchestrator and backends work with.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ── Track ────────────────────────────────────────────────────────────────

/// The conversion strategy family for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum Track {
    /// Plain text re-encoded as Markdown (`mdast`).
    Passthrough,
    /// Document-understanding engine (`docling`).
    RichModel,
    /// External universal converter binary (`pandoc`).
    UniversalConverter,
}

impl Track {
    /// Wire name used in requests and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Track::Passthrough => "mdast",
            Track::RichModel => "docling",
            Track::UniversalConverter => "pandoc",
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Track {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mdast" => Ok(Track::Passthrough),
            "docling" => Ok(Track::RichModel),
            "pandoc" => Ok(Track::UniversalConverter),
            _ => Err(ConvertError::UnknownTrack(s.to_string())),
        }
    }
}

impl From<Track> for &'static str {
    fn from(track: Track) -> Self {
        track.as_str()
    }
}

impl TryFrom<String> for Track {
    type Error = ConvertError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ── Source type ──────────────────────────────────────────────────────────

/// Format tag of the source document (`pdf`, `docx`, `rst`, …), lowercased.
///
/// Kept open-ended: which tags are acceptable depends on the backend, and the
/// universal converter must be able to name a tag it rejects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SourceType(String);

impl SourceType {
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SourceType {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SourceType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<SourceType> for String {
    fn from(t: SourceType) -> Self {
        t.0
    }
}

// ── Artifacts ────────────────────────────────────────────────────────────

/// One named output of a conversion.
///
/// Variant order is the upload order: Markdown first, then supplementals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKind {
    /// Canonical Markdown rendering. Always produced on success.
    Markdown,
    /// Rich-model structured-tree export, canonical JSON.
    DoclingJson,
    /// Universal-converter AST, canonical JSON.
    PandocAst,
    /// Rich-model HTML export.
    Html,
    /// Rich-model tag-stream export.
    DocTags,
}

impl ArtifactKind {
    /// Supplemental artifacts in upload order.
    pub const SUPPLEMENTAL: [ArtifactKind; 4] = [
        ArtifactKind::DoclingJson,
        ArtifactKind::PandocAst,
        ArtifactKind::Html,
        ArtifactKind::DocTags,
    ];

    /// `Content-Type` header sent with the upload.
    pub fn content_type(self) -> &'static str {
        match self {
            ArtifactKind::Markdown => "text/markdown; charset=utf-8",
            ArtifactKind::DoclingJson | ArtifactKind::PandocAst => {
                "application/json; charset=utf-8"
            }
            ArtifactKind::Html => "text/html; charset=utf-8",
            ArtifactKind::DocTags => "text/plain; charset=utf-8",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ArtifactKind::Markdown => "markdown",
            ArtifactKind::DoclingJson => "docling_json",
            ArtifactKind::PandocAst => "pandoc_ast",
            ArtifactKind::Html => "html",
            ArtifactKind::DocTags => "doctags",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pre-signed storage destination for one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTarget {
    pub bucket: String,
    pub key: String,
    pub signed_upload_url: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl OutputTarget {
    /// The URL to PUT to, with the token appended when needed.
    pub fn upload_url(&self) -> String {
        append_token(&self.signed_upload_url, self.token.as_deref())
    }
}

/// Append `token=<token>` to a pre-signed URL unless it already carries one.
///
/// The parameter goes into the query, ahead of any `#fragment`.
/// Idempotent: feeding the result back in returns it unchanged.
pub fn append_token(url: &str, token: Option<&str>) -> String {
    let token = match token {
        Some(t) if !t.is_empty() => t,
        _ => return url.to_string(),
    };
    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };
    if has_token_param(base) {
        return url.to_string();
    }
    let join = if base.contains('?') { '&' } else { '?' };
    match fragment {
        Some(fragment) => format!("{base}{join}token={token}#{fragment}"),
        None => format!("{base}{join}token={token}"),
    }
}

fn has_token_param(base: &str) -> bool {
    let Some((_, query)) = base.split_once('?') else {
        return false;
    };
    query
        .split('&')
        .any(|pair| pair == "token" || pair.starts_with("token="))
}

// ── Job ──────────────────────────────────────────────────────────────────

/// An immutable, validated conversion job.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub source_uid: String,
    pub conversion_job_id: String,
    /// Explicit track, if the caller chose one.
    pub track: Option<Track>,
    pub source_type: SourceType,
    pub source_download_url: String,
    pub callback_url: String,
    outputs: BTreeMap<ArtifactKind, OutputTarget>,
}

impl ConversionJob {
    /// Create a job with its mandatory Markdown target.
    pub fn new(
        source_uid: impl Into<String>,
        conversion_job_id: impl Into<String>,
        source_type: impl Into<SourceType>,
        source_download_url: impl Into<String>,
        markdown_output: OutputTarget,
        callback_url: impl Into<String>,
    ) -> Self {
        let mut outputs = BTreeMap::new();
        outputs.insert(ArtifactKind::Markdown, markdown_output);
        Self {
            source_uid: source_uid.into(),
            conversion_job_id: conversion_job_id.into(),
            track: None,
            source_type: source_type.into(),
            source_download_url: source_download_url.into(),
            callback_url: callback_url.into(),
            outputs,
        }
    }

    pub fn with_track(mut self, track: Track) -> Self {
        self.track = Some(track);
        self
    }

    /// Request a supplemental artifact. Markdown is always requested and
    /// cannot be replaced this way.
    pub fn with_output(mut self, kind: ArtifactKind, target: OutputTarget) -> Self {
        if kind != ArtifactKind::Markdown {
            self.outputs.insert(kind, target);
        }
        self
    }

    pub fn markdown_target(&self) -> &OutputTarget {
        // Inserted by `new`, never removed.
        &self.outputs[&ArtifactKind::Markdown]
    }

    pub fn target(&self, kind: ArtifactKind) -> Option<&OutputTarget> {
        self.outputs.get(&kind)
    }

    pub fn requests(&self, kind: ArtifactKind) -> bool {
        self.outputs.contains_key(&kind)
    }
}

/// Wire form of a job submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertRequest {
    pub source_uid: String,
    pub conversion_job_id: String,
    #[serde(default)]
    pub track: Option<String>,
    pub source_type: String,
    pub source_download_url: String,
    pub output: OutputTarget,
    #[serde(default)]
    pub docling_output: Option<OutputTarget>,
    #[serde(default)]
    pub pandoc_output: Option<OutputTarget>,
    #[serde(default)]
    pub html_output: Option<OutputTarget>,
    #[serde(default)]
    pub doctags_output: Option<OutputTarget>,
    pub callback_url: String,
}

impl TryFrom<ConvertRequest> for ConversionJob {
    type Error = ConvertError;

    fn try_from(req: ConvertRequest) -> Result<Self, Self::Error> {
        let track = match req.track.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(name) => Some(name.parse::<Track>()?),
        };

        let mut job = ConversionJob::new(
            req.source_uid,
            req.conversion_job_id,
            SourceType::new(&req.source_type),
            req.source_download_url,
            req.output,
            req.callback_url,
        );
        job.track = track;

        let supplemental = [
            (ArtifactKind::DoclingJson, req.docling_output),
            (ArtifactKind::PandocAst, req.pandoc_output),
            (ArtifactKind::Html, req.html_output),
            (ArtifactKind::DocTags, req.doctags_output),
        ];
        for (kind, target) in supplemental {
            if let Some(target) = target {
                job = job.with_output(kind, target);
            }
        }
        Ok(job)
    }
}
