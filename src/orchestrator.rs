//! Per-job orchestration.
//!
//! ```text
//! Received ─▶ Resolving ─▶ Converting ─▶ Uploading ─▶ Reporting ─▶ Done
//!                              │              │            ▲
//!                              └──── error ───┴────────────┘
//! ```
//!
//! Every job ends in exactly one callback attempt. Errors from conversion or
//! upload are flattened into the payload's `error` field; a failed callback
//! is logged and dropped.

use crate::backend::{
    Backends, ConverterRunner, PandocCli, PassthroughBackend, RichModelBackend, SharedEngine,
    UniversalConverterBackend,
};
use crate::config::ServiceConfig;
use crate::error::ConvertError;
use crate::job::{ArtifactKind, ConversionJob, Track};
use crate::pipeline::callback::{CallbackPayload, CallbackReporter};
use crate::pipeline::upload::ArtifactUploader;
use crate::track;
use crate::transport::HttpTransport;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Lifecycle of one job. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobState {
    Received,
    Resolving,
    Converting,
    Uploading,
    Reporting,
    Done,
}

/// Tracks the current state of a running job.
#[derive(Debug)]
struct Progress {
    state: JobState,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: JobState::Received,
        }
    }

    fn enter(&mut self, next: JobState) {
        debug_assert!(next > self.state, "{:?} -> {:?} moves backwards", self.state, next);
        debug!(from = ?self.state, to = ?next, "Job state transition");
        self.state = next;
    }
}

/// Runs conversion jobs end to end.
///
/// Cheap to clone; every clone shares the same backends and engine handle.
#[derive(Clone)]
pub struct Orchestrator {
    backends: Arc<Backends>,
    uploader: ArtifactUploader,
    reporter: CallbackReporter,
}

impl Orchestrator {
    pub fn new(backends: Backends, uploader: ArtifactUploader, reporter: CallbackReporter) -> Self {
        Self {
            backends: Arc::new(backends),
            uploader,
            reporter,
        }
    }

    /// Production wiring: pandoc and docling CLIs over `transport`.
    ///
    /// The document engine is not built here; it is located on first use.
    pub fn from_config(config: &ServiceConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let runner = Arc::new(PandocCli::new(
            config.pandoc_binary.clone(),
            config.converter_timeout(),
        ));
        let engine = Arc::new(SharedEngine::docling(
            config.docling_binary.clone(),
            config.artifacts_path.clone(),
            config.engine_timeout(),
        ));
        Self::with_components(config, transport, runner, engine)
    }

    /// Wiring with caller-supplied converter runner and engine.
    pub fn with_components(
        config: &ServiceConfig,
        transport: Arc<dyn HttpTransport>,
        runner: Arc<dyn ConverterRunner>,
        engine: Arc<SharedEngine>,
    ) -> Self {
        let backends = Backends {
            passthrough: PassthroughBackend::new(Arc::clone(&transport), config.download_timeout()),
            rich_model: RichModelBackend::new(engine),
            universal: UniversalConverterBackend::new(
                runner,
                Arc::clone(&transport),
                config.download_timeout(),
            ),
        };
        let uploader = ArtifactUploader::new(Arc::clone(&transport), config.upload_timeout());
        let reporter = CallbackReporter::new(
            transport,
            config.shared_secret.clone(),
            config.callback_timeout(),
        );
        Self::new(backends, uploader, reporter)
    }

    /// Run `job` and deliver its callback. Never fails.
    ///
    /// Returns the payload that was (or was attempted to be) delivered.
    pub async fn run(&self, job: &ConversionJob) -> CallbackPayload {
        self.run_inner(job, true).await
    }

    /// Run `job` without delivering the callback.
    pub async fn run_without_callback(&self, job: &ConversionJob) -> CallbackPayload {
        self.run_inner(job, false).await
    }

    async fn run_inner(&self, job: &ConversionJob, deliver: bool) -> CallbackPayload {
        let span = tracing::info_span!(
            "job",
            source_uid = %job.source_uid,
            conversion_job_id = %job.conversion_job_id,
        );
        self.drive(job, deliver).instrument(span).await
    }

    async fn drive(&self, job: &ConversionJob, deliver: bool) -> CallbackPayload {
        let start = Instant::now();
        let mut progress = Progress::new();
        let mut payload = CallbackPayload::pending(job);

        progress.enter(JobState::Resolving);
        let track = track::resolve(job);
        info!(track = %track, source_type = %job.source_type, "Resolved track");

        match self.convert_and_upload(track, job, &mut payload, &mut progress).await {
            Ok(()) => {
                payload.success = true;
                info!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Conversion succeeded"
                );
            }
            Err(e) => {
                payload.success = false;
                payload.error = Some(e.to_callback_message());
                warn!(
                    state = ?progress.state,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Conversion failed: {e}"
                );
            }
        }

        progress.enter(JobState::Reporting);
        if deliver {
            if let Err(e) = self.reporter.report(&job.callback_url, &payload).await {
                warn!("Callback not delivered: {e}");
            }
        }

        progress.enter(JobState::Done);
        payload
    }

    async fn convert_and_upload(
        &self,
        track: Track,
        job: &ConversionJob,
        payload: &mut CallbackPayload,
        progress: &mut Progress,
    ) -> Result<(), ConvertError> {
        progress.enter(JobState::Converting);
        let artifacts = self.backends.convert(track, job).await?;

        progress.enter(JobState::Uploading);
        let (markdown, supplemental) = artifacts.into_parts();

        let md_target = job.markdown_target();
        self.uploader
            .upload(md_target, markdown, ArtifactKind::Markdown.content_type())
            .await?;
        payload.record_upload(ArtifactKind::Markdown, md_target.key.clone());

        for (kind, bytes) in supplemental {
            let Some(target) = job.target(kind) else {
                debug!(artifact = %kind, "Produced but not requested; skipping upload");
                continue;
            };
            self.uploader
                .upload(target, bytes, kind.content_type())
                .await?;
            payload.record_upload(kind, target.key.clone());
        }

        Ok(())
    }
}
