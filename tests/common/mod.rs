//! In-memory fakes shared by the integration tests.
//!
//! Nothing here touches the network or spawns a process: the transport,
//! converter runner and document engine all answer from tables and record
//! what they were asked.

#![allow(dead_code)]

use async_trait::async_trait;
use docconv::backend::{ConverterRunner, DocumentEngine, EngineOutput, ExportFormat, SharedEngine};
use docconv::{
    ConversionJob, ConvertError, HttpResponse, HttpTransport, Orchestrator, OutputTarget,
    ServiceConfig, TransportError,
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SECRET: &str = "test-secret";
pub const SOURCE_URL: &str = "https://storage.test/source";
pub const CALLBACK_URL: &str = "https://app.test/callback";

// ── HTTP transport ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Get {
        url: String,
    },
    Put {
        url: String,
        content_type: String,
        body: Vec<u8>,
    },
    Post {
        url: String,
        body: Value,
        headers: Vec<(String, String)>,
    },
}

/// Fake transport: GETs answer from `sources`, PUTs succeed unless a status
/// was set for the URL, POSTs succeed unless callbacks are set to fail.
#[derive(Default)]
pub struct FakeTransport {
    sources: Mutex<HashMap<String, HttpResponse>>,
    put_status: Mutex<HashMap<String, u16>>,
    callback_error: Mutex<Option<String>>,
    get_delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.sources
            .lock()
            .unwrap()
            .insert(url.to_string(), HttpResponse::new(200, body));
    }

    pub fn serve_status(&self, url: &str, status: u16) {
        self.sources
            .lock()
            .unwrap()
            .insert(url.to_string(), HttpResponse::new(status, "nope"));
    }

    /// Make PUTs to any URL starting with `url_prefix` answer `status`.
    pub fn fail_put(&self, url_prefix: &str, status: u16) {
        self.put_status
            .lock()
            .unwrap()
            .insert(url_prefix.to_string(), status);
    }

    /// Hold every GET for `delay` before answering.
    pub fn delay_gets(&self, delay: Duration) {
        *self.get_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_callbacks(&self, message: &str) {
        *self.callback_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn gets(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Get { url } => Some(url),
                _ => None,
            })
            .collect()
    }

    /// `(url, content_type, body)` of every PUT, in order.
    pub fn puts(&self) -> Vec<(String, String, Vec<u8>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Put {
                    url,
                    content_type,
                    body,
                } => Some((url, content_type, body)),
                _ => None,
            })
            .collect()
    }

    /// `(body, headers)` of every callback POST, in order.
    pub fn callbacks(&self) -> Vec<(Value, Vec<(String, String)>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Post { body, headers, .. } => Some((body, headers)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(Call::Get {
            url: url.to_string(),
        });
        let delay = *self.get_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.sources
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::new(format!("connection refused: {url}")))
    }

    async fn put(
        &self,
        url: &str,
        body: Vec<u8>,
        content_type: &str,
        _timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(Call::Put {
            url: url.to_string(),
            content_type: content_type.to_string(),
            body,
        });
        let status = self
            .put_status
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, status)| *status)
            .unwrap_or(200);
        Ok(HttpResponse::new(status, if status == 200 { "" } else { "storage says no" }))
    }

    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        headers: &[(&str, &str)],
        _timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(Call::Post {
            url: url.to_string(),
            body: body.clone(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        match self.callback_error.lock().unwrap().clone() {
            Some(message) => Err(TransportError::new(message)),
            None => Ok(HttpResponse::new(200, "")),
        }
    }
}

// ── Universal converter ──────────────────────────────────────────────────────

/// Fake converter: answers per writer and records `(reader, writer, path)`.
#[derive(Default)]
pub struct FakeRunner {
    outputs: Mutex<HashMap<String, Result<Vec<u8>, String>>>,
    runs: Mutex<Vec<(String, String, String)>>,
    seen_paths: Mutex<Vec<std::path::PathBuf>>,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn output(&self, writer: &str, bytes: impl Into<Vec<u8>>) {
        self.outputs
            .lock()
            .unwrap()
            .insert(writer.to_string(), Ok(bytes.into()));
    }

    pub fn fail(&self, writer: &str, message: &str) {
        self.outputs
            .lock()
            .unwrap()
            .insert(writer.to_string(), Err(message.to_string()));
    }

    /// `(reader, writer, file name)` per run.
    pub fn runs(&self) -> Vec<(String, String, String)> {
        self.runs.lock().unwrap().clone()
    }

    pub fn seen_paths(&self) -> Vec<std::path::PathBuf> {
        self.seen_paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConverterRunner for FakeRunner {
    async fn run(&self, input: &Path, reader: &str, writer: &str) -> Result<Vec<u8>, ConvertError> {
        assert!(input.exists(), "converter input must exist while running");
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.runs
            .lock()
            .unwrap()
            .push((reader.to_string(), writer.to_string(), name));
        self.seen_paths.lock().unwrap().push(input.to_path_buf());

        match self.outputs.lock().unwrap().get(writer).cloned() {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err(message)) => Err(ConvertError::Conversion(message)),
            None => Err(ConvertError::Conversion(format!("no fake output for {writer}"))),
        }
    }
}

// ── Document engine ──────────────────────────────────────────────────────────

/// Fake engine: returns whichever requested formats it has exports for.
#[derive(Default)]
pub struct FakeEngine {
    exports: Mutex<HashMap<ExportFormat, Vec<u8>>>,
    failure: Mutex<Option<String>>,
    requests: Mutex<Vec<(String, Vec<ExportFormat>)>>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn export(&self, format: ExportFormat, bytes: impl Into<Vec<u8>>) {
        self.exports.lock().unwrap().insert(format, bytes.into());
    }

    pub fn fail(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn requests(&self) -> Vec<(String, Vec<ExportFormat>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentEngine for FakeEngine {
    async fn convert(
        &self,
        source_url: &str,
        formats: &[ExportFormat],
    ) -> Result<EngineOutput, ConvertError> {
        self.requests
            .lock()
            .unwrap()
            .push((source_url.to_string(), formats.to_vec()));
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(ConvertError::Conversion(message));
        }
        let exports = self.exports.lock().unwrap();
        let mut output = EngineOutput::default();
        for format in formats {
            if let Some(bytes) = exports.get(format) {
                output.insert(*format, bytes.clone());
            }
        }
        Ok(output)
    }
}

// ── Wiring ───────────────────────────────────────────────────────────────────

pub struct Harness {
    pub transport: Arc<FakeTransport>,
    pub runner: Arc<FakeRunner>,
    pub engine: Arc<FakeEngine>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn new() -> Self {
        let engine = FakeEngine::new();
        let shared = SharedEngine::ready(engine.clone());
        Self::with_engine(engine, shared)
    }

    /// Harness whose engine handle is `shared`; `engine` is kept only for
    /// inspection.
    pub fn with_engine(engine: Arc<FakeEngine>, shared: SharedEngine) -> Self {
        let transport = FakeTransport::new();
        let runner = FakeRunner::new();
        let config = config();
        let orchestrator = Orchestrator::with_components(
            &config,
            transport.clone(),
            runner.clone(),
            Arc::new(shared),
        );
        Self {
            transport,
            runner,
            engine,
            orchestrator,
        }
    }
}

pub fn config() -> ServiceConfig {
    ServiceConfig::builder()
        .shared_secret(SECRET)
        .build()
        .expect("test config is valid")
}

pub fn target(name: &str) -> OutputTarget {
    OutputTarget {
        bucket: "documents".into(),
        key: format!("converted/src-1/{name}"),
        signed_upload_url: format!("https://storage.test/upload/{name}"),
        token: None,
    }
}

pub fn job(source_type: &str) -> ConversionJob {
    ConversionJob::new(
        "src-1",
        "job-1",
        source_type,
        SOURCE_URL,
        target("doc.md"),
        CALLBACK_URL,
    )
}
