//! # docconv
//!
//! Document-conversion orchestration service.
//!
//! A caller submits a reference to a source document, a target *track* and
//! a set of pre-signed storage destinations. The service picks a conversion
//! backend, produces canonical Markdown plus any requested side artifacts,
//! PUTs each one to its destination and reports the outcome through a single
//! asynchronous callback.
//!
//! ## Pipeline Overview
//!
//! ```text
//! ConvertRequest
//!  │
//!  ├─ 1. Validate  wire request → immutable ConversionJob (422 on failure)
//!  ├─ 2. Resolve   explicit track, else txt → mdast, anything else → docling
//!  ├─ 3. Convert   passthrough │ rich-model engine │ universal converter
//!  ├─ 4. Canonize  JSON artifacts rewritten with sorted keys, no whitespace
//!  ├─ 5. Upload    Markdown first, then docling JSON, pandoc AST, HTML, DocTags
//!  └─ 6. Report    exactly one callback, success or not
//! ```
//!
//! ## Tracks
//!
//! | Track     | Backend                                | Artifacts                           |
//! |-----------|----------------------------------------|-------------------------------------|
//! | `mdast`   | [`backend::PassthroughBackend`]        | Markdown                            |
//! | `docling` | [`backend::RichModelBackend`]          | Markdown, JSON, HTML, DocTags       |
//! | `pandoc`  | [`backend::UniversalConverterBackend`] | Markdown, AST                       |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docconv::{ConvertRequest, ConversionJob, Orchestrator, ReqwestTransport, ServiceConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder().shared_secret("s3cret").build()?;
//!     let orchestrator = Orchestrator::from_config(&config, Arc::new(ReqwestTransport::new()));
//!
//!     let request: ConvertRequest = serde_json::from_str(&std::fs::read_to_string("job.json")?)?;
//!     let job = ConversionJob::try_from(request)?;
//!     let payload = orchestrator.run(&job).await;
//!     println!("success: {}", payload.success);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docconv` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when embedding only the library:
//! ```toml
//! docconv = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod canonical;
pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod pipeline;
pub mod server;
pub mod track;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use canonical::{canonicalize, canonicalize_bytes};
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{ApiError, ConvertError};
pub use job::{append_token, ArtifactKind, ConversionJob, ConvertRequest, OutputTarget, SourceType, Track};
pub use orchestrator::{JobState, Orchestrator};
pub use pipeline::callback::CallbackPayload;
pub use server::{build_router, run_server, AppState};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportError};

/// Header carrying the shared secret, on submissions and on callbacks.
pub const SERVICE_KEY_HEADER: &str = "x-conversion-service-key";
