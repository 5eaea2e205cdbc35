//! CLI binary for docconv.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ServiceConfig`, then serves HTTP or runs a single job.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docconv::backend::universal::reader_for;
use docconv::track::resolve_parts;
use docconv::{
    ConversionJob, ConvertRequest, Orchestrator, ReqwestTransport, ServiceConfig, SourceType,
    Track,
};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service
  CONVERSION_SERVICE_KEY=s3cret docconv serve --port 8000

  # Run one job from a request file, print the callback payload, skip delivery
  docconv run job.json --no-callback

  # Which track would handle an untracked .txt upload?
  docconv resolve --source-type txt

TRACKS:
  mdast     plain text passed through as Markdown
  docling   document-understanding engine (Markdown, JSON, HTML, DocTags)
  pandoc    universal converter (Markdown, JSON AST)

ENVIRONMENT VARIABLES:
  CONVERSION_SERVICE_KEY   Shared secret for submissions and callbacks
  DOCLING_ARTIFACTS_PATH   Local model-artifact directory for the engine
  DOCCONV_PANDOC_BIN       Universal converter executable (default: pandoc)
  DOCCONV_DOCLING_BIN      Document engine executable (default: docling)
  RUST_LOG                 Overrides -v / -q log filtering
"#;

/// Document-conversion orchestration service.
#[derive(Parser, Debug)]
#[command(
    name = "docconv",
    version,
    about = "Convert documents to Markdown and side artifacts, upload them, report back",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCCONV_VERBOSE")]
    verbose: bool,

    /// Suppress all logs except errors.
    #[arg(short, long, global = true, env = "DOCCONV_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve `POST /convert` and `GET /health`.
    Serve {
        /// Address to bind.
        #[arg(long, env = "DOCCONV_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on.
        #[arg(short, long, env = "DOCCONV_PORT", default_value_t = 8000)]
        port: u16,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Run one job from a JSON request file and print the callback payload.
    Run {
        /// Path to a `POST /convert` request body.
        job: PathBuf,

        /// Do not deliver the callback.
        #[arg(long)]
        no_callback: bool,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Print the track that would handle a job.
    Resolve {
        /// Source type tag, e.g. pdf, docx, txt.
        #[arg(long)]
        source_type: String,

        /// Explicit track: mdast, docling, pandoc.
        #[arg(long)]
        track: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// Shared secret checked on submissions and sent on callbacks.
    #[arg(long, env = "CONVERSION_SERVICE_KEY", hide_env_values = true)]
    shared_secret: String,

    /// Local model-artifact directory for the document engine.
    #[arg(long, env = "DOCLING_ARTIFACTS_PATH")]
    artifacts_path: Option<PathBuf>,

    /// Universal converter executable.
    #[arg(long, env = "DOCCONV_PANDOC_BIN", default_value = "pandoc")]
    pandoc_bin: String,

    /// Document engine executable.
    #[arg(long, env = "DOCCONV_DOCLING_BIN", default_value = "docling")]
    docling_bin: String,

    /// Source download timeout in seconds.
    #[arg(long, env = "DOCCONV_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-artifact upload timeout in seconds.
    #[arg(long, env = "DOCCONV_UPLOAD_TIMEOUT", default_value_t = 120)]
    upload_timeout: u64,

    /// Callback timeout in seconds.
    #[arg(long, env = "DOCCONV_CALLBACK_TIMEOUT", default_value_t = 30)]
    callback_timeout: u64,

    /// Universal converter timeout per invocation, in seconds.
    #[arg(long, env = "DOCCONV_CONVERTER_TIMEOUT", default_value_t = 120)]
    converter_timeout: u64,

    /// Document engine timeout in seconds.
    #[arg(long, env = "DOCCONV_ENGINE_TIMEOUT", default_value_t = 600)]
    engine_timeout: u64,
}

impl ServiceArgs {
    fn build(self) -> Result<ServiceConfig> {
        let mut builder = ServiceConfig::builder()
            .shared_secret(self.shared_secret)
            .pandoc_binary(self.pandoc_bin)
            .docling_binary(self.docling_bin)
            .download_timeout_secs(self.download_timeout)
            .upload_timeout_secs(self.upload_timeout)
            .callback_timeout_secs(self.callback_timeout)
            .converter_timeout_secs(self.converter_timeout)
            .engine_timeout_secs(self.engine_timeout);
        if let Some(path) = self.artifacts_path {
            builder = builder.artifacts_path(path);
        }
        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve {
            host,
            port,
            service,
        } => {
            let config = service.build()?;
            tracing::debug!(?config, "Loaded configuration");
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("Invalid bind address {host}:{port}"))?;
            docconv::run_server(config, addr)
                .await
                .context("Server failed")?;
        }

        Command::Run {
            job,
            no_callback,
            service,
        } => {
            let config = service.build()?;
            let raw = tokio::fs::read_to_string(&job)
                .await
                .with_context(|| format!("Failed to read job file {}", job.display()))?;
            let request: ConvertRequest =
                serde_json::from_str(&raw).context("Job file is not a valid request")?;
            let job = ConversionJob::try_from(request).context("Invalid job")?;

            let orchestrator =
                Orchestrator::from_config(&config, Arc::new(ReqwestTransport::new()));
            let payload = if no_callback {
                orchestrator.run_without_callback(&job).await
            } else {
                orchestrator.run(&job).await
            };

            let json = serde_json::to_string_pretty(&payload)
                .context("Failed to serialise callback payload")?;
            writeln!(io::stdout(), "{json}").context("Failed to write to stdout")?;

            if !payload.success {
                std::process::exit(1);
            }
        }

        Command::Resolve { source_type, track } => {
            let source_type = SourceType::new(&source_type);
            let explicit = track
                .as_deref()
                .map(str::parse::<Track>)
                .transpose()
                .context("Invalid track")?;
            let resolved = resolve_parts(explicit, &source_type);

            writeln!(io::stdout(), "{resolved}")?;
            if resolved == Track::UniversalConverter && reader_for(&source_type).is_none() {
                eprintln!("warning: pandoc track does not support source_type: {source_type}");
            }
        }
    }

    Ok(())
}
