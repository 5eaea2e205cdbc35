//! I/O stages around a conversion.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ (backend) ──▶ upload ──▶ callback
//! (GET)                   (PUT)      (POST)
//! ```
//!
//! 1. [`input`]    fetch the source, optionally into a job-scoped temp file
//! 2. [`upload`]   PUT one artifact to its pre-signed destination
//! 3. [`callback`] build and deliver the completion payload
//!
//! All three go through [`crate::transport::HttpTransport`].

pub mod callback;
pub mod input;
pub mod upload;
