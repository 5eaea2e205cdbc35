//! Track resolution.
//!
//! Callers written before tracks existed send no `track` at all; they only
//! know `txt` (plain text) and documents meant for the rich model. The
//! defaults below keep those callers working.

use crate::job::{ConversionJob, SourceType, Track};

/// Decide which track handles `job`.
///
/// An explicit track is returned unchanged. Whether the backend can actually
/// read the source type is the backend's concern, not this function's.
pub fn resolve(job: &ConversionJob) -> Track {
    resolve_parts(job.track, &job.source_type)
}

/// [`resolve`] on the two fields it reads.
pub fn resolve_parts(explicit: Option<Track>, source_type: &SourceType) -> Track {
    match explicit {
        Some(track) => track,
        None if source_type.as_str() == "txt" => Track::Passthrough,
        None => Track::RichModel,
    }
}
