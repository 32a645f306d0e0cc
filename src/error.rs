//! Error taxonomy for the ingestion pipeline.
//!
//! Only [`IngestError`] ever escapes a run. Everything below it (a corrupt
//! archive, an undecodable entry, a post that failed to build) is folded into
//! the [`IngestReport`](crate::report::IngestReport) instead.

use thiserror::Error;

use crate::report::IngestReport;

/// Failure to open one archive. Fatal to that archive only.
#[derive(Error, Debug)]
pub enum ArchiveReadError {
    /// The container is corrupt or not a zip archive.
    #[error("invalid archive: {0}")]
    Invalid(String),

    /// A member could not be read out of an otherwise valid container.
    #[error("failed to read member {name}: {reason}")]
    Member { name: String, reason: String },

    /// A member decompressed past the configured ceiling.
    #[error("member {name} exceeds size limit ({limit} bytes)")]
    TooLarge { name: String, limit: u64 },

    /// The blocking decompression task died.
    #[error("decompression task failed: {0}")]
    Task(String),
}

/// Failure to materialize a display handle for a media record.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("blob store rejected {mime} payload of {size} bytes: {reason}")]
    Rejected {
        mime: String,
        size: usize,
        reason: String,
    },
}

/// Failure while building a single post from one array element.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("task aborted: {0}")]
    Aborted(String),
}

/// Digest provider selection failure.
#[derive(Error, Debug)]
pub enum DigestError {
    #[error("unknown digest provider: '{0}'. Must be auto, library, or builtin.")]
    Unknown(String),

    #[error("digest provider '{0}' is not available in this build")]
    Unavailable(String),
}

/// Failure of a whole ingestion run.
#[derive(Error, Debug)]
pub enum IngestError {
    /// No archive was supplied at all.
    #[error("no archives supplied")]
    NoArchives,

    /// Every supplied archive failed to open. The report explains why.
    #[error("none of the {} supplied archives could be read", .0.archive_count)]
    NoReadableArchives(Box<IngestReport>),
}
