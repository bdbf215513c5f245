#![forbid(unsafe_code)]

//! Error taxonomy shared by every pipeline stage.
//!
//! Per-record parse failures and per-candidate download failures are
//! recovered locally by their components; everything surfaced through this
//! enum aborts the whole resolution.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VideoError {
    /// The input did not yield a plausible video id: reserved characters
    /// survived extraction, or the candidate is too short.
    #[error("invalid video id {id:?}: {reason}")]
    InvalidIdentifier { id: String, reason: String },

    /// Connection, DNS, or proxy-handshake failure. Also covers a failed
    /// proxy construction, which is fatal to the whole session.
    #[error("transport failure: {source}")]
    Transport {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The server answered with a non-success HTTP status.
    #[error("unexpected HTTP status {status}")]
    UnexpectedStatus { status: u16 },

    /// A required top-level field is missing from the resolver response.
    #[error("malformed resolver response: missing {field:?}")]
    MalformedResponse { field: &'static str },

    /// The resolver answered `status=fail`.
    #[error("resolver rejected the request: {reason}")]
    ServerRejected { reason: String },

    /// The resolver answered with a status that is neither `ok` nor `fail`.
    #[error("unrecognized resolver status {status:?}")]
    UnexpectedServerStatus { status: String },

    /// No usable stream candidates survived parsing.
    #[error("no usable streams in resolver response")]
    NoStreams,

    /// Every candidate in the catalog failed to download.
    #[error("every stream candidate failed")]
    AllCandidatesExhausted {
        #[source]
        last: Box<VideoError>,
    },

    /// Creating or writing the destination file failed.
    #[error("writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
