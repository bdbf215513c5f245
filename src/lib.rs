#![forbid(unsafe_code)]

//! tubepull resolves a video reference (a bare id or any of the usual URL
//! shapes) into a ranked list of downloadable streams and saves the best
//! available one to disk.
//!
//! The pipeline is strictly sequential: [`extract::extract_video_id`] →
//! [`resolver::MetadataFetcher::fetch`] → [`catalog::parse_stream_catalog`] →
//! [`download::DownloadEngine::download`]. The only concurrency is the
//! bounded progress channel, which the transfer loop writes to without ever
//! blocking on a consumer.

pub mod catalog;
pub mod config;
pub mod diag;
pub mod download;
pub mod error;
pub mod extract;
pub mod progress;
pub mod resolver;
pub mod security;
pub mod transport;

pub use catalog::{StreamCatalog, StreamDescriptor, parse_stream_catalog};
pub use diag::{DiagnosticSink, NullSink, StderrSink};
pub use download::{DownloadEngine, DownloadOutcome};
pub use error::VideoError;
pub use extract::{VideoId, extract_video_id};
pub use progress::{DownloadSession, ProgressSender, progress_channel};
pub use resolver::MetadataFetcher;
pub use transport::Transport;
