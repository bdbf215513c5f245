#![forbid(unsafe_code)]

//! Video-identifier extraction from heterogeneous input strings: bare ids,
//! watch URLs, embed URLs, share URLs, or ids buried in surrounding noise.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::diag::DiagnosticSink;
use crate::error::VideoError;

/// Characters that may never appear in a video id. Their presence in the
/// input also triggers the extraction cascade.
const RESERVED: &[char] = &['"', '?', '&', '/', '<', '%', '='];

/// Substring that marks the input as a site URL rather than a bare id.
const SITE_HINT: &str = "youtu";

const MIN_ID_LEN: usize = 10;

/// Extraction cascade, most to least confident:
/// 1. id preceded by a path marker (`v=`, `v/`, `embed/`, `watch?v=`),
/// 2. any 11-character run right after `=` or `/`,
/// 3. any bare 11-character run of id-legal characters.
///
/// The cascade always runs all three in order and each match overwrites the
/// working candidate, so the last matching pattern wins. Both orderings are
/// defensible; this one is the documented behaviour and is pinned by a test.
static PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r#"(?:v|embed|watch\?v)(?:=|/)([^"&?/=%]{11})"#).unwrap(),
        Regex::new(r#"(?:=|/)([^"&?/=%]{11})"#).unwrap(),
        Regex::new(r#"([^"&?/=%]{11})"#).unwrap(),
    ]
});

/// An extracted video identifier. Opaque and immutable: produced once here,
/// consumed by the metadata fetcher, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns an arbitrary input string into a canonical [`VideoId`], or fails
/// with [`VideoError::InvalidIdentifier`].
pub fn extract_video_id(raw: &str, diag: &dyn DiagnosticSink) -> Result<VideoId, VideoError> {
    let mut candidate = raw.to_string();

    if raw.contains(SITE_HINT) || raw.contains(RESERVED) {
        for pattern in PATTERNS.iter() {
            // Each pattern matches against the current candidate, which a
            // previous pattern may already have narrowed.
            if let Some(captures) = pattern.captures(&candidate) {
                candidate = captures[1].to_string();
            }
        }
    }

    if candidate.contains(RESERVED) {
        return Err(VideoError::InvalidIdentifier {
            id: candidate,
            reason: "contains reserved characters".into(),
        });
    }
    if candidate.len() < MIN_ID_LEN {
        return Err(VideoError::InvalidIdentifier {
            id: candidate,
            reason: format!("shorter than {MIN_ID_LEN} characters"),
        });
    }

    diag.note(&format!("Found video id: {candidate}"));
    Ok(VideoId(candidate))
}
