#![forbid(unsafe_code)]

//! Decodes the resolver's semi-structured key/value response into an ordered
//! list of stream descriptors.
//!
//! The response format has shifted across server-side revisions, so parsing
//! models it as a tagged union: the legacy flat query-string schema carries
//! the catalog inside `url_encoded_fmt_stream_map`, the modern schema nests
//! a JSON blob under `player_response`. Both normalize into the same
//! [`StreamDescriptor`] shape, and unrecognized shapes fail cleanly instead
//! of crashing.

use std::collections::HashMap;

use serde::Deserialize;
use url::form_urlencoded;

use crate::diag::DiagnosticSink;
use crate::error::VideoError;

/// One downloadable rendition, normalized from either schema variant.
/// Immutable once built; the catalog is read-only after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Coarse resolution/bitrate tier, in the server's own vocabulary.
    pub quality: String,
    /// MIME-like content/codec tag (the legacy schema calls it `type`).
    pub mime_type: String,
    /// Fetch target. May still need the signature suffix appended.
    pub url: String,
    /// Authorization token some schema revisions deliver separately from the
    /// URL. Appended at fetch time only when present.
    pub signature: Option<String>,
    pub title: String,
    pub author: String,
}

impl StreamDescriptor {
    /// The URL to actually fetch: base `url` plus the signature suffix when
    /// one was delivered. Whether the suffix is still required against the
    /// current resolver schema is unknown, so it is strictly conditional on
    /// the field's presence.
    pub fn fetch_url(&self) -> String {
        match &self.signature {
            Some(sig) => format!("{}&signature={}", self.url, sig),
            None => self.url.clone(),
        }
    }
}

/// Streams in server-assigned priority order: index 0 is the preferred,
/// highest-resolution candidate. Never re-sorted.
#[derive(Debug, Clone)]
pub struct StreamCatalog {
    streams: Vec<StreamDescriptor>,
}

impl StreamCatalog {
    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

/// Subset of the `player_response` JSON we consume. Everything is optional
/// because the shape is dictated by an unstable third-party service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    video_details: Option<VideoDetails>,
    streaming_data: Option<StreamingData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoDetails {
    title: Option<String>,
    author: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamingData {
    #[serde(default)]
    formats: Vec<RawFormat>,
    #[serde(default)]
    adaptive_formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFormat {
    url: Option<String>,
    mime_type: Option<String>,
    quality: Option<String>,
}

/// Which revision of the response format carried the catalog payload.
enum Schema<'a> {
    /// `url_encoded_fmt_stream_map`: comma-separated URL-encoded records.
    Legacy(&'a str),
    /// `player_response` JSON with `streamingData` format lists.
    Modern(PlayerResponse),
}

/// Parses the raw metadata blob into a [`StreamCatalog`], validating the
/// top-level `status` field first.
pub fn parse_stream_catalog(
    raw: &str,
    diag: &dyn DiagnosticSink,
) -> Result<StreamCatalog, VideoError> {
    let fields = parse_query(raw);

    let status = fields
        .get("status")
        .ok_or(VideoError::MalformedResponse { field: "status" })?;
    match status.as_str() {
        "ok" => {}
        "fail" => {
            let reason = fields
                .get("reason")
                .cloned()
                .unwrap_or_else(|| "no reason given".to_string());
            return Err(VideoError::ServerRejected { reason });
        }
        other => {
            return Err(VideoError::UnexpectedServerStatus {
                status: other.to_string(),
            });
        }
    }

    // The modern JSON blob may accompany a legacy stream map; it is parsed
    // either way because it is the primary source of title/author.
    let player = fields.get("player_response").and_then(|blob| {
        match serde_json::from_str::<PlayerResponse>(blob) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                diag.note(&format!("Could not parse player_response JSON: {err}"));
                None
            }
        }
    });

    let (title, author) = resolve_credits(&fields, player.as_ref());

    let schema = if let Some(map) = fields.get("url_encoded_fmt_stream_map") {
        Schema::Legacy(map.as_str())
    } else if let Some(player) = player {
        Schema::Modern(player)
    } else {
        return Err(VideoError::NoStreams);
    };

    let streams = match schema {
        Schema::Legacy(map) => parse_legacy_records(map, &title, &author, diag),
        Schema::Modern(player) => parse_modern_formats(player, &title, &author, diag),
    };

    if streams.is_empty() {
        return Err(VideoError::NoStreams);
    }
    Ok(StreamCatalog { streams })
}

/// Decodes a URL-encoded query string into a map; the first value wins for
/// repeated keys.
fn parse_query(input: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for (key, value) in form_urlencoded::parse(input.as_bytes()) {
        fields
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    fields
}

/// Title and author are resolved once and denormalized into every surviving
/// descriptor. The nested JSON is preferred; flat `title`/`author` fields
/// cover older schema revisions.
fn resolve_credits(
    fields: &HashMap<String, String>,
    player: Option<&PlayerResponse>,
) -> (String, String) {
    if let Some(details) = player.and_then(|player| player.video_details.as_ref())
        && let (Some(title), Some(author)) = (&details.title, &details.author)
    {
        return (title.clone(), author.clone());
    }
    (
        fields.get("title").cloned().unwrap_or_default(),
        fields.get("author").cloned().unwrap_or_default(),
    )
}

/// Walks the comma-separated record list. One malformed rendition must not
/// abort resolution of the others, so failures are skipped with a
/// diagnostic and placeholders are skipped silently.
fn parse_legacy_records(
    stream_map: &str,
    title: &str,
    author: &str,
    diag: &dyn DiagnosticSink,
) -> Vec<StreamDescriptor> {
    let mut streams = Vec::new();
    for (position, record) in stream_map.split(',').enumerate() {
        let pairs = parse_query(record);

        // A record without `quality` is an empty placeholder, not an error.
        let Some(quality) = pairs.get("quality") else {
            diag.note(&format!("Skipping empty stream record {position}"));
            continue;
        };
        let (Some(mime_type), Some(url)) = (pairs.get("type"), pairs.get("url")) else {
            diag.note(&format!(
                "Skipping malformed stream record {position}: missing type or url"
            ));
            continue;
        };

        let signature = pairs
            .get("sig")
            .or_else(|| pairs.get("signature"))
            .cloned();

        diag.note(&format!(
            "Stream found: quality {quality:?}, format {mime_type:?}"
        ));
        streams.push(StreamDescriptor {
            quality: quality.clone(),
            mime_type: mime_type.clone(),
            url: url.clone(),
            signature,
            title: title.to_string(),
            author: author.to_string(),
        });
    }
    streams
}

/// Normalizes the modern format lists: muxed `formats` first, then
/// `adaptiveFormats`, keeping the server's relative order within each list.
fn parse_modern_formats(
    player: PlayerResponse,
    title: &str,
    author: &str,
    diag: &dyn DiagnosticSink,
) -> Vec<StreamDescriptor> {
    let Some(data) = player.streaming_data else {
        return Vec::new();
    };

    let mut streams = Vec::new();
    for (position, format) in data
        .formats
        .into_iter()
        .chain(data.adaptive_formats)
        .enumerate()
    {
        let Some(quality) = format.quality else {
            diag.note(&format!("Skipping empty format entry {position}"));
            continue;
        };
        // Cipher-protected formats deliver no direct URL; they are not
        // usable without the signature dance, so skip them.
        let (Some(mime_type), Some(url)) = (format.mime_type, format.url) else {
            diag.note(&format!(
                "Skipping format entry {position}: no direct url or mime type"
            ));
            continue;
        };

        diag.note(&format!(
            "Stream found: quality {quality:?}, format {mime_type:?}"
        ));
        streams.push(StreamDescriptor {
            quality,
            mime_type,
            url,
            signature: None,
            title: title.to_string(),
            author: author.to_string(),
        });
    }
    streams
}
