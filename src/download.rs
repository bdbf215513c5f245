#![forbid(unsafe_code)]

//! Download engine: walks the stream catalog in priority order, persists the
//! first candidate that transfers cleanly, and falls back to the next one on
//! any failure.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::catalog::{StreamCatalog, StreamDescriptor};
use crate::diag::DiagnosticSink;
use crate::error::VideoError;
use crate::progress::{DownloadSession, ProgressSender};
use crate::transport::Transport;

const CHUNK_SIZE: usize = 64 * 1024;

/// File name used when a descriptor carries no usable title.
const FALLBACK_STEM: &str = "video";

pub struct DownloadEngine<'a> {
    transport: &'a Transport,
    progress: ProgressSender,
    diag: &'a dyn DiagnosticSink,
}

/// Terminal result of a successful download.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub bytes_written: u64,
}

impl<'a> DownloadEngine<'a> {
    pub fn new(
        transport: &'a Transport,
        progress: ProgressSender,
        diag: &'a dyn DiagnosticSink,
    ) -> Self {
        Self {
            transport,
            progress,
            diag,
        }
    }

    /// Attempts each catalog candidate in order and returns after the first
    /// success. Per-candidate failures are recovered locally; only total
    /// exhaustion surfaces, carrying the last underlying error. Partially
    /// written files are left in place for the caller's cleanup policy.
    pub fn download(
        &self,
        catalog: &StreamCatalog,
        dest_dir: &Path,
    ) -> Result<DownloadOutcome, VideoError> {
        let mut last_error = None;

        for (index, stream) in catalog.streams().iter().enumerate() {
            let target = stream.fetch_url();
            let dest = dest_dir.join(file_name_for(stream));
            self.diag.note(&format!(
                "Attempting candidate {index} ({}) -> {}",
                stream.quality,
                dest.display()
            ));

            match self.fetch_to_file(&target, &dest) {
                Ok(bytes_written) => {
                    return Ok(DownloadOutcome {
                        path: dest,
                        bytes_written,
                    });
                }
                Err(err) => {
                    self.diag.note(&format!("Candidate {index} failed: {err}"));
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(last) => Err(VideoError::AllCandidatesExhausted {
                last: Box::new(last),
            }),
            // An empty catalog never produced an attempt to fail.
            None => Err(VideoError::NoStreams),
        }
    }

    /// One streamed fetch-and-persist attempt, teeing every chunk to disk
    /// and to a fresh per-attempt session. The session is discarded with the
    /// attempt.
    fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, VideoError> {
        let response = self.transport.get(url)?;
        let total = response
            .header("Content-Length")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(0);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }
        let mut file = File::create(dest).map_err(|source| io_error(dest, source))?;

        let mut session = DownloadSession::new(total, self.progress.clone());
        let mut reader = response.into_reader();
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            let n = reader
                .read(&mut chunk)
                .map_err(|source| io_error(dest, source))?;
            if n == 0 {
                break;
            }
            file.write_all(&chunk[..n])
                .map_err(|source| io_error(dest, source))?;
            session.record(n as u64);
        }
        file.flush().map_err(|source| io_error(dest, source))?;

        Ok(session.bytes_written())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> VideoError {
    VideoError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Destination file name: the sanitized title (generic fallback when empty)
/// plus an extension derived from the content type when recognizable. Must
/// always produce a valid, writable single path component.
fn file_name_for(stream: &StreamDescriptor) -> String {
    let stem = sanitize_file_stem(&stream.title);
    match extension_for(&stream.mime_type) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

/// Replaces filesystem metacharacters and control characters so any title
/// becomes a single safe path component.
fn sanitize_file_stem(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Maps the descriptor's MIME-like tag (`video/mp4; codecs="..."`) to a file
/// extension. Unknown tags get no extension rather than a guess.
fn extension_for(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    match essence {
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/x-flv" => Some("flv"),
        "video/3gpp" => Some("3gp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::NullSink;
    use crate::progress::progress_channel;
    use std::io::Write as _;
    use std::net::TcpListener;
    use std::thread;
    use tempfile::tempdir;

    fn descriptor(quality: &str, url: &str, title: &str) -> StreamDescriptor {
        StreamDescriptor {
            quality: quality.to_string(),
            mime_type: "video/mp4".to_string(),
            url: url.to_string(),
            signature: None,
            title: title.to_string(),
            author: String::new(),
        }
    }

    fn catalog_of(streams: Vec<StreamDescriptor>) -> StreamCatalog {
        // Round-trip through the parser's legacy schema so tests exercise
        // the same catalog shape production code sees.
        use url::form_urlencoded::Serializer;
        let records: Vec<String> = streams
            .iter()
            .map(|stream| {
                let mut record = Serializer::new(String::new());
                record
                    .append_pair("quality", &stream.quality)
                    .append_pair("type", &stream.mime_type)
                    .append_pair("url", &stream.url);
                record.finish()
            })
            .collect();
        let map = records.join(",");
        let mut raw = Serializer::new(String::new());
        raw.append_pair("status", "ok")
            .append_pair("url_encoded_fmt_stream_map", &map)
            .append_pair("title", &streams[0].title);
        crate::catalog::parse_stream_catalog(&raw.finish(), &NullSink).unwrap()
    }

    /// Serves canned HTTP responses on a random port: `/fail` paths get a
    /// 503, everything else the given body. Handles `connections` requests
    /// sequentially, then exits.
    fn spawn_server(body: &'static str, connections: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for _ in 0..connections {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let mut buf = [0u8; 2048];
                let n = std::io::Read::read(&mut stream, &mut buf).unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let response = if request.contains("GET /fail") {
                    "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
                } else {
                    format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    )
                };
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn first_candidate_success_short_circuits() {
        let base = spawn_server("payload-bytes", 1);
        let dir = tempdir().unwrap();
        let catalog = catalog_of(vec![
            descriptor("hd720", &format!("{base}/ok"), "First Pick"),
            descriptor("medium", &format!("{base}/never-touched"), "First Pick"),
        ]);

        let (tx, _rx) = progress_channel();
        let sink = NullSink;
        let transport = Transport::new(None, &sink).unwrap();
        let engine = DownloadEngine::new(&transport, tx, &sink);

        let outcome = engine.download(&catalog, dir.path()).unwrap();
        assert_eq!(outcome.bytes_written, "payload-bytes".len() as u64);
        assert_eq!(
            fs::read_to_string(&outcome.path).unwrap(),
            "payload-bytes"
        );
    }

    /// Two failing candidates followed by a good one: exactly one file is
    /// persisted, from the third descriptor.
    #[test]
    fn fallback_reaches_third_candidate() {
        let base = spawn_server("third-time-lucky", 3);
        let dir = tempdir().unwrap();
        let catalog = catalog_of(vec![
            descriptor("hd1080", &format!("{base}/fail/1"), "Resilient"),
            descriptor("hd720", &format!("{base}/fail/2"), "Resilient"),
            descriptor("medium", &format!("{base}/good"), "Resilient"),
        ]);

        let (tx, _rx) = progress_channel();
        let sink = NullSink;
        let transport = Transport::new(None, &sink).unwrap();
        let engine = DownloadEngine::new(&transport, tx, &sink);

        let outcome = engine.download(&catalog, dir.path()).unwrap();
        assert_eq!(
            fs::read_to_string(&outcome.path).unwrap(),
            "third-time-lucky"
        );
        // Same title, same destination: exactly one file on disk.
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn exhausting_all_candidates_reports_last_error() {
        let base = spawn_server("", 3);
        let dir = tempdir().unwrap();
        let catalog = catalog_of(vec![
            descriptor("hd1080", &format!("{base}/fail/1"), "Doomed"),
            descriptor("hd720", &format!("{base}/fail/2"), "Doomed"),
            descriptor("medium", &format!("{base}/fail/3"), "Doomed"),
        ]);

        let (tx, _rx) = progress_channel();
        let sink = NullSink;
        let transport = Transport::new(None, &sink).unwrap();
        let engine = DownloadEngine::new(&transport, tx, &sink);

        let err = engine.download(&catalog, dir.path()).unwrap_err();
        match err {
            VideoError::AllCandidatesExhausted { last } => {
                assert!(matches!(
                    *last,
                    VideoError::UnexpectedStatus { status: 503 }
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn progress_events_are_emitted_during_transfer() {
        let base = spawn_server("0123456789", 1);
        let dir = tempdir().unwrap();
        let catalog = catalog_of(vec![descriptor("medium", &format!("{base}/ok"), "Tracked")]);

        let (tx, rx) = progress_channel();
        let sink = NullSink;
        let transport = Transport::new(None, &sink).unwrap();
        let engine = DownloadEngine::new(&transport, tx, &sink);
        engine.download(&catalog, dir.path()).unwrap();

        let levels: Vec<u8> = rx.drain().collect();
        assert!(!levels.is_empty());
        assert!(levels.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(*levels.last().unwrap() <= 100);
    }

    #[test]
    fn destination_directory_is_created_recursively() {
        let base = spawn_server("deep", 1);
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        let catalog = catalog_of(vec![descriptor("medium", &format!("{base}/ok"), "Nested")]);

        let (tx, _rx) = progress_channel();
        let sink = NullSink;
        let transport = Transport::new(None, &sink).unwrap();
        let engine = DownloadEngine::new(&transport, tx, &sink);

        let outcome = engine.download(&catalog, &nested).unwrap();
        assert!(outcome.path.starts_with(&nested));
        assert!(outcome.path.exists());
    }

    /// The sanitization contract: a title full of filesystem metacharacters
    /// must still produce a valid, writable path.
    #[test]
    fn unsafe_title_still_produces_writable_path() {
        let base = spawn_server("spicy", 1);
        let dir = tempdir().unwrap();
        let catalog = catalog_of(vec![descriptor(
            "medium",
            &format!("{base}/ok"),
            "a/b\\c:d*e?f\"g<h>i|j",
        )]);

        let (tx, _rx) = progress_channel();
        let sink = NullSink;
        let transport = Transport::new(None, &sink).unwrap();
        let engine = DownloadEngine::new(&transport, tx, &sink);

        let outcome = engine.download(&catalog, dir.path()).unwrap();
        assert!(outcome.path.exists());
        // Sanitized into a single component directly under the destination.
        assert_eq!(outcome.path.parent().unwrap(), dir.path());
    }

    #[test]
    fn sanitize_replaces_metacharacters() {
        assert_eq!(sanitize_file_stem("a/b:c"), "a_b_c");
        assert_eq!(sanitize_file_stem("  spaced  "), "spaced");
        assert_eq!(sanitize_file_stem(""), "video");
        assert_eq!(sanitize_file_stem("..."), "video");
    }

    #[test]
    fn extension_derived_from_mime_essence() {
        assert_eq!(extension_for("video/mp4; codecs=\"avc1\""), Some("mp4"));
        assert_eq!(extension_for("video/webm"), Some("webm"));
        assert_eq!(extension_for("application/octet-stream"), None);
    }

    #[test]
    fn empty_title_falls_back_to_generic_name() {
        let stream = descriptor("medium", "https://cdn.example/x", "");
        assert_eq!(file_name_for(&stream), "video.mp4");
    }
}
