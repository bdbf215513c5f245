#![forbid(unsafe_code)]

//! Metadata fetch: one GET against the resolver endpoint, returning the raw
//! response body for the catalog parser.

use crate::diag::DiagnosticSink;
use crate::error::VideoError;
use crate::extract::VideoId;
use crate::transport::Transport;

/// Default resolver endpoint. The response schema behind it is a moving
/// target maintained by a third party; see the catalog parser.
pub const DEFAULT_ENDPOINT: &str = "https://www.youtube.com/get_video_info";

pub struct MetadataFetcher<'a> {
    transport: &'a Transport,
    endpoint: String,
    diag: &'a dyn DiagnosticSink,
}

impl<'a> MetadataFetcher<'a> {
    pub fn new(transport: &'a Transport, diag: &'a dyn DiagnosticSink) -> Self {
        Self::with_endpoint(transport, DEFAULT_ENDPOINT, diag)
    }

    /// Points the fetcher at a different resolver base URL. Used by tests
    /// and by self-hosted resolver mirrors.
    pub fn with_endpoint(
        transport: &'a Transport,
        endpoint: &str,
        diag: &'a dyn DiagnosticSink,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.trim_end_matches('?').to_string(),
            diag,
        }
    }

    /// Fetches the raw metadata blob for `id`. The body comes back as an
    /// opaque text blob; decoding it is the catalog parser's job.
    pub fn fetch(&self, id: &VideoId) -> Result<String, VideoError> {
        let url = format!("{}?video_id={}", self.endpoint, id);
        self.diag.note(&format!("Fetching video info: {url}"));

        let response = self.transport.get(&url)?;
        response.into_string().map_err(|err| VideoError::Transport {
            source: Box::new(err),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::NullSink;
    use crate::extract::extract_video_id;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves exactly one HTTP response on a random local port, then exits.
    /// Returns the base URL and the join handle carrying the request line.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 2048];
            let n = stream.read(&mut buf).unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let response = format!(
                "{status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{addr}/get_video_info"), handle)
    }

    #[test]
    fn fetch_appends_id_and_returns_body() {
        let (endpoint, handle) = serve_once("HTTP/1.1 200 OK", "status=ok&foo=bar");
        let sink = NullSink;
        let transport = Transport::new(None, &sink).unwrap();
        let fetcher = MetadataFetcher::with_endpoint(&transport, &endpoint, &sink);
        let id = extract_video_id("dQw4w9WgXcQ", &sink).unwrap();

        let body = fetcher.fetch(&id).unwrap();
        assert_eq!(body, "status=ok&foo=bar");

        let request_line = handle.join().unwrap();
        assert!(request_line.contains("/get_video_info?video_id=dQw4w9WgXcQ"));
    }

    /// A non-success status must surface as an error even though the body is
    /// never read in that branch.
    #[test]
    fn non_success_status_is_an_error() {
        let (endpoint, handle) = serve_once("HTTP/1.1 404 Not Found", "");
        let sink = NullSink;
        let transport = Transport::new(None, &sink).unwrap();
        let fetcher = MetadataFetcher::with_endpoint(&transport, &endpoint, &sink);
        let id = extract_video_id("dQw4w9WgXcQ", &sink).unwrap();

        let err = fetcher.fetch(&id).unwrap_err();
        assert!(matches!(err, VideoError::UnexpectedStatus { status: 404 }));
        handle.join().unwrap();
    }
}
