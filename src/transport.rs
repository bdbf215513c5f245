#![forbid(unsafe_code)]

//! Shared HTTP transport: one [`ureq::Agent`] per session, direct or routed
//! through a SOCKS5 proxy. The agent is built once and reused for the
//! metadata request and every stream download attempt.

use std::time::Duration;

use crate::diag::DiagnosticSink;
use crate::error::VideoError;

/// Proxy value meaning "no proxy", kept for compatibility with configs that
/// use `0` to disable proxying.
pub const NO_PROXY_SENTINEL: &str = "0";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

pub struct Transport {
    agent: ureq::Agent,
}

impl Transport {
    /// Builds the session transport. `proxy` is a SOCKS5 address
    /// (`host:port`, scheme optional); `None`, empty, or the `"0"` sentinel
    /// mean direct. A proxy that cannot be constructed is fatal: the whole
    /// resolution is aborted rather than silently falling back to direct.
    pub fn new(proxy: Option<&str>, diag: &dyn DiagnosticSink) -> Result<Self, VideoError> {
        let proxy = proxy
            .map(str::trim)
            .filter(|value| !value.is_empty() && *value != NO_PROXY_SENTINEL);

        let mut builder = ureq::AgentBuilder::new().timeout_connect(CONNECT_TIMEOUT);
        match proxy {
            Some(addr) => {
                let address = if addr.contains("://") {
                    addr.to_string()
                } else {
                    format!("socks5://{addr}")
                };
                let proxy = ureq::Proxy::new(&address).map_err(classify)?;
                builder = builder.proxy(proxy);
                diag.note(&format!("Routing requests through SOCKS5 proxy {addr}"));
            }
            None => diag.note("Using direct transport, no proxy"),
        }

        Ok(Self {
            agent: builder.build(),
        })
    }

    /// Issues a GET. Non-success statuses come back as
    /// [`VideoError::UnexpectedStatus`] even though no body is read in that
    /// branch; connection-level failures as [`VideoError::Transport`].
    pub fn get(&self, url: &str) -> Result<ureq::Response, VideoError> {
        self.agent.get(url).call().map_err(classify)
    }
}

fn classify(err: ureq::Error) -> VideoError {
    match err {
        ureq::Error::Status(status, _) => VideoError::UnexpectedStatus { status },
        ureq::Error::Transport(transport) => VideoError::Transport {
            source: Box::new(transport),
        },
    }
}
