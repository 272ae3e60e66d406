//! Backend replay.
//!
//! # Responsibilities
//! - Open one fresh connection per backend per captured request
//! - Replay the captured request and read the full response
//! - Normalize the response into a comparison payload
//!
//! # Design Decisions
//! - Connection-level hyper client; no pooling, so each replay observes
//!   the backend exactly the way the original caller would
//! - RTT spans dial start to full body read and is recorded on success
//!   and on failure
//! - In full-comparison mode the `Date` header is stripped before
//!   rendering, since it necessarily differs between concurrent calls

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode, Uri, Version};
use bytes::Bytes;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpStream;

use crate::mirror::capture::RawCapture;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Per-call failure taxonomy. All variants are non-fatal: they are folded
/// into the response record and surfaced through metrics.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("error establishing connection to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: BoxError,
    },
    #[error("error writing request to {addr}: {source}")]
    Write {
        addr: String,
        #[source]
        source: BoxError,
    },
    #[error("error reading response from {addr}: {source}")]
    Read {
        addr: String,
        #[source]
        source: BoxError,
    },
    #[error("error parsing response from {addr}: {source}")]
    Parse {
        addr: String,
        #[source]
        source: BoxError,
    },
}

/// Normalized outcome of replaying one request against one backend.
#[derive(Debug)]
pub struct BackendResponse {
    pub status: Option<StatusCode>,
    pub payload: Bytes,
    pub error: Option<SendError>,
    pub rtt: Duration,
}

impl BackendResponse {
    /// A response counts as errored when the call failed or the backend
    /// answered with a 5xx status.
    pub fn is_err(&self) -> bool {
        self.error.is_some() || self.status.is_some_and(|s| s.is_server_error())
    }

    pub fn status_code(&self) -> u16 {
        self.status.map(|s| s.as_u16()).unwrap_or(0)
    }
}

/// Replay `capture` against `addr`, timing the call end to end.
pub async fn send_and_time(capture: &RawCapture, addr: &str, body_only: bool) -> BackendResponse {
    let start = Instant::now();
    let mut response = match send(capture, addr, body_only).await {
        Ok(response) => response,
        Err(error) => BackendResponse {
            status: None,
            payload: Bytes::new(),
            error: Some(error),
            rtt: Duration::ZERO,
        },
    };
    response.rtt = start.elapsed();
    response
}

async fn send(
    capture: &RawCapture,
    addr: &str,
    body_only: bool,
) -> Result<BackendResponse, SendError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| SendError::Connect {
            addr: addr.to_owned(),
            source: source.into(),
        })?;

    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|source| SendError::Connect {
            addr: addr.to_owned(),
            source: source.into(),
        })?;

    // The connection task drives IO; it finishes when the sender is
    // dropped or the backend hangs up.
    let conn_addr = addr.to_owned();
    tokio::spawn(async move {
        if let Err(error) = conn.await {
            tracing::debug!(backend = %conn_addr, error = %error, "backend connection closed");
        }
    });

    let request = build_request(capture);
    let response = sender
        .send_request(request)
        .await
        .map_err(|source| {
            if source.is_parse() {
                SendError::Parse {
                    addr: addr.to_owned(),
                    source: source.into(),
                }
            } else if source.is_incomplete_message() {
                SendError::Read {
                    addr: addr.to_owned(),
                    source: source.into(),
                }
            } else {
                SendError::Write {
                    addr: addr.to_owned(),
                    source: source.into(),
                }
            }
        })?;

    let (parts, incoming) = response.into_parts();
    let body = axum::body::to_bytes(Body::new(incoming), usize::MAX)
        .await
        .map_err(|source| SendError::Read {
            addr: addr.to_owned(),
            source: source.into(),
        })?;

    let payload = if body_only {
        body
    } else {
        render_full(parts.status, parts.version, parts.headers, &body)
    };

    Ok(BackendResponse {
        status: Some(parts.status),
        payload,
        error: None,
        rtt: Duration::ZERO,
    })
}

/// Build the replay request from the capture. Backends are spoken to in
/// origin-form over HTTP/1.1; the captured headers (including `Host`) are
/// carried verbatim.
fn build_request(capture: &RawCapture) -> Request<Body> {
    let uri: Uri = capture
        .meta
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .parse()
        .unwrap_or_else(|_| Uri::from_static("/"));

    let (mut parts, _) = Request::new(()).into_parts();
    parts.method = capture.meta.method.clone();
    parts.uri = uri;
    parts.version = Version::HTTP_11;
    parts.headers = capture.meta.headers.clone();

    Request::from_parts(parts, Body::from(capture.body.clone()))
}

/// Render status line, headers (minus `Date`) and body for exact byte
/// comparison of full responses.
fn render_full(status: StatusCode, version: Version, mut headers: HeaderMap, body: &[u8]) -> Bytes {
    headers.remove(header::DATE);

    let version = match version {
        Version::HTTP_10 => "HTTP/1.0",
        _ => "HTTP/1.1",
    };

    let mut out = Vec::with_capacity(128 + body.len());
    out.extend_from_slice(version.as_bytes());
    out.push(b' ');
    out.extend_from_slice(status.as_str().as_bytes());
    if let Some(reason) = status.canonical_reason() {
        out.push(b' ');
        out.extend_from_slice(reason.as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    for (name, value) in headers.iter() {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    Bytes::from(out)
}
