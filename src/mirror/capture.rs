//! Captured-request model.
//!
//! A capture is taken once at ingestion and never mutated: the parsed
//! request line and headers (for replay and path bucketing), the body
//! bytes (the bucketing payload), and the serialized wire form (what gets
//! persisted when the backends diverge).

use axum::http::{HeaderMap, Method, Uri, Version};
use bytes::Bytes;

/// Request line and headers as seen at ingestion.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

/// One captured inbound request, owned by the queue and then by exactly
/// one worker.
#[derive(Debug, Clone)]
pub struct RawCapture {
    pub meta: RequestMeta,
    pub body: Bytes,
    /// Serialized request line + headers + body.
    pub wire: Bytes,
}

impl RawCapture {
    pub fn new(meta: RequestMeta, body: Bytes) -> Self {
        let wire = serialize(&meta, &body);
        Self { meta, body, wire }
    }
}

fn version_token(version: Version) -> &'static str {
    match version {
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        _ => "HTTP/1.1",
    }
}

/// Render the request in HTTP/1.x wire form.
fn serialize(meta: &RequestMeta, body: &Bytes) -> Bytes {
    let path = meta
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut out = Vec::with_capacity(128 + body.len());
    out.extend_from_slice(meta.method.as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(path.as_bytes());
    out.push(b' ');
    out.extend_from_slice(version_token(meta.version).as_bytes());
    out.extend_from_slice(b"\r\n");
    for (name, value) in meta.headers.iter() {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    Bytes::from(out)
}
