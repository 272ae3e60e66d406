//! Capture-front HTTP server.
//!
//! # Responsibilities
//! - Accept every inbound request on a catch-all route
//! - Serialize it into an immutable capture and enqueue without blocking
//! - Always answer the original caller with the fixed acknowledgement,
//!   decoupled from backend latency and mirroring outcome

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::IntoResponse,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::mirror::{Mirror, RawCapture, RequestMeta};

/// Fixed acknowledgement returned for every captured request.
const ACK: &str = "OK";

/// HTTP server feeding the mirror pipeline.
pub struct MirrorServer {
    router: Router,
}

impl MirrorServer {
    pub fn new(mirror: Arc<Mirror>) -> Self {
        let router = Router::new()
            .route("/{*path}", any(capture_handler))
            .route("/", any(capture_handler))
            .with_state(mirror)
            .layer(TraceLayer::new_for_http());
        Self { router }
    }

    /// Serve until SIGINT.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "capture front listening");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("capture front stopped");
        Ok(())
    }

    /// The router, for serving from a test harness.
    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Catch-all handler: capture, enqueue, acknowledge.
///
/// Failures are never surfaced to the caller; the response is the fixed
/// acknowledgement regardless of mirroring outcome.
async fn capture_handler(
    State(mirror): State<Arc<Mirror>>,
    request: Request<Body>,
) -> impl IntoResponse {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(body) => body,
        Err(error) => {
            tracing::warn!(error = %error, "failed to read request body; capture skipped");
            return ACK;
        }
    };

    let capture = RawCapture::new(
        RequestMeta {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
        },
        body,
    );

    mirror.submit(capture);
    ACK
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
