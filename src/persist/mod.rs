//! Persistence of diverging captures.
//!
//! # Responsibilities
//! - Serialize writes from many workers through one writer task
//! - Append each diverging raw capture durably, best-effort
//!
//! # Design Decisions
//! - Bounded channel; a full queue drops the capture rather than stall a
//!   worker, and no acknowledgement flows back to the dispatcher
//! - Records are length-framed (`--- <len>\n` header) so raw HTTP bytes
//!   can be split apart again for replay

use std::path::PathBuf;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

const QUEUE_CAPACITY: usize = 100;

/// Handle for appending diverging captures to the requests file.
///
/// Cheap to clone; all clones feed the same single writer task.
#[derive(Debug, Clone)]
pub struct DiffLog {
    tx: mpsc::Sender<Bytes>,
}

impl DiffLog {
    /// Spawn the writer task appending to `path`.
    pub fn spawn(path: PathBuf) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        tokio::spawn(write_loop(path, rx));
        Self { tx }
    }

    /// Queue one capture for appending. Never blocks; drops when the
    /// writer is behind.
    pub fn try_append(&self, raw: Bytes) {
        if self.tx.try_send(raw).is_err() {
            tracing::warn!("requests file writer behind; dropping diverging capture");
        }
    }
}

async fn write_loop(path: PathBuf, mut rx: mpsc::Receiver<Bytes>) {
    let mut file = match tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
    {
        Ok(file) => file,
        Err(error) => {
            tracing::error!(path = %path.display(), error = %error, "cannot open requests file");
            return;
        }
    };

    tracing::info!(path = %path.display(), "writing diverging requests");

    while let Some(raw) = rx.recv().await {
        let header = format!("--- {}\n", raw.len());
        let result = async {
            file.write_all(header.as_bytes()).await?;
            file.write_all(&raw).await?;
            file.write_all(b"\n").await?;
            file.flush().await
        }
        .await;
        if let Err(error) = result {
            tracing::warn!(path = %path.display(), error = %error, "requests file write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn writer_appends_framed_records() {
        let path = std::env::temp_dir().join(format!("diffmirror-persist-{}", uuid::Uuid::new_v4()));
        let log = DiffLog::spawn(path.clone());
        log.try_append(Bytes::from_static(b"GET / HTTP/1.1\r\n\r\n"));
        log.try_append(Bytes::from_static(b"second"));

        let mut contents = String::new();
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            contents = tokio::fs::read_to_string(&path).await.unwrap_or_default();
            if contents.contains("second") {
                break;
            }
        }
        assert!(contents.starts_with("--- 18\nGET / HTTP/1.1\r\n\r\n\n"));
        assert!(contents.contains("--- 6\nsecond\n"));

        let _ = tokio::fs::remove_file(&path).await;
    }
}
