//! JSON-lines file sink for the event log.
//!
//! Appends one JSON object per [`Event`] to a file opened in append-only
//! mode. Writes are serialized through a `tokio::sync::Mutex` around the
//! file handle.

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::EventError;
use crate::events::{Event, EventSink};

/// Event sink that appends JSON lines to a file.
pub struct FileEventSink {
    path: PathBuf,
    writer: Mutex<Option<tokio::fs::File>>,
}

impl FileEventSink {
    /// Sink writing to `path`. The file is opened lazily on first write.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: Mutex::new(None),
        }
    }

    fn failure(reason: String) -> EventError {
        EventError::SinkFailure {
            name: "file".to_owned(),
            reason,
        }
    }
}

#[async_trait::async_trait]
impl EventSink for FileEventSink {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "file"
    }

    async fn deliver(&self, event: &Event) -> Result<(), EventError> {
        let mut line = serde_json::to_vec(event).map_err(|e| EventError::Serialization {
            reason: e.to_string(),
        })?;
        line.push(b'\n');

        let mut guard = self.writer.lock().await;
        if guard.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(|e| {
                    Self::failure(format!(
                        "failed to open event log '{}': {e}",
                        self.path.display()
                    ))
                })?;
            *guard = Some(file);
        }
        let file = guard
            .as_mut()
            .ok_or_else(|| Self::failure("file handle missing after open".to_owned()))?;

        file.write_all(&line)
            .await
            .map_err(|e| Self::failure(format!("write failed: {e}")))?;
        file.flush()
            .await
            .map_err(|e| Self::failure(format!("flush failed: {e}")))?;

        Ok(())
    }
}

impl std::fmt::Debug for FileEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileEventSink")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
