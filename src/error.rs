use std::path::PathBuf;

use thiserror::Error;

/// Fatal failures of a sync run. Any of these aborts the run before the output is touched.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("credentials rejected by {url} (HTTP {status})")]
    Authentication { status: u16, url: String },
    #[error("group or collection not found at {url}")]
    NotFound { url: String },
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] ureq::Error),
    #[error("failed to write {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render {format} output: {message}")]
    Render {
        format: &'static str,
        message: String,
    },
}

impl SyncError {
    pub fn config(message: impl Into<String>) -> Self {
        SyncError::Configuration(message.into())
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Serialization {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure happened talking to the remote service.
    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            SyncError::Authentication { .. }
                | SyncError::NotFound { .. }
                | SyncError::Fetch(_)
                | SyncError::Http(_)
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Fetch(format!("malformed response body: {e}"))
    }
}
