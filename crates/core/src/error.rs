use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Storage error for {key} at {path}: {source}")]
    Storage {
        key: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Collector rejected batch: HTTP {status}")]
    Rejected { status: u16 },

    #[error("Collector request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Collector unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid collector URL {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Invalid telemetry config: {0}")]
    InvalidConfig(String),

    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
