use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for the backup pipeline. Per-job variants are caught at
/// the orchestrator boundary; only `Config` aborts before the job loop.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dump produce failed: {0}")]
    Produce(String),

    #[error("Source directory not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("Archive missing after compression reported success: {0}")]
    CompressionVerification(PathBuf),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BackupError>;
