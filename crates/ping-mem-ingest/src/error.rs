//! Error taxonomy for the scanning/chunking/ingestion pipeline.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(String),

    #[error("invalid project directory: {0}")]
    InvalidProjectDir(String),

    #[error("core error: {0}")]
    Core(#[from] ping_mem_core::error::Error),
}
