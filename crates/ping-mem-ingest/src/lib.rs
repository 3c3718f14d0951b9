//! Deterministic project scanning (C11), code chunking (C12), and the
//! ingestion pipeline that ties them to the graph and vector stores (C13).

pub mod chunker;
pub mod error;
pub mod pipeline;
pub mod scanner;

pub use error::{IngestError, Result};
pub use pipeline::{DeleteResult, IngestRequest, IngestResult, IngestionPipeline, VerifyResult};
pub use scanner::{Manifest, FileRecord};
