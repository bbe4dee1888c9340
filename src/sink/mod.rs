//! Durable storage for finalized compilation contexts.

pub mod jsonl;
pub mod memory;
pub mod reader;
pub mod record;

use thiserror::Error;

use crate::capture::{CompilationContext, ContextError};

pub use jsonl::JsonlArtifactWriter;
pub use memory::MemorySink;
pub use reader::{read_artifact, ArtifactError, ArtifactReader, ArtifactSummary};
pub use record::{CompilationRecord, RECORD_SCHEMA_VERSION};

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Context not persistable: {0}")]
    Context(#[from] ContextError),
}

/// Receives each finalized context exactly once.
///
/// Implementations are shared by every concurrently running compile and
/// must keep each record whole: two appends never interleave.
pub trait PersistenceSink: Send + Sync {
    fn append(&self, context: &CompilationContext) -> Result<(), SinkError>;
}
