use parking_lot::Mutex;

use super::record::CompilationRecord;
use super::{PersistenceSink, SinkError};
use crate::capture::CompilationContext;

/// Keeps persisted records in memory, in the order they arrived.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<CompilationRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CompilationRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain everything persisted so far.
    pub fn take(&self) -> Vec<CompilationRecord> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl PersistenceSink for MemorySink {
    fn append(&self, context: &CompilationContext) -> Result<(), SinkError> {
        let record = CompilationRecord::from_context(context)?;
        self.records.lock().push(record);
        Ok(())
    }
}
