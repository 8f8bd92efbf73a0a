//! Bookkeeping for uploaded documents.

use crate::models::DocumentRecord;

/// Records of every successful upload since the last clear, in upload order.
#[derive(Debug, Clone, Default)]
pub struct DocumentCollection {
    records: Vec<DocumentRecord>,
}

impl DocumentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: DocumentRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[DocumentRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&DocumentRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Passages produced across all recorded uploads.
    pub fn total_chunks(&self) -> usize {
        self.records.iter().map(|r| r.chunks).sum()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
