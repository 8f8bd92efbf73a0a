use serde::{Deserialize, Serialize};

/// Ingest-time metadata attached to a document and every passage cut from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Source identifier, usually the uploaded filename.
    pub source: String,
    /// Lower-cased extension including the dot, e.g. `.pdf`.
    pub file_type: String,
    /// Size of the uploaded bytes.
    pub size_bytes: u64,
    pub checksum: String,
    /// RFC 3339 ingest timestamp.
    pub uploaded_at: String,
}

impl DocumentMetadata {
    pub fn new(source: impl Into<String>, file_type: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            source: source.into(),
            file_type: file_type.into(),
            size_bytes,
            checksum: String::new(),
            uploaded_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = checksum.into();
        self
    }
}

/// One retrievable unit of text. Never mutated after the chunker creates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub chunk_index: u32,
    pub chunk_count: u32,
    pub metadata: DocumentMetadata,
}

impl Passage {
    pub fn generate_id(document_id: &str, chunk_index: u32) -> String {
        use uuid::Uuid;
        let name = format!("{}:{}", document_id, chunk_index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    pub fn new(
        document_id: &str,
        text: String,
        chunk_index: u32,
        chunk_count: u32,
        metadata: DocumentMetadata,
    ) -> Self {
        Self {
            id: Self::generate_id(document_id, chunk_index),
            document_id: document_id.to_string(),
            text,
            chunk_index,
            chunk_count,
            metadata,
        }
    }

    /// Source identifier shown in context and provenance.
    pub fn source(&self) -> &str {
        &self.metadata.source
    }
}

/// Bookkeeping for one successful upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub filename: String,
    pub metadata: DocumentMetadata,
    pub chunks: usize,
    pub content_length: usize,
}

impl DocumentRecord {
    pub fn generate_id(metadata: &DocumentMetadata) -> String {
        use sha2::{Digest, Sha256};
        let input = format!(
            "{}:{}:{}",
            metadata.source, metadata.checksum, metadata.uploaded_at
        );
        let hash = Sha256::digest(input.as_bytes());
        hex::encode(&hash[..16])
    }
}
