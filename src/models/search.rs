//! Query and result models.

use serde::{Deserialize, Serialize};

use super::document::DocumentRecord;

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Provenance of one retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source identifier of the owning document
    pub source: String,

    /// 0-based passage position within the document
    pub chunk_id: u32,

    /// Raw squared L2 distance; lower is closer
    pub similarity_score: f32,

    /// Leading characters of the passage, `...` appended when truncated
    pub preview: String,
}

/// Context and provenance assembled for a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub context: String,
    pub sources: Vec<SourceRef>,
}

/// Outcome of a successful ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestResult {
    pub document_id: String,
    pub filename: String,
    pub chunks_created: usize,
}

/// Full answer returned to a caller of the query operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub context: String,
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Listing of uploaded documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentList {
    pub total_documents: usize,
    pub documents: Vec<DocumentRecord>,
}

impl DocumentList {
    pub fn new(documents: Vec<DocumentRecord>) -> Self {
        Self {
            total_documents: documents.len(),
            documents,
        }
    }
}

/// Snapshot of the retrieval engine's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatus {
    pub provider: String,
    pub dimension: usize,
    /// `ready` once a generation is installed, `empty` otherwise
    pub vector_store: String,
    pub generation: u64,
    pub documents: usize,
    pub passages: usize,
}

impl IndexStatus {
    pub fn is_ready(&self) -> bool {
        self.vector_store == "ready"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "md".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_source_ref_serializes_original_field_names() {
        let source = SourceRef {
            source: "a.txt".to_string(),
            chunk_id: 2,
            similarity_score: 0.5,
            preview: "hello".to_string(),
        };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["source"], "a.txt");
        assert_eq!(json["chunk_id"], 2);
        assert_eq!(json["similarity_score"], 0.5);
    }

    #[test]
    fn test_document_list_counts() {
        let list = DocumentList::new(vec![]);
        assert_eq!(list.total_documents, 0);
    }
}
