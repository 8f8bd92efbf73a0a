//! Ingest and query orchestration over one index, one document list and one
//! bound embedding provider.
//!
//! Ingest and clear are serialized by a write lock held across the whole
//! chunk, embed and build sequence. Queries take a snapshot of the current
//! generation and never observe a partially built one. A new generation is
//! built from every entry of the previous one plus the new document's
//! passages, so earlier uploads stay searchable without being re-embedded.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::{EmbeddingError, RetrievalError};
use crate::extract;
use crate::models::{
    ChunkingConfig, DocumentList, DocumentMetadata, DocumentRecord, IndexStatus, IngestResult,
    Passage, RetrievalConfig, RetrievalResult, SourceRef,
};
use crate::services::chunker::TextChunker;
use crate::services::collection::DocumentCollection;
use crate::services::embedding::{SharedProvider, check_dimensions};
use crate::services::vector_index::{SearchHit, VectorIndex};
use crate::utils::text::{is_blank, preview};

/// Delimiter between passages in an assembled context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

struct EngineState {
    index: VectorIndex,
    documents: DocumentCollection,
}

pub struct RetrievalOrchestrator {
    provider: SharedProvider,
    chunker: TextChunker,
    default_k: usize,
    preview_chars: usize,
    max_file_size: u64,
    write_lock: Mutex<()>,
    state: RwLock<EngineState>,
}

impl RetrievalOrchestrator {
    pub fn new(
        provider: SharedProvider,
        chunking: &ChunkingConfig,
        retrieval: &RetrievalConfig,
    ) -> Self {
        let dimension = provider.dimension();
        Self {
            provider,
            chunker: TextChunker::new(chunking),
            default_k: retrieval.default_k.max(1),
            preview_chars: retrieval.preview_chars,
            max_file_size: retrieval.max_file_size,
            write_lock: Mutex::new(()),
            state: RwLock::new(EngineState {
                index: VectorIndex::new(dimension),
                documents: DocumentCollection::new(),
            }),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Extract `path` and ingest its text under the file's name.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestResult, RetrievalError> {
        let document = extract::extract_file(path, self.max_file_size).await?;
        let metadata = document.metadata();
        self.ingest(&document.text, metadata).await
    }

    /// Chunk, embed and index one document. On any failure nothing changes.
    pub async fn ingest(
        &self,
        text: &str,
        metadata: DocumentMetadata,
    ) -> Result<IngestResult, RetrievalError> {
        if is_blank(text) {
            return Err(RetrievalError::EmptyDocument);
        }

        let _write = self.write_lock.lock().await;

        let document_id = DocumentRecord::generate_id(&metadata);
        let passages = self.chunker.chunk_document(&document_id, text, &metadata);
        if passages.is_empty() {
            return Err(RetrievalError::EmptyDocument);
        }

        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let vectors = self.provider.embed_batch(&texts).await?;
        check_dimensions(&vectors, texts.len(), self.dimension())?;

        let chunks_created = passages.len();
        let generation = {
            let state = self.state.read().await;
            let mut entries: Vec<(Vec<f32>, Passage)> = state
                .index
                .generation()
                .map(|current| {
                    current
                        .entries()
                        .map(|(vector, passage)| (vector, passage.clone()))
                        .collect()
                })
                .unwrap_or_default();
            entries.extend(vectors.into_iter().zip(passages));
            state.index.prepare(entries)?
        };

        let record = DocumentRecord {
            id: document_id.clone(),
            filename: metadata.source.clone(),
            metadata,
            chunks: chunks_created,
            content_length: text.chars().count(),
        };

        let mut state = self.state.write().await;
        let total = generation.len();
        state.index.install(Arc::new(generation));
        state.documents.push(record.clone());

        tracing::info!(
            document = %record.filename,
            chunks = chunks_created,
            total_passages = total,
            "document indexed"
        );

        Ok(IngestResult {
            document_id,
            filename: record.filename,
            chunks_created,
        })
    }

    /// Retrieve the `k` closest passages (`default_k` when `None`).
    pub async fn query(
        &self,
        text: &str,
        k: Option<usize>,
    ) -> Result<RetrievalResult, RetrievalError> {
        let k = k.unwrap_or(self.default_k);
        if k == 0 {
            return Err(RetrievalError::InvalidQuery(
                "k must be at least 1".to_string(),
            ));
        }
        if is_blank(text) {
            return Err(RetrievalError::InvalidQuery(
                "query must not be empty".to_string(),
            ));
        }

        let generation = self
            .state
            .read()
            .await
            .index
            .generation()
            .ok_or(RetrievalError::NoIndex)?;

        let vector = self.provider.embed_one(text).await?;
        if vector.len() != generation.dimension() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: generation.dimension(),
                actual: vector.len(),
            }
            .into());
        }

        let hits = generation.search(&vector, k)?;
        tracing::debug!(k, hits = hits.len(), generation = generation.number(), "query served");
        Ok(assemble(&hits, self.preview_chars))
    }

    /// Drop the index and every document record.
    pub async fn clear(&self) -> usize {
        let _write = self.write_lock.lock().await;
        let mut state = self.state.write().await;
        let removed = state.documents.len();
        state.index.clear();
        state.documents.clear();
        tracing::info!(documents = removed, "index cleared");
        removed
    }

    pub async fn documents(&self) -> DocumentList {
        let state = self.state.read().await;
        DocumentList::new(state.documents.records().to_vec())
    }

    pub async fn status(&self) -> IndexStatus {
        let state = self.state.read().await;
        let generation = state.index.generation();
        IndexStatus {
            provider: self.provider.name().to_string(),
            dimension: self.dimension(),
            vector_store: if generation.is_some() { "ready" } else { "empty" }.to_string(),
            generation: generation.as_ref().map_or(0, |g| g.number()),
            documents: state.documents.len(),
            passages: state.index.len(),
        }
    }
}

/// Context string and provenance for ranked hits.
pub fn assemble(hits: &[SearchHit], preview_chars: usize) -> RetrievalResult {
    let context = hits
        .iter()
        .map(|hit| format!("[Source: {}]\n{}", hit.passage.source(), hit.passage.text))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    let sources = hits
        .iter()
        .map(|hit| SourceRef {
            source: hit.passage.source().to_string(),
            chunk_id: hit.passage.chunk_index,
            similarity_score: hit.distance,
            preview: preview(&hit.passage.text, preview_chars),
        })
        .collect();

    RetrievalResult { context, sources }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::embedding::mock::MockProvider;

    const AI_DOC: &str = "Artificial intelligence is a field of computer science.";

    fn orchestrator(provider: Arc<MockProvider>, chunk_size: usize, overlap: usize) -> RetrievalOrchestrator {
        RetrievalOrchestrator::new(
            provider,
            &ChunkingConfig {
                chunk_size,
                overlap,
            },
            &RetrievalConfig::default(),
        )
    }

    fn metadata(source: &str) -> DocumentMetadata {
        DocumentMetadata::new(source, ".txt", 100)
    }

    #[tokio::test]
    async fn test_single_short_document() {
        let engine = orchestrator(MockProvider::shared(64), 1000, 200);

        let result = engine.ingest(AI_DOC, metadata("ai.txt")).await.unwrap();
        assert_eq!(result.chunks_created, 1);
        assert_eq!(result.filename, "ai.txt");

        let retrieved = engine.query("What is AI?", Some(1)).await.unwrap();
        assert_eq!(retrieved.sources.len(), 1);
        assert_eq!(retrieved.sources[0].source, "ai.txt");
        assert_eq!(retrieved.sources[0].chunk_id, 0);
        assert!(retrieved.sources[0].preview.contains("Artificial intelligence"));
        assert_eq!(retrieved.context, format!("[Source: ai.txt]\n{}", AI_DOC));
    }

    #[tokio::test]
    async fn test_long_document_chunked() {
        let engine = orchestrator(MockProvider::shared(64), 500, 100);
        let sentence = "Neural networks approximate functions from examples. ";
        let text = sentence.repeat(5000 / sentence.len() + 1)[..5000].to_string();

        let result = engine.ingest(&text, metadata("nn.txt")).await.unwrap();
        assert!(result.chunks_created > 1);

        let status = engine.status().await;
        assert_eq!(status.passages, result.chunks_created);
        assert_eq!(status.documents, 1);
        assert!(status.is_ready());

        let retrieved = engine.query("neural networks", Some(100)).await.unwrap();
        assert_eq!(retrieved.sources.len(), result.chunks_created);
        for source in &retrieved.sources {
            assert!(source.preview.chars().count() <= 203);
        }
        for pair in retrieved.sources.windows(2) {
            assert!(pair[0].similarity_score <= pair[1].similarity_score);
        }
    }

    #[tokio::test]
    async fn test_clear_then_query_fails() {
        let engine = orchestrator(MockProvider::shared(64), 1000, 200);
        engine.ingest(AI_DOC, metadata("ai.txt")).await.unwrap();

        assert_eq!(engine.clear().await, 1);
        assert!(matches!(
            engine.query("What is AI?", Some(1)).await,
            Err(RetrievalError::NoIndex)
        ));
        assert_eq!(engine.documents().await.total_documents, 0);
        assert_eq!(engine.status().await.vector_store, "empty");
    }

    #[tokio::test]
    async fn test_query_before_ingest() {
        let engine = orchestrator(MockProvider::shared(64), 1000, 200);
        let err = engine.query("anything", None).await.unwrap_err();
        assert_eq!(err.kind(), "no_index");
    }

    #[tokio::test]
    async fn test_earlier_documents_stay_searchable() {
        let provider = MockProvider::shared(256);
        let engine = orchestrator(provider.clone(), 1000, 200);

        engine
            .ingest("Cats purr and chase mice around the house.", metadata("cats.txt"))
            .await
            .unwrap();
        engine
            .ingest(
                "Quantum physics studies particles and wave functions.",
                metadata("quantum.txt"),
            )
            .await
            .unwrap();

        let cats = engine.query("cats chase mice", Some(1)).await.unwrap();
        assert_eq!(cats.sources[0].source, "cats.txt");

        let physics = engine.query("quantum particles", Some(1)).await.unwrap();
        assert_eq!(physics.sources[0].source, "quantum.txt");

        let both = engine.query("house", Some(10)).await.unwrap();
        assert_eq!(both.sources.len(), 2);

        // Two documents plus three queries; nothing was re-embedded.
        assert_eq!(provider.embedded(), 5);
        assert_eq!(engine.documents().await.total_documents, 2);
    }

    #[tokio::test]
    async fn test_failed_ingest_changes_nothing() {
        let provider = MockProvider::shared(64);
        let engine = orchestrator(provider.clone(), 1000, 200);
        engine.ingest(AI_DOC, metadata("ai.txt")).await.unwrap();

        provider.set_failing(true);
        let err = engine
            .ingest("Another document entirely.", metadata("b.txt"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "provider_unavailable");

        provider.set_failing(false);
        let status = engine.status().await;
        assert_eq!(status.documents, 1);
        assert_eq!(status.passages, 1);
        assert_eq!(status.generation, 1);
        assert!(engine.query("intelligence", Some(3)).await.is_ok());
    }

    #[tokio::test]
    async fn test_blank_document_rejected() {
        let engine = orchestrator(MockProvider::shared(64), 1000, 200);
        assert!(matches!(
            engine.ingest("  \n\t ", metadata("blank.txt")).await,
            Err(RetrievalError::EmptyDocument)
        ));
        assert_eq!(engine.documents().await.total_documents, 0);
    }

    #[tokio::test]
    async fn test_k_validation_and_clamping() {
        let engine = orchestrator(MockProvider::shared(64), 1000, 200);
        engine.ingest(AI_DOC, metadata("ai.txt")).await.unwrap();

        assert!(matches!(
            engine.query("AI", Some(0)).await,
            Err(RetrievalError::InvalidQuery(_))
        ));
        assert!(matches!(
            engine.query("   ", Some(1)).await,
            Err(RetrievalError::InvalidQuery(_))
        ));
        assert_eq!(engine.query("AI", Some(50)).await.unwrap().sources.len(), 1);
        assert_eq!(engine.query("AI", None).await.unwrap().sources.len(), 1);
    }

    #[tokio::test]
    async fn test_context_joins_passages_with_separator() {
        let engine = orchestrator(MockProvider::shared(64), 1000, 200);
        engine.ingest("Alpha text here.", metadata("a.txt")).await.unwrap();
        engine.ingest("Beta text here.", metadata("b.txt")).await.unwrap();

        let result = engine.query("text", Some(2)).await.unwrap();
        assert_eq!(result.context.matches(CONTEXT_SEPARATOR).count(), 1);
        assert!(result.context.contains("[Source: a.txt]\nAlpha text here."));
        assert!(result.context.contains("[Source: b.txt]\nBeta text here."));
    }

    #[tokio::test]
    async fn test_concurrent_queries() {
        let engine = Arc::new(orchestrator(MockProvider::shared(64), 1000, 200));
        engine.ingest(AI_DOC, metadata("ai.txt")).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.query(&format!("question {}", i), Some(1)).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().sources.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_ingest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, AI_DOC).unwrap();

        let engine = orchestrator(MockProvider::shared(64), 1000, 200);
        let result = engine.ingest_file(&path).await.unwrap();
        assert_eq!(result.filename, "notes.txt");

        let listed = engine.documents().await;
        assert_eq!(listed.documents[0].metadata.file_type, ".txt");
        assert_eq!(listed.documents[0].content_length, AI_DOC.len());

        let unsupported = dir.path().join("image.png");
        std::fs::write(&unsupported, [0u8; 4]).unwrap();
        let err = engine.ingest_file(&unsupported).await.unwrap_err();
        assert_eq!(err.kind(), "unsupported_format");
    }

    #[test]
    fn test_preview_bounded() {
        let passage = Passage::new("d", "x".repeat(300), 0, 1, metadata("long.txt"));
        let hits = vec![SearchHit {
            id: 0,
            passage,
            distance: 0.25,
        }];
        let result = assemble(&hits, 200);
        assert_eq!(result.sources[0].preview.chars().count(), 203);
        assert!(result.sources[0].preview.ends_with("..."));
        assert_eq!(result.sources[0].similarity_score, 0.25);
    }
}
