mod config;
mod document;
mod search;

pub use config::{
    API_KEY_ENV, AnswerConfig, AnswerProvider, ChunkingConfig, Config, DEFAULT_CHUNK_OVERLAP,
    DEFAULT_CHUNK_SIZE, DEFAULT_LOCAL_DIMENSION, DEFAULT_LOCAL_MODEL, DEFAULT_PREVIEW_CHARS,
    DEFAULT_REMOTE_DIMENSION, DEFAULT_REMOTE_MODEL, DEFAULT_REMOTE_URL, DEFAULT_TOP_K,
    DaemonConfig, EmbeddingConfig, LocalEmbeddingConfig, MetricsConfig, OutputConfig, Pooling,
    ProviderKind, RemoteEmbeddingConfig, RetrievalConfig,
};
pub use document::{DocumentMetadata, DocumentRecord, Passage};
pub use search::{
    DocumentList, IndexStatus, IngestResult, OutputFormat, QueryResponse, RetrievalResult,
    SourceRef,
};
