pub mod answer;
pub mod chunker;
pub mod collection;
pub mod embedding;
pub mod metrics;
pub mod retrieval;
pub mod vector_index;

pub use answer::{AnswerSynthesizer, OpenAiSynthesizer, SharedSynthesizer, StubSynthesizer};
pub use chunker::{TextChunker, chunk};
pub use collection::DocumentCollection;
pub use embedding::{EmbeddingProvider, FallbackProvider, SharedProvider, create_provider};
pub use metrics::{MetricsStore, MetricsSummary, RequestKind};
pub use retrieval::{CONTEXT_SEPARATOR, RetrievalOrchestrator};
pub use vector_index::{IndexGeneration, SearchHit, VectorIndex};
