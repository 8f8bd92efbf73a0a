//! Error types for the document question answering service.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors related to embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("embedding server error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding model error: {0}")]
    Model(#[from] ModelError),

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ProviderUnavailable(_) | EmbeddingError::Timeout => true,
            EmbeddingError::ServerError(msg) => is_transient_status(msg),
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_)
            | EmbeddingError::DimensionMismatch { .. }
            | EmbeddingError::Model(_) => false,
        }
    }
}

impl EmbeddingError {
    /// Whether a secondary provider may be tried after this failure.
    pub fn allows_fallback(&self) -> bool {
        match self {
            EmbeddingError::DimensionMismatch { .. } => false,
            EmbeddingError::ServerError(msg) => {
                is_transient_status(msg) || matches!(http_status(msg), Some(401 | 403))
            }
            _ => true,
        }
    }
}

/// HTTP status of a `status <code>: <body>` server error message.
fn http_status(msg: &str) -> Option<u16> {
    msg.strip_prefix("status ")?
        .split(|c: char| !c.is_ascii_digit())
        .next()?
        .parse()
        .ok()
}

/// 429 and 5xx; the response body is never inspected.
fn is_transient_status(msg: &str) -> bool {
    matches!(http_status(msg), Some(429 | 500..=599))
}

/// Errors from loading or running the local ONNX model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model not found: {0}")]
    NotFound(String),

    #[error("failed to load model: {0}")]
    LoadError(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error("inference error: {0}")]
    InferenceError(String),
}

/// Errors related to the vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("no passages to index")]
    EmptyInput,

    #[error("index has not been built")]
    IndexNotBuilt,

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors raised while turning uploaded files into text.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type '{extension}'. Supported: {supported}")]
    UnsupportedFormat {
        extension: String,
        supported: String,
    },

    #[error("failed to parse {format}: {message}")]
    Parse { format: String, message: String },

    #[error("file exceeds maximum size: {size} > {max}")]
    TooLarge { size: u64, max: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by ingest and query.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("document appears to be empty")]
    EmptyDocument,

    #[error("no documents uploaded yet. Please upload documents first.")]
    NoIndex,

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl RetrievalError {
    /// Stable machine-readable kind for the request/response boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            RetrievalError::EmptyDocument => "empty_document",
            RetrievalError::NoIndex => "no_index",
            RetrievalError::InvalidQuery(_) => "invalid_query",
            RetrievalError::Embedding(EmbeddingError::DimensionMismatch { .. }) => {
                "dimension_mismatch"
            }
            RetrievalError::Embedding(_) => "provider_unavailable",
            RetrievalError::Index(IndexError::EmptyInput) => "empty_input",
            RetrievalError::Index(IndexError::IndexNotBuilt) => "no_index",
            RetrievalError::Index(IndexError::DimensionMismatch { .. }) => "dimension_mismatch",
            RetrievalError::Extract(ExtractError::UnsupportedFormat { .. }) => {
                "unsupported_format"
            }
            RetrievalError::Extract(ExtractError::TooLarge { .. }) => "file_too_large",
            RetrievalError::Extract(_) => "parse_error",
        }
    }
}

/// Errors from answer synthesis.
#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("answer synthesizer unavailable: {0}")]
    Unavailable(String),

    #[error("answer request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("answer server error: {0}")]
    ServerError(String),

    #[error("invalid answer response: {0}")]
    InvalidResponse(String),
}

impl Retryable for AnswerError {
    fn is_retryable(&self) -> bool {
        match self {
            AnswerError::RequestError(e) => e.is_timeout() || e.is_connect(),
            AnswerError::ServerError(msg) => is_transient_status(msg),
            AnswerError::Unavailable(_) | AnswerError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors talking to the local daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("daemon is not running")]
    NotRunning,

    #[error("failed to spawn daemon: {0}")]
    SpawnError(String),

    #[error("timed out waiting for daemon")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("socket error: {0}")]
    SocketError(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("{kind}: {message}")]
    Remote { kind: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("daemon error: {0}")]
    Daemon(#[from] DaemonError),

    #[error("answer error: {0}")]
    Answer(#[from] AnswerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(RetrievalError::NoIndex.kind(), "no_index");
        assert_eq!(RetrievalError::EmptyDocument.kind(), "empty_document");
        assert_eq!(
            RetrievalError::from(IndexError::EmptyInput).kind(),
            "empty_input"
        );
        assert_eq!(
            RetrievalError::from(EmbeddingError::ProviderUnavailable("down".into())).kind(),
            "provider_unavailable"
        );
        let unsupported = ExtractError::UnsupportedFormat {
            extension: ".exe".into(),
            supported: ".txt".into(),
        };
        assert_eq!(
            RetrievalError::from(unsupported).kind(),
            "unsupported_format"
        );
    }

    #[test]
    fn test_embedding_retryable() {
        assert!(EmbeddingError::Timeout.is_retryable());
        assert!(EmbeddingError::ServerError("status 503".into()).is_retryable());
        assert!(!EmbeddingError::ServerError("status 401".into()).is_retryable());
        assert!(!EmbeddingError::InvalidResponse("bad".into()).is_retryable());
    }

    #[test]
    fn test_client_error_body_is_not_a_status() {
        let err = EmbeddingError::ServerError(
            "status 400: input too long, limit 500 tokens, you requested 15000 tokens".into(),
        );
        assert!(!err.is_retryable());
        assert!(!err.allows_fallback());

        assert!(EmbeddingError::ServerError("status 429: slow down".into()).is_retryable());
        assert!(!EmbeddingError::ServerError("upstream said 503".into()).is_retryable());
        assert!(
            !AnswerError::ServerError("status 404: model gpt-500 not found".into()).is_retryable()
        );
        assert!(AnswerError::ServerError("status 502: bad gateway".into()).is_retryable());
    }

    #[test]
    fn test_fallback_policy() {
        assert!(EmbeddingError::ServerError("status 401: bad key".into()).allows_fallback());
        assert!(!EmbeddingError::ServerError("status 400: bad input".into()).allows_fallback());
        assert!(
            !EmbeddingError::DimensionMismatch {
                expected: 384,
                actual: 1536
            }
            .allows_fallback()
        );
    }
}
