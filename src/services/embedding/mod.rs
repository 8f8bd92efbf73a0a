//! Embedding providers.
//!
//! A provider maps passage and query texts to fixed-dimension vectors. The
//! service binds one provider for its whole lifetime so every vector in the
//! index comes from the same model.

pub mod local;
pub mod remote;

pub use local::{LocalProvider, OnnxModel};
pub use remote::RemoteProvider;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EmbeddingError;
use crate::models::{EmbeddingConfig, ProviderKind};

/// Maps texts to vectors of a fixed dimension.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Human-readable identity, e.g. `remote:text-embedding-3-small`.
    fn name(&self) -> &str;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Embed `texts`, returning one vector per input in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".to_string()))
    }
}

pub type SharedProvider = Arc<dyn EmbeddingProvider>;

/// Verify a provider answered with `expected_count` vectors of `dimension` floats.
pub fn check_dimensions(
    vectors: &[Vec<f32>],
    expected_count: usize,
    dimension: usize,
) -> Result<(), EmbeddingError> {
    if vectors.len() != expected_count {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {} embeddings, got {}",
            expected_count,
            vectors.len()
        )));
    }
    match vectors.iter().find(|v| v.len() != dimension) {
        Some(bad) => Err(EmbeddingError::DimensionMismatch {
            expected: dimension,
            actual: bad.len(),
        }),
        None => Ok(()),
    }
}

/// Primary provider with a one-shot secondary of the same dimension.
pub struct FallbackProvider {
    primary: SharedProvider,
    secondary: SharedProvider,
}

impl FallbackProvider {
    /// Fails when the two providers disagree on dimension; mixing them would
    /// put incomparable vectors in one index.
    pub fn new(primary: SharedProvider, secondary: SharedProvider) -> Result<Self, EmbeddingError> {
        if primary.dimension() != secondary.dimension() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: primary.dimension(),
                actual: secondary.dimension(),
            });
        }
        Ok(Self { primary, secondary })
    }
}

#[async_trait]
impl EmbeddingProvider for FallbackProvider {
    fn name(&self) -> &str {
        self.primary.name()
    }

    fn dimension(&self) -> usize {
        self.primary.dimension()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        match self.primary.embed_batch(texts).await {
            Ok(vectors) => Ok(vectors),
            Err(e) if e.allows_fallback() => {
                tracing::warn!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    error = %e,
                    "primary embedding provider failed, using fallback"
                );
                self.secondary.embed_batch(texts).await
            }
            Err(e) => Err(e),
        }
    }
}

/// Bind the provider selected by `config`.
pub fn create_provider(config: &EmbeddingConfig) -> Result<SharedProvider, EmbeddingError> {
    match config.resolved_provider() {
        ProviderKind::Local | ProviderKind::Auto => {
            let provider = LocalProvider::load(&config.local)?;
            Ok(Arc::new(provider))
        }
        ProviderKind::Remote => {
            let api_key = config.api_key().unwrap_or_default();
            let remote: SharedProvider = Arc::new(RemoteProvider::new(&config.remote, &api_key)?);
            if !config.fallback_to_local {
                return Ok(remote);
            }

            let local: SharedProvider = match LocalProvider::load(&config.local) {
                Ok(local) => Arc::new(local),
                Err(e) => {
                    tracing::warn!(error = %e, "local fallback model unavailable, continuing without it");
                    return Ok(remote);
                }
            };

            let fallback = FallbackProvider::new(remote, local)?;
            Ok(Arc::new(fallback))
        }
    }
}

/// Deterministic providers for tests.
#[cfg(test)]
pub(crate) mod mock {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    /// Hashed bag-of-words vectors, L2-normalized. Texts sharing words land close together.
    pub struct MockProvider {
        name: String,
        dimension: usize,
        embedded: AtomicUsize,
        failing: AtomicBool,
    }

    impl MockProvider {
        pub fn new(dimension: usize) -> Self {
            Self {
                name: format!("mock:{}", dimension),
                dimension,
                embedded: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
            }
        }

        /// Make every following call fail with `ProviderUnavailable`.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn shared(dimension: usize) -> Arc<Self> {
            Arc::new(Self::new(dimension))
        }

        /// Texts embedded so far, across all calls.
        pub fn embedded(&self) -> usize {
            self.embedded.load(Ordering::SeqCst)
        }

        pub fn vector(&self, text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; self.dimension];
            for word in text
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| w.len() > 2)
            {
                let bucket = fnv1a(&word.to_lowercase()) as usize % self.dimension;
                v[bucket] += 1.0;
            }
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                v.iter_mut().for_each(|x| *x /= norm);
            }
            v
        }
    }

    fn fnv1a(s: &str) -> u64 {
        s.bytes().fold(0xcbf29ce484222325, |hash, b| {
            (hash ^ u64::from(b)).wrapping_mul(0x100000001b3)
        })
    }

    #[async_trait]
    impl EmbeddingProvider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(EmbeddingError::ProviderUnavailable("mock outage".to_string()));
            }
            self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|t| self.vector(t)).collect())
        }
    }

    /// Always fails with the given error constructor.
    pub struct FailingProvider {
        dimension: usize,
        error: fn() -> EmbeddingError,
    }

    impl FailingProvider {
        pub fn unavailable(dimension: usize) -> Self {
            Self {
                dimension,
                error: || EmbeddingError::ProviderUnavailable("mock outage".to_string()),
            }
        }

        pub fn rejecting(dimension: usize) -> Self {
            Self {
                dimension,
                error: || EmbeddingError::ServerError("status 400: bad input".to_string()),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn name(&self) -> &str {
            "mock:failing"
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err((self.error)())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{FailingProvider, MockProvider};
    use super::*;

    #[test]
    fn test_check_dimensions() {
        let ok = vec![vec![0.0; 4], vec![1.0; 4]];
        assert!(check_dimensions(&ok, 2, 4).is_ok());
        assert!(matches!(
            check_dimensions(&ok, 3, 4),
            Err(EmbeddingError::InvalidResponse(_))
        ));
        assert!(matches!(
            check_dimensions(&ok, 2, 8),
            Err(EmbeddingError::DimensionMismatch {
                expected: 8,
                actual: 4
            })
        ));
    }

    #[tokio::test]
    async fn test_embed_one_uses_batch() {
        let provider = MockProvider::new(16);
        let v = provider.embed_one("machine learning").await.unwrap();
        assert_eq!(v.len(), 16);
        assert_eq!(provider.embedded(), 1);
    }

    #[test]
    fn test_fallback_requires_equal_dimensions() {
        let primary: SharedProvider = MockProvider::shared(8);
        let secondary: SharedProvider = MockProvider::shared(4);
        assert!(matches!(
            FallbackProvider::new(primary, secondary),
            Err(EmbeddingError::DimensionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_fallback_used_on_outage() {
        let secondary = MockProvider::shared(8);
        let provider = FallbackProvider::new(
            Arc::new(FailingProvider::unavailable(8)),
            secondary.clone(),
        )
        .unwrap();

        let vectors = provider.embed_batch(&["hello world".to_string()]).await.unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(secondary.embedded(), 1);
    }

    #[tokio::test]
    async fn test_fallback_skipped_for_bad_input() {
        let secondary = MockProvider::shared(8);
        let provider = FallbackProvider::new(
            Arc::new(FailingProvider::rejecting(8)),
            secondary.clone(),
        )
        .unwrap();

        assert!(provider.embed_batch(&["x".to_string()]).await.is_err());
        assert_eq!(secondary.embedded(), 0);
    }

    #[test]
    fn test_remote_without_key_is_unavailable() {
        let mut config = EmbeddingConfig {
            provider: ProviderKind::Remote,
            ..Default::default()
        };
        config.remote.api_key = Some(" ".to_string());
        if std::env::var(crate::models::API_KEY_ENV).is_ok() {
            return;
        }
        assert!(matches!(
            create_provider(&config),
            Err(EmbeddingError::ProviderUnavailable(_))
        ));
    }
}
