use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::search::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_REMOTE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_REMOTE_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_REMOTE_DIMENSION: u32 = 1536;
pub const DEFAULT_LOCAL_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_LOCAL_DIMENSION: u32 = 384;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_PREVIEW_CHARS: usize = 200;
pub const DEFAULT_METRICS_RETENTION_DAYS: u32 = 7;
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub answer: AnswerConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("docqa"))
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }

    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|p| p.join("docqa"))
    }

    pub fn models_dir() -> Option<PathBuf> {
        Self::data_dir().map(|p| p.join("models"))
    }

    pub fn metrics_db_path() -> Option<PathBuf> {
        Self::data_dir().map(|p| p.join("metrics.db"))
    }

    pub fn runtime_dir() -> PathBuf {
        dirs::runtime_dir()
            .or_else(Self::data_dir)
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.daemon
            .socket_path
            .clone()
            .unwrap_or_else(|| Self::runtime_dir().join("docqa.sock"))
    }

    pub fn pid_path(&self) -> PathBuf {
        self.socket_path().with_extension("pid")
    }

    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            return Self::load_from(&path);
        }
        Ok(Self::default())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Reject settings the engine cannot make progress with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.default_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.default_k must be at least 1".to_string(),
            ));
        }
        if self.embedding.remote.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.remote.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which embedding backend the service binds at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Remote when a credential is configured, local otherwise.
    #[default]
    Auto,
    Remote,
    Local,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Auto => write!(f, "auto"),
            ProviderKind::Remote => write!(f, "remote"),
            ProviderKind::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    #[serde(default)]
    pub remote: RemoteEmbeddingConfig,

    #[serde(default)]
    pub local: LocalEmbeddingConfig,

    /// Try the local model once when the remote provider fails.
    #[serde(default)]
    pub fallback_to_local: bool,
}

impl EmbeddingConfig {
    /// Remote credential from the config file or the environment.
    pub fn api_key(&self) -> Option<String> {
        self.remote
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }

    /// Resolve `auto` against the presence of a credential.
    pub fn resolved_provider(&self) -> ProviderKind {
        match self.provider {
            ProviderKind::Auto if self.api_key().is_some() => ProviderKind::Remote,
            ProviderKind::Auto => ProviderKind::Local,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEmbeddingConfig {
    #[serde(default = "default_remote_url")]
    pub url: String,

    #[serde(default = "default_remote_model")]
    pub model: String,

    #[serde(default = "default_remote_dimension")]
    pub dimension: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api_key: Option<String>,
}

fn default_remote_url() -> String {
    DEFAULT_REMOTE_URL.to_string()
}

fn default_remote_model() -> String {
    DEFAULT_REMOTE_MODEL.to_string()
}

fn default_remote_dimension() -> u32 {
    DEFAULT_REMOTE_DIMENSION
}

fn default_timeout() -> u64 {
    60
}

fn default_batch_size() -> u32 {
    64
}

fn default_max_retries() -> u32 {
    3
}

impl Default for RemoteEmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_remote_url(),
            model: default_remote_model(),
            dimension: default_remote_dimension(),
            timeout_secs: default_timeout(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            api_key: None,
        }
    }
}

/// How token states are reduced to one sentence vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pooling {
    #[default]
    Mean,
    LastToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalEmbeddingConfig {
    #[serde(default = "default_local_model")]
    pub model_id: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub model_path: Option<PathBuf>,

    #[serde(default = "default_local_dimension")]
    pub dimension: u32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub pooling: Pooling,

    /// Keep only the first `dimension` features when the model emits more.
    /// Only meaningful for Matryoshka-trained models.
    #[serde(default)]
    pub truncate_dimension: bool,
}

impl LocalEmbeddingConfig {
    /// Directory holding `model.onnx` and `tokenizer.json`.
    pub fn model_dir(&self) -> Option<PathBuf> {
        self.model_path.clone().or_else(|| {
            Config::models_dir().map(|dir| dir.join(self.model_id.replace('/', "--")))
        })
    }
}

fn default_local_model() -> String {
    DEFAULT_LOCAL_MODEL.to_string()
}

fn default_local_dimension() -> u32 {
    DEFAULT_LOCAL_DIMENSION
}

fn default_max_tokens() -> u32 {
    256
}

impl Default for LocalEmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: default_local_model(),
            model_path: None,
            dimension: default_local_dimension(),
            max_tokens: default_max_tokens(),
            pooling: Pooling::default(),
            truncate_dimension: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_k: usize,

    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_preview_chars() -> usize {
    DEFAULT_PREVIEW_CHARS
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_top_k(),
            preview_chars: default_preview_chars(),
            max_file_size: default_max_file_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerProvider {
    #[default]
    Stub,
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerConfig {
    #[serde(default)]
    pub provider: AnswerProvider,

    #[serde(default = "default_answer_model")]
    pub model: String,

    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    #[serde(default = "default_answer_max_tokens")]
    pub max_tokens: u32,
}

fn default_answer_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_context_chars() -> usize {
    1000
}

fn default_answer_max_tokens() -> u32 {
    256
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            provider: AnswerProvider::default(),
            model: default_answer_model(),
            max_context_chars: default_max_context_chars(),
            max_tokens: default_answer_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub socket_path: Option<PathBuf>,

    /// Seconds without requests before the daemon exits; 0 keeps it running.
    #[serde(default)]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub auto_start: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            idle_timeout_secs: 0,
            auto_start: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_retention_days() -> u32 {
    DEFAULT_METRICS_RETENTION_DAYS
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub default_format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embedding.remote.url, DEFAULT_REMOTE_URL);
        assert_eq!(config.embedding.local.dimension, 384);
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.retrieval.default_k, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.is_some());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [chunking]
            chunk_size = 500

            [embedding]
            provider = "local"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, DEFAULT_CHUNK_OVERLAP);
        assert_eq!(config.embedding.provider, ProviderKind::Local);
        assert_eq!(config.embedding.resolved_provider(), ProviderKind::Local);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut config = Config::default();
        config.chunking.overlap = config.chunking.chunk_size;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_explicit_api_key_selects_remote() {
        let mut config = EmbeddingConfig::default();
        config.remote.api_key = Some("sk-test".to_string());
        assert_eq!(config.resolved_provider(), ProviderKind::Remote);
    }

    #[test]
    fn test_pid_path_next_to_socket() {
        let mut config = Config::default();
        config.daemon.socket_path = Some(PathBuf::from("/tmp/docqa-test.sock"));
        assert_eq!(config.pid_path(), PathBuf::from("/tmp/docqa-test.pid"));
    }
}
