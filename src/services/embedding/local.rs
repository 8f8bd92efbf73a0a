//! In-process embedding with a bundled ONNX sentence model.

use std::borrow::Cow;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ort::session::{Session, SessionInputValue, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tokenizers::{PaddingParams, PaddingStrategy, TruncationParams, TruncationStrategy};

use super::{EmbeddingProvider, check_dimensions};
use crate::error::{EmbeddingError, ModelError};
use crate::models::{LocalEmbeddingConfig, Pooling};

/// Tokenizer plus ONNX session for one sentence-embedding model.
pub struct OnnxModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimension: usize,
    pooling: Pooling,
    truncate_dimension: bool,
    wants_token_type_ids: bool,
    wants_position_ids: bool,
}

impl OnnxModel {
    pub fn load(config: &LocalEmbeddingConfig, model_dir: &Path) -> Result<Self, ModelError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(ModelError::NotFound(format!(
                "model not found: {}",
                model_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?
            .with_intra_threads(num_cpus())
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?;

        let has_input = |name: &str| session.inputs.iter().any(|input| input.name == name);
        let wants_token_type_ids = has_input("token_type_ids");
        let wants_position_ids = has_input("position_ids");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ModelError::TokenizerError(e.to_string()))?;

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_tokens as usize,
                strategy: TruncationStrategy::LongestFirst,
                ..Default::default()
            }))
            .map_err(|e| ModelError::TokenizerError(e.to_string()))?;

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimension: config.dimension as usize,
            pooling: config.pooling,
            truncate_dimension: config.truncate_dimension,
            wants_token_type_ids,
            wants_position_ids,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed a batch synchronously. Output order matches input order.
    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| ModelError::TokenizerError(e.to_string()))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);
        let batch_size = encodings.len();

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];
        let mut position_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let type_ids = encoding.get_type_ids();
            for j in 0..ids.len() {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
                token_type_ids[i * max_len + j] = type_ids.get(j).copied().unwrap_or(0) as i64;
                position_ids[i * max_len + j] = j as i64;
            }
        }

        let mask_for_pooling = attention_mask.clone();
        let shape = [batch_size, max_len];

        let mut inputs: Vec<(Cow<'_, str>, SessionInputValue<'_>)> = vec![
            ("input_ids".into(), tensor(shape, input_ids)?.into()),
            ("attention_mask".into(), tensor(shape, attention_mask)?.into()),
        ];
        if self.wants_token_type_ids {
            inputs.push(("token_type_ids".into(), tensor(shape, token_type_ids)?.into()));
        }
        if self.wants_position_ids {
            inputs.push(("position_ids".into(), tensor(shape, position_ids)?.into()));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::InferenceError("session lock poisoned".to_string()))?;

        let outputs = session
            .run(inputs)
            .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;

        let output_array = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;

        let out_shape = output_array.shape().to_vec();
        let hidden = out_shape.last().copied().unwrap_or(0);
        check_hidden_size(hidden, self.dimension, self.truncate_dimension)?;

        let embeddings: Vec<Vec<f32>> = match out_shape.len() {
            3 => (0..batch_size)
                .map(|i| {
                    let mask = &mask_for_pooling[i * max_len..(i + 1) * max_len];
                    let pooled = pool(self.pooling, mask, self.dimension, |j, d| {
                        output_array[[i, j, d]]
                    });
                    normalize(&pooled)
                })
                .collect(),
            2 => (0..batch_size)
                .map(|i| {
                    let embedding: Vec<f32> =
                        (0..self.dimension).map(|d| output_array[[i, d]]).collect();
                    normalize(&embedding)
                })
                .collect(),
            _ => {
                return Err(ModelError::InferenceError(format!(
                    "unexpected output shape: {:?}",
                    out_shape
                )));
            }
        };

        Ok(embeddings)
    }
}

fn check_hidden_size(hidden: usize, dimension: usize, truncate: bool) -> Result<(), ModelError> {
    if hidden == dimension || (truncate && hidden > dimension) {
        return Ok(());
    }
    Err(ModelError::InferenceError(format!(
        "model produces {} features, configured dimension is {}",
        hidden, dimension
    )))
}

/// Reduce one sequence of token states to a single vector.
/// `state(j, d)` is feature `d` of token `j`; padded positions have mask 0.
fn pool(
    pooling: Pooling,
    mask: &[i64],
    dimension: usize,
    state: impl Fn(usize, usize) -> f32,
) -> Vec<f32> {
    match pooling {
        Pooling::Mean => {
            let mut sum = vec![0.0f32; dimension];
            let mut count = 0.0f32;
            for (j, _) in mask.iter().enumerate().filter(|(_, m)| **m != 0) {
                count += 1.0;
                for (d, slot) in sum.iter_mut().enumerate() {
                    *slot += state(j, d);
                }
            }
            let count = count.max(1.0);
            sum.into_iter().map(|v| v / count).collect()
        }
        Pooling::LastToken => {
            let last = last_token_index(mask);
            (0..dimension).map(|d| state(last, d)).collect()
        }
    }
}

/// Position of the last unpadded token.
fn last_token_index(mask: &[i64]) -> usize {
    mask.iter().rposition(|&m| m != 0).unwrap_or(0)
}

fn tensor(shape: [usize; 2], data: Vec<i64>) -> Result<Tensor<i64>, ModelError> {
    Tensor::from_array((shape, data))
        .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Embedding provider backed by an [`OnnxModel`]; inference runs on the blocking pool.
pub struct LocalProvider {
    model: Arc<OnnxModel>,
    name: String,
}

impl LocalProvider {
    pub fn load(config: &LocalEmbeddingConfig) -> Result<Self, ModelError> {
        let model_dir = config.model_dir().ok_or_else(|| {
            ModelError::NotFound("could not determine models directory".to_string())
        })?;

        tracing::info!(model = %config.model_id, dir = %model_dir.display(), "loading local embedding model");
        let model = OnnxModel::load(config, &model_dir)?;
        tracing::info!(dimension = model.dimension(), "local embedding model loaded");

        Ok(Self {
            model: Arc::new(model),
            name: format!("local:{}", config.model_id),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.model.dimension()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        let expected = texts.len();
        let vectors = tokio::task::spawn_blocking(move || model.embed(&texts))
            .await
            .map_err(|e| EmbeddingError::ProviderUnavailable(format!("inference task failed: {}", e)))??;

        check_dimensions(&vectors, expected, self.dimension())?;
        Ok(vectors)
    }
}
