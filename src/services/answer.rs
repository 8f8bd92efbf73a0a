//! Answer synthesis from a retrieved context.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::AnswerError;
use crate::models::{AnswerConfig, AnswerProvider, Config};
use crate::utils::retry::retry;
use crate::utils::text::preview;

const NO_CONTEXT_ANSWER: &str = "I don't have enough context to answer this question. Please try uploading relevant documents first.";

/// Produces a natural-language answer for a query from assembled context.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(
        &self,
        query: &str,
        context: &str,
        source_count: usize,
    ) -> Result<String, AnswerError>;
}

pub type SharedSynthesizer = Arc<dyn AnswerSynthesizer>;

/// Synthesize an answer, turning failures into an apology so the query itself still succeeds.
pub async fn answer_or_apology(
    synthesizer: &dyn AnswerSynthesizer,
    query: &str,
    context: &str,
    source_count: usize,
) -> String {
    match synthesizer.synthesize(query, context, source_count).await {
        Ok(answer) => answer,
        Err(e) => {
            tracing::warn!(synthesizer = synthesizer.name(), error = %e, "answer synthesis failed");
            format!(
                "I apologize, but I encountered an error while generating an answer: {}",
                e
            )
        }
    }
}

/// Placeholder answer that only reports what was found.
#[derive(Debug, Clone, Default)]
pub struct StubSynthesizer;

#[async_trait]
impl AnswerSynthesizer for StubSynthesizer {
    fn name(&self) -> &str {
        "stub"
    }

    async fn synthesize(
        &self,
        query: &str,
        context: &str,
        source_count: usize,
    ) -> Result<String, AnswerError> {
        if context.trim().is_empty() {
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }
        Ok(format!(
            "Based on the provided context about '{}', I found {} relevant sections.",
            query, source_count
        ))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Answers through an OpenAI-compatible chat completions endpoint.
pub struct OpenAiSynthesizer {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    max_context_chars: usize,
}

impl OpenAiSynthesizer {
    pub fn new(config: &AnswerConfig, base_url: &str, api_key: &str) -> Result<Self, AnswerError> {
        if api_key.trim().is_empty() {
            return Err(AnswerError::Unavailable(
                "missing API key for answer synthesis".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| AnswerError::Unavailable("invalid API key".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_context_chars: config.max_context_chars,
        })
    }

    fn prompt(&self, query: &str, context: &str) -> String {
        build_prompt(query, context, self.max_context_chars)
    }

    async fn complete(&self, prompt: &str) -> Result<String, AnswerError> {
        let body = ChatRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AnswerError::ServerError(format!(
                "status {}: {}",
                status.as_u16(),
                text
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnswerError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| AnswerError::InvalidResponse("no completion returned".to_string()))
    }
}

#[async_trait]
impl AnswerSynthesizer for OpenAiSynthesizer {
    fn name(&self) -> &str {
        &self.model
    }

    async fn synthesize(
        &self,
        query: &str,
        context: &str,
        _source_count: usize,
    ) -> Result<String, AnswerError> {
        if context.trim().is_empty() {
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        let prompt = self.prompt(query, context);
        let raw = retry(|| self.complete(&prompt)).await?;
        Ok(post_process(&raw))
    }
}

fn build_prompt(query: &str, context: &str, max_context_chars: usize) -> String {
    format!(
        "Answer the question based on the provided context. Be concise and accurate.\n\nContext: {}\n\nQuestion: {}\n\nAnswer:",
        preview(context, max_context_chars),
        query
    )
}

/// Drop echoed prompt text and model artifacts; end with sentence punctuation.
fn post_process(raw: &str) -> String {
    let answer = raw.rsplit("Answer:").next().unwrap_or(raw);
    let mut answer = answer.replace("</s>", "").trim().to_string();
    if !answer.is_empty() && !answer.ends_with(['.', '!', '?']) {
        answer.push('.');
    }
    answer
}

/// Bind the synthesizer selected by `config.answer`.
pub fn create_synthesizer(config: &Config) -> Result<SharedSynthesizer, AnswerError> {
    match config.answer.provider {
        AnswerProvider::Stub => Ok(Arc::new(StubSynthesizer)),
        AnswerProvider::OpenAi => {
            let api_key = config.embedding.api_key().unwrap_or_default();
            let synthesizer =
                OpenAiSynthesizer::new(&config.answer, &config.embedding.remote.url, &api_key)?;
            Ok(Arc::new(synthesizer))
        }
    }
}
