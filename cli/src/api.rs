use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model service responded with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("model service returned an empty response")]
    EmptyResponse,
}

/// Text in, text out. The pipeline only ever sees the returned string.
#[async_trait]
pub trait TextModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str, model: &str) -> Result<String, ModelError>;
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: Url,
    responses_url: Url,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let raw = base_url.unwrap_or(DEFAULT_API_BASE);
        // Url::join replaces the last path segment unless the base ends in '/'.
        let normalized = format!("{}/", raw.trim().trim_end_matches('/'));
        let base_url = Url::parse(&normalized).context("invalid model API base URL")?;
        let responses_url =
            base_url.join("responses").context("failed to build responses endpoint URL")?;
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        let api_key = api_key.filter(|key| !key.trim().is_empty());
        Ok(Self { http, base_url, responses_url, api_key })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl TextModel for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, prompt: &str, model: &str) -> Result<String, ModelError> {
        let api_key = self.api_key.as_deref().ok_or(ModelError::MissingApiKey)?;
        debug!(url = %self.responses_url, model, prompt_chars = prompt.len(), "sending model request");

        let response = self
            .http
            .post(self.responses_url.clone())
            .bearer_auth(api_key)
            .json(&json!({ "model": model, "input": prompt }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ModelError::Status { status, body });
        }

        let text = match serde_json::from_str::<Value>(&body) {
            Ok(parsed) => extract_output_text(&parsed).unwrap_or(body),
            Err(_) => body,
        };
        if text.trim().is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(text)
    }
}

pub fn extract_output_text(response: &Value) -> Option<String> {
    if let Some(text) = response.get("output_text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            return Some(text.to_string());
        }
    }

    let parts: Vec<&str> = response
        .get("output")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|item| item.get("type").and_then(Value::as_str).unwrap_or("message") == "message")
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|chunk| {
            matches!(chunk.get("type").and_then(Value::as_str), Some("output_text" | "text"))
        })
        .filter_map(|chunk| chunk.get("text").and_then(Value::as_str))
        .filter(|text| !text.trim().is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}
