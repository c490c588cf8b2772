//! `TextGenerationPort` over an OpenAI-compatible chat completions endpoint
//! (vLLM, llama.cpp server, SGLang, the OpenAI API itself).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dialectic::{GenerationError, GenerationProfile, TextGenerationPort};
use reqwest::StatusCode;
use tracing::debug;

use crate::config::EndpointConfig;

/// One HTTP call per `generate`. Retry is left to `RetryingPort`.
pub struct OpenAiCompatPort {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiCompatPort {
    pub fn new(endpoint: &EndpointConfig) -> Result<Self> {
        Self::with_timeout(endpoint, Duration::from_secs(endpoint.timeout_secs))
    }

    pub fn with_timeout(endpoint: &EndpointConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
            model: endpoint.model.clone(),
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(&self, prompt: &str, profile: &GenerationProfile) -> serde_json::Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(preamble) = &profile.system_preamble {
            messages.push(serde_json::json!({"role": "system", "content": preamble}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": profile.max_tokens,
            "temperature": profile.temperature,
        })
    }

    fn map_transport_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.timeout)
        } else {
            GenerationError::Backend(e.to_string())
        }
    }
}

fn parse_content(body: &serde_json::Value) -> Result<String, GenerationError> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            GenerationError::Backend("response has no choices[0].message.content".to_string())
        })
}

#[async_trait]
impl TextGenerationPort for OpenAiCompatPort {
    async fn generate(
        &self,
        prompt: &str,
        profile: &GenerationProfile,
    ) -> Result<String, GenerationError> {
        let start = std::time::Instant::now();
        let response = self
            .client
            .post(self.chat_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(prompt, profile))
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                GenerationError::RateLimited(body)
            } else {
                GenerationError::Backend(format!("HTTP {status}: {body}"))
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        let content = parse_content(&body)?;
        debug!(
            model = %self.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            chars = content.len(),
            "completion received"
        );
        Ok(content)
    }
}

/// Check if an endpoint is reachable by requesting `{url}/models`.
pub async fn check_endpoint(url: &str) -> bool {
    let models_url = format!("{}/models", url.trim_end_matches('/'));
    match reqwest::Client::new()
        .get(&models_url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
    {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}
