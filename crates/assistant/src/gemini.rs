use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;

use broadcast_core::config::AssistantConfig;

use crate::generator::{TextGenerator, UnavailableGenerator};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini `generateContent` over HTTPS with an API key.
pub struct GeminiGenerator {
    api_key: String,
    model: String,
    client: Client,
}

impl GeminiGenerator {
    pub fn new(api_key: &str, model: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            api_key: api_key.trim().to_string(),
            model: model.into(),
            client,
        })
    }

    /// Picks the Gemini client when a key is configured, otherwise a
    /// generator that always fails over to the fallback text.
    pub fn from_config(config: &AssistantConfig) -> anyhow::Result<Arc<dyn TextGenerator>> {
        match config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(Arc::new(Self::new(
                key,
                config.model.clone(),
                Duration::from_millis(config.timeout_ms),
            )?)),
            _ => Ok(Arc::new(UnavailableGenerator)),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent", API_BASE, self.model)
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });

        let resp = self
            .client
            .post(self.url())
            .header("content-type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("generation API returned {}: {}", status.as_u16(), text);
        }

        let json: serde_json::Value = resp.json().await?;
        extract_text(&json)
    }
}

fn extract_text(json: &serde_json::Value) -> anyhow::Result<String> {
    json["candidates"]
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|c| c["content"]["parts"].as_array())
        .and_then(|parts| parts.first())
        .and_then(|p| p["text"].as_str())
        .map(|s| s.trim().to_string())
        .context("response has no candidate text")
}
