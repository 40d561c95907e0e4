use std::time::Duration;

use async_trait::async_trait;

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Returns a fixed reply, optionally after a delay.
#[derive(Debug, Clone)]
pub struct StaticGenerator {
    reply: String,
    latency: Duration,
}

impl StaticGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl TextGenerator for StaticGenerator {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.reply.clone())
    }
}

/// Used when no API key is configured. Always fails.
#[derive(Debug, Clone, Default)]
pub struct UnavailableGenerator;

#[async_trait]
impl TextGenerator for UnavailableGenerator {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        anyhow::bail!("no text generation API key configured")
    }
}
