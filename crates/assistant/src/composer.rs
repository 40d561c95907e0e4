use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::generator::TextGenerator;

pub const FALLBACK_MESSAGE: &str = "Failed to generate message. Please try again.";

/// Wraps a user prompt in the marketing-copy instruction sent to the model.
pub fn marketing_prompt(prompt: &str) -> String {
    format!(
        "Generate a short, engaging marketing message based on the following prompt. \
         The message should be suitable for WhatsApp. Do not include any greetings like \
         \"Hello\" or signatures. Just provide the message body. Prompt: \"{}\"",
        prompt
    )
}

/// Drafts message text through a [`TextGenerator`], never failing.
#[derive(Clone)]
pub struct MessageComposer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl MessageComposer {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Returns the generated text, or [`FALLBACK_MESSAGE`] on error, timeout
    /// or an empty reply.
    pub async fn compose(&self, prompt: &str) -> String {
        let wrapped = marketing_prompt(prompt);
        match tokio::time::timeout(self.timeout, self.generator.generate(&wrapped)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                info!(chars = text.len(), "Generated message text");
                text.trim().to_string()
            }
            Ok(Ok(_)) => {
                warn!("Generator returned empty text");
                metrics::counter!("assistant.fallbacks").increment(1);
                FALLBACK_MESSAGE.to_string()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Message generation failed");
                metrics::counter!("assistant.fallbacks").increment(1);
                FALLBACK_MESSAGE.to_string()
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Message generation timed out");
                metrics::counter!("assistant.fallbacks").increment(1);
                FALLBACK_MESSAGE.to_string()
            }
        }
    }

    /// Runs [`compose`](Self::compose) on its own task.
    pub fn spawn_compose(&self, prompt: impl Into<String>) -> JoinHandle<String> {
        let composer = self.clone();
        let prompt = prompt.into();
        tokio::spawn(async move { composer.compose(&prompt).await })
    }
}
