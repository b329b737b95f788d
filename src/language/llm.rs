use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{LanguageDetector, parse_language};
use crate::error::{Error, Result};
use crate::translator::{BackendRequest, DETECTION_PROMPT, LlmBackend};

const SAMPLE_CHARS: usize = 500;

/// Asks an LLM backend to name the language of a sample.
pub struct LlmLanguageDetector {
    backend: Arc<dyn LlmBackend>,
}

impl LlmLanguageDetector {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

/// Reduces a model reply such as `"RU."` or `" sr\n"` to a supported code.
fn normalize_reply(reply: &str) -> Option<&'static str> {
    let cleaned: String = reply
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase();

    parse_language(&cleaned).or_else(|| {
        let prefix: String = cleaned.chars().take(2).collect();
        parse_language(&prefix)
    })
}

#[async_trait]
impl LanguageDetector for LlmLanguageDetector {
    async fn detect_language(&self, cancel: &CancellationToken, sample: &str) -> Result<String> {
        let request = BackendRequest {
            system_prompt: DETECTION_PROMPT.to_string(),
            text: crate::document::sample(sample, SAMPLE_CHARS).to_string(),
        };

        let reply = self.backend.complete(cancel, &request).await?;
        match normalize_reply(&reply) {
            Some(code) => Ok(code.to_string()),
            None => Err(Error::LanguageDetection(format!(
                "model returned an unrecognized language code: '{}'",
                reply.trim()
            ))),
        }
    }
}
