use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::borrow::Cow;
use tokio_util::sync::CancellationToken;

use super::sse_parser::sse_to_text_stream;
use super::{BackendRequest, LlmBackend};
use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Cow<'a, str>,
}

/// Streaming chat-completions client for any OpenAI-compatible endpoint
/// (Ollama, LM Studio, vLLM, hosted APIs).
pub struct OpenAiCompatibleBackend {
    client: Client,
    provider: String,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        provider: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            provider: provider.into(),
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}/v1/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    async fn stream_completion(&self, request: &BackendRequest) -> Result<String> {
        let url = self.url();

        let chat_request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: Cow::Borrowed(&request.system_prompt),
                },
                Message {
                    role: "user",
                    content: Cow::Borrowed(&request.text),
                },
            ],
            stream: true,
        };

        let mut http_request = self.client.post(&url).json(&chat_request);
        if let Some(api_key) = &self.api_key {
            http_request = http_request.bearer_auth(api_key);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| Error::Backend(format!("failed to connect to {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Backend(format!(
                "request to {url} failed with status {status}: {body}"
            )));
        }

        let mut stream = std::pin::pin!(sse_to_text_stream(response.bytes_stream()));
        let mut output = String::new();
        while let Some(chunk) = stream.next().await {
            output.push_str(&chunk?);
        }
        Ok(output)
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    async fn complete(
        &self,
        cancel: &CancellationToken,
        request: &BackendRequest,
    ) -> Result<String> {
        tracing::debug!(
            provider = %self.provider,
            model = %self.model,
            chars = request.text.chars().count(),
            "sending completion request"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = self.stream_completion(request) => result,
        }
    }

    fn provider(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }
}
