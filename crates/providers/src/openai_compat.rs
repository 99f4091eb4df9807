//! HTTP transport for any OpenAI-chat-completions-compatible backend.
//! Transport + normalization only — no policy, no redaction, no retries;
//! that belongs to the gate and the fallback chain respectively.

use crate::chain::Provider;
use crate::llm::{ChatMessage, LlmReply, LlmRequest, Usage};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

pub struct OpenAICompatProvider {
    client: Client,
    name: String,
    base_url: String,
    api_key: Option<String>,
    priority: i32,
}

impl OpenAICompatProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: Option<String>, priority: i32) -> Self {
        Self { client: Client::new(), name: name.into(), base_url: base_url.into(), api_key, priority }
    }
}

#[derive(Debug, Serialize)]
struct OpenAICompatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u64,
    temperature: f64,
}

#[async_trait]
impl Provider<LlmRequest, LlmReply> for OpenAICompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/v1/models", self.base_url.trim_end_matches('/'));
        self.client.get(url).send().await.map(|r| r.status().is_success()).unwrap_or(false)
    }

    async fn execute(&self, req: &LlmRequest) -> Result<LlmReply, String> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = OpenAICompatRequest {
            model: &req.model,
            messages: &req.messages,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
        };

        let mut builder = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                builder = builder.bearer_auth(key);
            }
        }

        let resp = builder.send().await.map_err(|e| e.to_string())?;
        let raw: Value = resp.json().await.map_err(|e| e.to_string())?;

        let content = raw
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c0| c0.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing choices[0].message.content".to_string())?
            .to_string();

        let tokens_used = raw.get("usage").and_then(|u| u.get("total_tokens")).and_then(|v| v.as_u64());

        Ok(LlmReply { content, usage: Usage { tokens_used } })
    }
}
