//! Chat-completions boundary.
//!
//! The [`ChatClient`] trait decouples the orchestrator from the HTTP endpoint.
//! Tests use scripted clients that return predetermined assistant messages
//! and record every request.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};
use tracing::{debug, instrument, trace};

use crate::core::conversation::{ChatMessage, Conversation};
use crate::io::config::ModelConfig;

/// How the model may use the offered tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    Auto,
    /// The model must call the named function.
    Function(String),
}

impl Serialize for ToolChoice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ToolChoice::Auto => serializer.serialize_str("auto"),
            ToolChoice::Function(name) => json!({
                "type": "function",
                "function": { "name": name }
            })
            .serialize(serializer),
        }
    }
}

/// One chat-completions request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Conversation,
    pub temperature: f32,
    /// Tool definitions in wire format. Omitted when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

impl ChatRequest {
    /// Plain turn: no tools offered.
    pub fn plain(cfg: &ModelConfig, messages: &Conversation) -> Self {
        Self {
            model: cfg.model.clone(),
            messages: messages.clone(),
            temperature: cfg.temperature,
            tools: Vec::new(),
            tool_choice: None,
        }
    }

    /// Turn offering `tools`; forced to `force` when given, otherwise auto.
    pub fn with_tools(
        cfg: &ModelConfig,
        messages: &Conversation,
        tools: Vec<Value>,
        force: Option<&str>,
    ) -> Self {
        let tool_choice = match force {
            Some(name) => ToolChoice::Function(name.to_string()),
            None => ToolChoice::Auto,
        };
        Self {
            tools,
            tool_choice: Some(tool_choice),
            ..Self::plain(cfg, messages)
        }
    }

    pub fn offers_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}

/// Abstraction over chat endpoints.
pub trait ChatClient {
    /// Send `request` and return the first choice's assistant message.
    fn complete(&self, request: &ChatRequest) -> Result<ChatMessage>;
}

/// OpenAI-compatible endpoint over HTTPS with bearer auth.
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpChatClient {
    pub fn new(cfg: &ModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .context("build chat http client")?;
        Ok(Self {
            client,
            api_url: cfg.api_url.clone(),
            api_key: cfg.api_key.clone(),
        })
    }
}

impl ChatClient for HttpChatClient {
    #[instrument(skip_all, fields(model = %request.model, messages = request.messages.len(), tools = request.tools.len()))]
    fn complete(&self, request: &ChatRequest) -> Result<ChatMessage> {
        if tracing::enabled!(tracing::Level::TRACE) {
            let payload = serde_json::to_string_pretty(request).context("serialize chat request")?;
            trace!(%payload, "chat request payload");
        }

        let body: Value = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .with_context(|| format!("chat request to {} failed", self.api_url))?
            .json()
            .context("decode chat response")?;

        let message = first_choice_message(&body)?;
        debug!(
            tool_calls = message.tool_calls.len(),
            content_chars = message.content_text().len(),
            "chat response received"
        );
        Ok(message)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Extract `choices[0].message` from a chat-completions response body.
pub fn first_choice_message(body: &Value) -> Result<ChatMessage> {
    let response = ChatResponse::deserialize(body)
        .map_err(|err| anyhow!("unexpected chat response shape: {err}"))?;
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| anyhow!("chat response has no choices"))
}
