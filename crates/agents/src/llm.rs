//! Language-model capability and its HTTP chat client (OpenAI-compatible or Ollama).

use crate::{AgentError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const DEFAULT_PROVIDER: &str = "openai";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "phi4-mini:latest";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

fn env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn timeout_secs() -> u64 {
    std::env::var("LLM_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
}

/// Text completion from a system prompt and a user message
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Completion constrained to a single JSON object where the backend
    /// supports it. Defaults to a plain completion.
    async fn complete_json(&self, system: &str, user: &str) -> Result<String> {
        self.complete(system, user).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Any server speaking the OpenAI `/chat/completions` protocol
    OpenAi,
    Ollama,
}

impl FromStr for Provider {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "ollama" => Ok(Provider::Ollama),
            other => Err(AgentError::Config(format!(
                "unknown LLM_PROVIDER '{}' (expected openai or ollama)",
                other
            ))),
        }
    }
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    provider: Provider,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ChatClient {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_OPENAI_URL.to_string(),
            provider: Provider::OpenAi,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            api_key: Some(api_key.into()),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn ollama(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: trim_base_url(base_url.into()),
            provider: Provider::Ollama,
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Build from `LLM_PROVIDER`, `LLM_URL`, `LLM_MODEL`, `OPENAI_API_KEY`
    /// and `LLM_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let provider: Provider = env_or_default("LLM_PROVIDER", DEFAULT_PROVIDER).parse()?;
        let client = match provider {
            Provider::OpenAi => {
                let api_key = std::env::var("OPENAI_API_KEY")
                    .map_err(|_| AgentError::Config("OPENAI_API_KEY not set".into()))?;
                Self::openai(api_key)
                    .with_base_url(env_or_default("LLM_URL", DEFAULT_OPENAI_URL))
                    .with_model(env_or_default("LLM_MODEL", DEFAULT_OPENAI_MODEL))
            }
            Provider::Ollama => Self::ollama(env_or_default("LLM_URL", DEFAULT_OLLAMA_URL))
                .with_model(env_or_default("LLM_MODEL", DEFAULT_OLLAMA_MODEL)),
        };
        Ok(client.with_timeout(Duration::from_secs(timeout_secs())))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = trim_base_url(url.into());
        self
    }

    /// Per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<bool> {
        let url = match self.provider {
            Provider::OpenAi => format!("{}/models", self.base_url),
            Provider::Ollama => format!("{}/api/tags", self.base_url),
        };
        let mut request = self.client.get(&url).timeout(self.timeout);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        Ok(response.status().is_success())
    }

    async fn chat(&self, system: &str, user: &str, json_output: bool) -> Result<String> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let content = match self.provider {
            Provider::OpenAi => self.openai_chat(messages, json_output).await,
            Provider::Ollama => self.ollama_chat(messages, json_output).await,
        }
        .map_err(|e| match e {
            AgentError::Http(err) if err.is_timeout() => AgentError::Timeout(self.timeout),
            other => other,
        })?;

        debug!(model = %self.model, chars = content.len(), "Chat completion received");
        Ok(content)
    }

    async fn openai_chat(&self, messages: Vec<ChatMessage>, json_output: bool) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = OpenAiChatRequest {
            model: self.model.clone(),
            messages,
            temperature: 0.0,
            response_format: json_output.then(|| json!({ "type": "json_object" })),
        };

        let mut builder = self.client.post(&url).json(&request).timeout(self.timeout);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await?
            .error_for_status()?
            .json::<OpenAiChatResponse>()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AgentError::Model("completion returned no content".into()))
    }

    async fn ollama_chat(&self, messages: Vec<ChatMessage>, json_output: bool) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let request = OllamaChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            format: json_output.then(|| Value::String("json".into())),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json::<OllamaChatResponse>()
            .await?;

        if let Some(done_reason) = response.done_reason.as_deref() {
            debug!("Ollama chat done_reason={}", done_reason);
        }

        Ok(response.message.content)
    }
}

#[async_trait]
impl LanguageModel for ChatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.chat(system, user, false).await
    }

    async fn complete_json(&self, system: &str, user: &str) -> Result<String> {
        self.chat(system, user, true).await
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn system(content: &str) -> Self {
        Self {
            role: "system",
            content: content.to_string(),
        }
    }

    fn user(content: &str) -> Self {
        Self {
            role: "user",
            content: content.to_string(),
        }
    }
}

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<Value>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessageResponse,
    #[serde(default)]
    done_reason: Option<String>,
}

#[derive(Deserialize)]
struct OllamaChatMessageResponse {
    content: String,
}
