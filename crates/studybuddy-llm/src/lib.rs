//! Blocking client for OpenAI-compatible chat completion endpoints.
//!
//! OpenRouter is the default target; any server exposing
//! `POST {api_base}/chat/completions` works.

use anyhow::{Result, anyhow};
use reqwest::blocking::Client;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

use studybuddy_core::config::LlmConfig;
use studybuddy_core::traits::{JsonSchemaSpec, LanguageModel};

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

pub struct ChatClient {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatClient {
    pub fn new(api_base: &str, api_key: String, model: String, temperature: f32, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key,
            model,
            temperature,
        })
    }

    /// Client for routing/rewriting calls (`llm.model`).
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        Self::for_model(cfg, cfg.model.clone())
    }

    /// Client for answer synthesis (`llm.rag_model`, falling back to `llm.model`).
    pub fn for_answers(cfg: &LlmConfig) -> Result<Self> {
        Self::for_model(cfg, cfg.answer_model().to_string())
    }

    fn for_model(cfg: &LlmConfig, model: String) -> Result<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("OPENROUTER_API_KEY is not set"))?;
        Self::new(&cfg.api_base, api_key, model, cfg.temperature, Duration::from_secs(cfg.timeout_secs))
    }

    pub fn chat(&self, messages: &[Message], response_format: Option<&JsonSchemaSpec>) -> Result<String> {
        let body = request_body(&self.model, self.temperature, messages, response_format);
        let start = Instant::now();
        let res = self.client.post(&self.url).bearer_auth(&self.api_key).json(&body).send()?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().unwrap_or_default();
            return Err(anyhow!("LLM API error: {} - {}", status, text));
        }
        let json: serde_json::Value = res.json()?;
        debug!(model = %self.model, ms = start.elapsed().as_millis() as u64, "chat completion");
        extract_content(&json)
    }
}

impl LanguageModel for ChatClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(&[Message::user(prompt)], None)
    }

    fn complete_json(&self, prompt: &str, schema: &JsonSchemaSpec) -> Result<String> {
        self.chat(&[Message::user(prompt)], Some(schema))
    }
}

fn request_body(model: &str, temperature: f32, messages: &[Message], response_format: Option<&JsonSchemaSpec>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
        "temperature": temperature,
    });
    if let Some(spec) = response_format {
        body["response_format"] = serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": spec.name,
                "schema": spec.schema,
                "strict": true
            }
        });
    }
    body
}

fn extract_content(json: &serde_json::Value) -> Result<String> {
    if let Some(error) = json.get("error") {
        return Err(anyhow!("LLM API returned error: {}", error));
    }
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid response format: missing content in choices"))
}
