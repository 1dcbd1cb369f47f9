//! Chat-model backends.
//!
//! Concrete implementations of [`docchat_core::Generator`]:
//! - **[`OpenAIGenerator`]**: `POST {url}/chat/completions` (OpenAI or any
//!   OpenAI-compatible server).
//! - **[`OllamaGenerator`]**: `POST {url}/api/chat` with streaming disabled.
//!
//! Both bound every request by `generation.timeout_secs` and retry
//! transient failures with the backoff in [`crate::http`]. The whole call,
//! retries included, is cut off after `generation.deadline_secs`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use docchat_core::{Error, GenerationRequest, Generator};

use crate::config::GenerationConfig;
use crate::http;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

pub struct OpenAIGenerator {
    client: reqwest::Client,
    model: String,
    model_id: String,
    url: String,
    api_key: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_retries: u32,
    deadline: Duration,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string());

        Ok(Self {
            client: http::client(config.timeout_secs)?,
            model: config.model.clone(),
            model_id: format!("openai/{}", config.model),
            url: url.trim_end_matches('/').to_string(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            deadline: Duration::from_secs(config.deadline_secs),
        })
    }

    fn body(&self, request: &GenerationRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": request.messages(),
        });
        if let Some(t) = self.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if let Some(n) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(n);
        }
        body
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, request: &GenerationRequest) -> docchat_core::Result<String> {
        let body = self.body(request);
        let url = format!("{}/chat/completions", self.url);
        let call = http::post_json(
            &self.client,
            &url,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        );
        let json = http::with_deadline(self.deadline, "OpenAI", call)
            .await
        .map_err(|e| Error::generation(format!("{:#}", e)))?;

        parse_openai_response(&json).map_err(|e| Error::generation(format!("{:#}", e)))
    }
}

/// Extract `choices[0].message.content`.
fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

pub struct OllamaGenerator {
    client: reqwest::Client,
    model: String,
    model_id: String,
    url: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_retries: u32,
    deadline: Duration,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string());

        Ok(Self {
            client: http::client(config.timeout_secs)?,
            model: config.model.clone(),
            model_id: format!("ollama/{}", config.model),
            url: url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            deadline: Duration::from_secs(config.deadline_secs),
        })
    }

    fn body(&self, request: &GenerationRequest) -> serde_json::Value {
        let mut options = serde_json::Map::new();
        if let Some(t) = self.temperature {
            options.insert("temperature".to_string(), serde_json::json!(t));
        }
        if let Some(n) = self.max_tokens {
            options.insert("num_predict".to_string(), serde_json::json!(n));
        }
        serde_json::json!({
            "model": self.model,
            "messages": request.messages(),
            "stream": false,
            "options": options,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, request: &GenerationRequest) -> docchat_core::Result<String> {
        let body = self.body(request);
        let url = format!("{}/api/chat", self.url);
        let call = http::post_json(
            &self.client,
            &url,
            None,
            &body,
            self.max_retries,
            "Ollama",
        );
        let json = http::with_deadline(self.deadline, "Ollama", call)
            .await
        .map_err(|e| Error::generation(format!("{:#}", e)))?;

        parse_ollama_response(&json).map_err(|e| Error::generation(format!("{:#}", e)))
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<String> {
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message.content"))
}

/// Create the generator selected by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use docchat_core::ConversationTurn;

    fn request() -> GenerationRequest {
        GenerationRequest {
            system: "sys".to_string(),
            context: vec!["passage".to_string()],
            history: vec![
                ConversationTurn::user("Q1"),
                ConversationTurn::assistant("A1"),
            ],
            question: "Q2".to_string(),
        }
    }

    #[test]
    fn openai_content_is_extracted() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Hi there"}}]
        });
        assert_eq!(parse_openai_response(&json).unwrap(), "Hi there");
        assert!(parse_openai_response(&serde_json::json!({"choices": []})).is_err());
    }

    #[test]
    fn ollama_content_is_extracted() {
        let json = serde_json::json!({"message": {"role": "assistant", "content": "Hello"}, "done": true});
        assert_eq!(parse_ollama_response(&json).unwrap(), "Hello");
    }

    #[test]
    fn ollama_body_disables_streaming() {
        let generator = OllamaGenerator::new(&GenerationConfig {
            provider: "ollama".to_string(),
            model: "llama3".to_string(),
            max_tokens: Some(256),
            ..Default::default()
        })
        .unwrap();
        let body = generator.body(&request());
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 256);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1]["content"], "Q1");
        assert_eq!(messages[3]["content"], "Q2");
    }

    #[tokio::test]
    async fn ollama_round_trip_against_local_server() {
        let app = Router::new().route(
            "/api/chat",
            post(|Json(body): Json<serde_json::Value>| async move {
                let n = body["messages"].as_array().map(|m| m.len()).unwrap_or(0);
                Json(serde_json::json!({
                    "message": {"role": "assistant", "content": format!("saw {} messages", n)},
                    "done": true
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let generator = create_generator(&GenerationConfig {
            provider: "ollama".to_string(),
            model: "llama3".to_string(),
            url: Some(format!("http://{}", addr)),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(generator.model_id(), "ollama/llama3");
        let text = generator.generate(&request()).await.unwrap();
        assert_eq!(text, "saw 4 messages");
    }

    #[tokio::test]
    async fn stalled_server_is_cut_off_at_the_deadline() {
        let app = Router::new().route(
            "/api/chat",
            post(|| async {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                "too late"
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let generator = create_generator(&GenerationConfig {
            provider: "ollama".to_string(),
            model: "llama3".to_string(),
            url: Some(format!("http://{}", addr)),
            timeout_secs: 60,
            max_retries: 5,
            deadline_secs: 1,
            ..Default::default()
        })
        .unwrap();

        let started = std::time::Instant::now();
        let err = generator.generate(&request()).await.unwrap_err();
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        match err {
            Error::Generation { reason } => assert!(reason.contains("deadline")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn unknown_provider_is_error() {
        let config = GenerationConfig {
            provider: "anthropic".to_string(),
            ..Default::default()
        };
        assert!(create_generator(&config).is_err());
    }
}
