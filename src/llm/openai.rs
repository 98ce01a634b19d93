use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::LlmProviderTrait;
use crate::config::ProviderConfig;

const LOCAL_HOST_MARKERS: [&str; 3] = ["localhost", "127.0.0.1", "192.168."];

/// Any OpenAI-compatible chat completions endpoint, including LM Studio.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
    local: bool,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Base URLs on the local machine or LAN are served by a local model server.
pub fn is_local_url(base_url: &str) -> bool {
    LOCAL_HOST_MARKERS
        .iter()
        .any(|marker| base_url.contains(marker))
}

impl OpenAIProvider {
    pub fn new(config: &ProviderConfig, model: &str) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1")
            .trim_end_matches('/')
            .to_string();
        let local = is_local_url(&base_url);

        let api_key = if local {
            info!("Using local LM Studio instance at {}", base_url);
            if config.api_key.is_empty() {
                "lm-studio".to_string()
            } else {
                config.api_key.clone()
            }
        } else if config.api_key.is_empty() {
            anyhow::bail!("OpenAI API key is required. Set OPENAI_API_KEY environment variable.");
        } else {
            config.api_key.clone()
        };

        Ok(Self {
            client: Client::new(),
            api_key,
            model: model.to_string(),
            base_url,
            temperature: config.temperature.unwrap_or(0.3),
            max_tokens: config.max_tokens.unwrap_or(800),
            local,
        })
    }
}

#[async_trait]
impl LlmProviderTrait for OpenAIProvider {
    async fn complete(&self, system: &str, user_message: &str) -> Result<String> {
        let request = OpenAIRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_message.to_string(),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({}): {}", status, error_text);
        }

        let response: OpenAIResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .context("No content in OpenAI response")
    }

    fn name(&self) -> &'static str {
        "openai"
    }

    fn is_local(&self) -> bool {
        self.local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_config(api_key: &str, base_url: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            api_key: api_key.to_string(),
            base_url: base_url.map(String::from),
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    #[test]
    fn test_local_url_detection() {
        assert!(is_local_url("http://localhost:1234/v1"));
        assert!(is_local_url("http://127.0.0.1:1234/v1"));
        assert!(is_local_url("http://192.168.1.20:1234/v1"));
        assert!(!is_local_url("https://api.openai.com/v1"));
    }

    #[test]
    fn test_local_server_needs_no_key() {
        let provider =
            OpenAIProvider::new(&provider_config("", Some("http://localhost:1234/v1/")), "local-model")
                .unwrap();
        assert!(provider.is_local());
        assert_eq!(provider.api_key, "lm-studio");
        assert_eq!(provider.base_url, "http://localhost:1234/v1");
    }

    #[test]
    fn test_cloud_requires_key() {
        assert!(OpenAIProvider::new(&provider_config("", None), "gpt-4o-mini").is_err());

        let provider = OpenAIProvider::new(&provider_config("sk-test", None), "gpt-4o-mini").unwrap();
        assert!(!provider.is_local());
        assert_eq!(provider.max_tokens, 800);
    }

    #[test]
    fn test_parse_response_shape() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"company_name\":\"Chase\"}"}}]}"#;
        let response: OpenAIResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            response.choices[0].message.content.as_deref(),
            Some(r#"{"company_name":"Chase"}"#)
        );
    }
}
