use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::LlmProviderTrait;
use crate::config::ProviderConfig;

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

impl AnthropicProvider {
    pub fn new(config: &ProviderConfig, model: &str) -> Result<Self> {
        if config.api_key.is_empty() {
            anyhow::bail!(
                "Anthropic API key is required. Set ANTHROPIC_API_KEY environment variable."
            );
        }

        Ok(Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            model: model.to_string(),
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or("https://api.anthropic.com")
                .trim_end_matches('/')
                .to_string(),
            temperature: config.temperature.unwrap_or(0.3),
            max_tokens: config.max_tokens.unwrap_or(800),
        })
    }
}

#[async_trait]
impl LlmProviderTrait for AnthropicProvider {
    async fn complete(&self, system: &str, user_message: &str) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: system.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: user_message.to_string(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error ({}): {}", status, error_text);
        }

        let response: AnthropicResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic response")?;

        response
            .content
            .first()
            .and_then(|c| c.text.clone())
            .context("No text content in Anthropic response")
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::parsing;

    #[test]
    fn test_requires_api_key() {
        let config = ProviderConfig {
            api_key: String::new(),
            base_url: None,
            model: None,
            temperature: None,
            max_tokens: None,
        };
        assert!(AnthropicProvider::new(&config, "claude-3-5-haiku-latest").is_err());
    }

    #[test]
    fn test_parse_document_from_anthropic_style_response() {
        // Anthropic often returns clean JSON in the first text block
        let body = r#"{"content":[{"type":"text","text":"{\"company_name\": \"Geico\", \"document_type\": \"insurance\"}"}]}"#;
        let response: AnthropicResponse = serde_json::from_str(body).unwrap();
        let text = response.content[0].text.as_deref().unwrap();
        let info = parsing::parse_document_info(text).unwrap();
        assert_eq!(info.company_name, "Geico");
        assert_eq!(info.document_type, "insurance");
    }
}
