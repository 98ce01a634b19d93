mod anthropic;
mod openai;
pub(crate) mod parsing;
mod prompts;

pub use openai::is_local_url;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::cli::LlmProvider;
use crate::company::UNKNOWN_COMPANY;
use crate::config::Config;
use crate::parser::PdfDocument;

use parsing::DEFAULT_DOCUMENT_TYPE;

/// Text limit for local models, whose context windows are small.
const LOCAL_TEXT_LIMIT: usize = 1500;

/// Categorization extracted from one document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub company_name: String,
    pub document_type: String,
    pub date: Option<NaiveDate>,
    pub confidence_score: f64,
    pub suggested_name: String,
    pub additional_metadata: Map<String, Value>,
}

impl DocumentInfo {
    /// Trims the company, lowercases the type and clamps confidence to `0..=1`.
    pub fn new(
        company_name: String,
        document_type: String,
        date: Option<NaiveDate>,
        confidence_score: f64,
        suggested_name: String,
        additional_metadata: Map<String, Value>,
    ) -> Self {
        let confidence_score = if confidence_score.is_nan() {
            0.0
        } else {
            confidence_score.clamp(0.0, 1.0)
        };

        Self {
            company_name: company_name.trim().to_string(),
            document_type: document_type.trim().to_lowercase(),
            date,
            confidence_score,
            suggested_name,
            additional_metadata,
        }
    }

    /// Result used whenever analysis is impossible or fails.
    pub fn fallback(document: &PdfDocument) -> Self {
        let file_name = document
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let head: String = document.text.chars().take(1000).collect();

        let date = parsing::extract_date_from_filename(&file_name)
            .or_else(|| parsing::extract_date_from_text(&head));

        let mut metadata = Map::new();
        metadata.insert("fallback".to_string(), Value::Bool(true));

        Self::new(
            UNKNOWN_COMPANY.to_string(),
            DEFAULT_DOCUMENT_TYPE.to_string(),
            date,
            0.0,
            document.stem(),
            metadata,
        )
    }

    pub fn is_fallback(&self) -> bool {
        self.additional_metadata
            .get("fallback")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Trait for LLM providers
#[async_trait]
pub trait LlmProviderTrait: Send + Sync {
    /// Send one system + user exchange and return the raw reply text
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the provider name
    fn name(&self) -> &'static str;

    /// Whether the endpoint is a local server (LM Studio and the like)
    fn is_local(&self) -> bool {
        false
    }
}

/// Main LLM client that abstracts over providers
pub struct LlmClient {
    provider: Box<dyn LlmProviderTrait>,
}

impl LlmClient {
    /// Create a new LLM client for the specified provider
    pub fn new(
        provider: LlmProvider,
        config: &Config,
        model_override: Option<&str>,
    ) -> Result<Self> {
        let provider_impl: Box<dyn LlmProviderTrait> = match provider {
            LlmProvider::OpenAI => {
                let provider_config = config
                    .get_provider("openai")
                    .context("OpenAI provider not configured")?;
                let model = model_override
                    .map(String::from)
                    .or_else(|| provider_config.model.clone())
                    .unwrap_or_else(|| "gpt-4o-mini".to_string());
                Box::new(openai::OpenAIProvider::new(provider_config, &model)?)
            }
            LlmProvider::Anthropic => {
                let provider_config = config
                    .get_provider("anthropic")
                    .context("Anthropic provider not configured")?;
                let model = model_override
                    .map(String::from)
                    .or_else(|| provider_config.model.clone())
                    .unwrap_or_else(|| "claude-3-5-haiku-latest".to_string());
                Box::new(anthropic::AnthropicProvider::new(provider_config, &model)?)
            }
        };

        info!("Initialized AI analyzer with provider: {}", provider_impl.name());

        Ok(Self::from_provider(provider_impl))
    }

    pub fn from_provider(provider: Box<dyn LlmProviderTrait>) -> Self {
        Self { provider }
    }

    /// Get the provider name
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn is_local(&self) -> bool {
        self.provider.is_local()
    }

    /// Characters of document text sent to the model.
    pub fn text_limit(&self, max_text_for_ai: usize) -> usize {
        if self.is_local() {
            max_text_for_ai.min(LOCAL_TEXT_LIMIT)
        } else {
            max_text_for_ai
        }
    }

    /// Categorize a document. Never fails: any problem yields
    /// [`DocumentInfo::fallback`].
    pub async fn analyze(&self, document: &PdfDocument, max_text_for_ai: usize) -> DocumentInfo {
        info!("Analyzing document: {}", document.path.display());

        let text: String = document
            .text
            .chars()
            .take(self.text_limit(max_text_for_ai))
            .collect();

        if text.trim().is_empty() {
            warn!("No text content found in {}", document.path.display());
            return DocumentInfo::fallback(document);
        }

        let prompt = if self.is_local() {
            prompts::simple_analysis_prompt(&text)
        } else {
            prompts::detailed_analysis_prompt(&text)
        };

        let response = match self
            .provider
            .complete(prompts::DOCUMENT_ANALYSIS_SYSTEM_PROMPT, &prompt)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("{} request failed for {}: {:#}", self.provider.name(), document.path.display(), e);
                return DocumentInfo::fallback(document);
            }
        };

        let mut info = match parsing::parse_document_info(&response) {
            Ok(info) => info,
            Err(e) => {
                warn!("Could not parse AI response for {}: {:#}", document.path.display(), e);
                debug!("Raw response: {}", response.chars().take(500).collect::<String>());
                return DocumentInfo::fallback(document);
            }
        };

        enhance(&mut info, document);

        info!(
            "Analysis complete: {} - {} (confidence: {:.2})",
            info.company_name, info.document_type, info.confidence_score
        );
        info
    }
}

/// Fill in a missing date from the text or file name, and a missing name.
fn enhance(info: &mut DocumentInfo, document: &PdfDocument) {
    if info.date.is_none() {
        let file_name = document
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info.date = parsing::extract_date_from_text(&document.text)
            .or_else(|| parsing::extract_date_from_filename(&file_name));
    }

    if info.suggested_name.is_empty() {
        info.suggested_name = parsing::generate_suggested_name(info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct ScriptedProvider {
        reply: Result<String, String>,
        local: bool,
    }

    impl ScriptedProvider {
        fn new(reply: Result<&str, &str>, local: bool) -> Self {
            Self {
                reply: reply.map(String::from).map_err(String::from),
                local,
            }
        }
    }

    #[async_trait]
    impl LlmProviderTrait for ScriptedProvider {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
            self.reply.clone().map_err(|e| anyhow::anyhow!(e))
        }

        fn name(&self) -> &'static str {
            "scripted"
        }

        fn is_local(&self) -> bool {
            self.local
        }
    }

    fn document(name: &str, text: &str) -> PdfDocument {
        PdfDocument {
            path: PathBuf::from(format!("/inbox/{name}")),
            text: text.to_string(),
            file_size: text.len() as u64,
            used_ocr: false,
        }
    }

    #[test]
    fn test_document_info_new_normalizes_fields() {
        let info = DocumentInfo::new(
            "  Chase Bank ".into(),
            " Bank Statement ".into(),
            None,
            3.0,
            String::new(),
            Map::new(),
        );
        assert_eq!(info.company_name, "Chase Bank");
        assert_eq!(info.document_type, "bank statement");
        assert_eq!(info.confidence_score, 1.0);
    }

    #[test]
    fn test_fallback_uses_stem_and_filename_date() {
        let info = DocumentInfo::fallback(&document("scan_2023_04_01.pdf", ""));
        assert_eq!(info.company_name, "Unknown");
        assert_eq!(info.document_type, "document");
        assert_eq!(info.confidence_score, 0.0);
        assert_eq!(info.suggested_name, "scan_2023_04_01");
        assert_eq!(info.date, NaiveDate::from_ymd_opt(2023, 4, 1));
        assert!(info.is_fallback());
    }

    #[tokio::test]
    async fn test_analyze_parses_reply_and_enhances() {
        let reply = r#"{"company_name": "Wells Fargo", "document_type": "Bank Statement", "date": null, "confidence_score": 0.9}"#;
        let client = LlmClient::from_provider(Box::new(ScriptedProvider::new(Ok(reply), false)));

        let info = client
            .analyze(&document("x.pdf", "Statement period ending 06/30/2023"), 4000)
            .await;

        assert_eq!(info.company_name, "Wells Fargo");
        assert_eq!(info.document_type, "bank statement");
        assert_eq!(info.date, NaiveDate::from_ymd_opt(2023, 6, 30));
        assert_eq!(info.suggested_name, "Wells Fargo Bank Statement June 2023");
        assert!(!info.is_fallback());
    }

    #[tokio::test]
    async fn test_analyze_empty_text_skips_provider() {
        let provider = ScriptedProvider::new(Ok("{}"), false);
        let client = LlmClient::from_provider(Box::new(provider));
        let info = client.analyze(&document("blank.pdf", "   "), 4000).await;
        assert!(info.is_fallback());
        assert_eq!(info.suggested_name, "blank");
    }

    #[tokio::test]
    async fn test_analyze_transport_error_falls_back() {
        let client =
            LlmClient::from_provider(Box::new(ScriptedProvider::new(Err("connection refused"), false)));
        let info = client.analyze(&document("bill.pdf", "Some bill text"), 4000).await;
        assert!(info.is_fallback());
        assert_eq!(info.company_name, "Unknown");
    }

    #[tokio::test]
    async fn test_analyze_unparsable_reply_falls_back() {
        let client =
            LlmClient::from_provider(Box::new(ScriptedProvider::new(Ok("I am not sure."), false)));
        let info = client.analyze(&document("bill.pdf", "Some bill text"), 4000).await;
        assert!(info.is_fallback());
    }

    #[test]
    fn test_local_models_get_smaller_limit() {
        let local = LlmClient::from_provider(Box::new(ScriptedProvider::new(Ok("{}"), true)));
        assert_eq!(local.text_limit(4000), 1500);
        assert_eq!(local.text_limit(1000), 1000);

        let cloud = LlmClient::from_provider(Box::new(ScriptedProvider::new(Ok("{}"), false)));
        assert_eq!(cloud.text_limit(4000), 4000);
    }
}
