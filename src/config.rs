use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::company::NormalizationSettings;

pub const SUPPORTED_PROVIDERS: [&str; 2] = ["openai", "anthropic"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_provider")]
    pub default_provider: String,
    pub default_model: Option<String>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub organization: OrganizationConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub files: FilesConfig,
}

fn default_provider() -> String {
    "openai".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub openai: Option<ProviderConfig>,
    pub anthropic: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizationConfig {
    pub structure_pattern: String,
    pub filename_pattern: String,
    pub date_format: String,
    pub enable_company_normalization: bool,
    pub company_similarity_threshold: f64,
    pub auto_merge_duplicates: bool,
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        Self {
            structure_pattern: "{company}/{year}/{month}".to_string(),
            filename_pattern: "{company}_{type}_{date}".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            enable_company_normalization: true,
            company_similarity_threshold: 0.8,
            auto_merge_duplicates: true,
        }
    }
}

impl OrganizationConfig {
    /// Registry settings, or `None` when normalization is switched off.
    pub fn normalization(&self) -> Option<NormalizationSettings> {
        self.enable_company_normalization
            .then_some(NormalizationSettings {
                similarity_threshold: self.company_similarity_threshold,
                auto_merge_duplicates: self.auto_merge_duplicates,
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub enable_ocr: bool,
    pub min_text_length: usize,
    pub max_text_for_ai: usize,
    pub confidence_threshold: f64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            enable_ocr: true,
            min_text_length: 100,
            max_text_for_ai: 4000,
            confidence_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub copy_mode: bool,
    pub max_file_size_mb: u64,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input_pdfs"),
            output_dir: PathBuf::from("output"),
            copy_mode: false,
            max_file_size_mb: 50,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            default_model: None,
            providers: ProvidersConfig {
                openai: Some(ProviderConfig {
                    api_key: "${OPENAI_API_KEY}".to_string(),
                    base_url: None,
                    model: Some("gpt-4o-mini".to_string()),
                    temperature: Some(0.3),
                    max_tokens: Some(800),
                }),
                anthropic: Some(ProviderConfig {
                    api_key: "${ANTHROPIC_API_KEY}".to_string(),
                    base_url: None,
                    model: Some("claude-3-5-haiku-latest".to_string()),
                    temperature: Some(0.3),
                    max_tokens: Some(800),
                }),
            },
            organization: OrganizationConfig::default(),
            processing: ProcessingConfig::default(),
            files: FilesConfig::default(),
        }
    }
}

impl Config {
    /// Get the configuration directory path
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("ocrganizer");
        Ok(config_dir)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!(
                "Configuration file not found at {}. Run 'ocrganizer init' first.",
                config_path.display()
            );
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file at {}", config_path.display()))?;

        Ok(config)
    }

    /// Load the config file, or fall back to built-in defaults when none exists.
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            return Self::load();
        }

        info!(
            "No config file at {}, using defaults",
            config_path.display()
        );
        let mut config = Self::default();
        config.expand_env_vars();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.expand_env_vars();
        Ok(config)
    }

    /// Expand environment variables in API keys
    fn expand_env_vars(&mut self) {
        if let Some(ref mut provider) = self.providers.openai {
            provider.api_key = expand_env_var(&provider.api_key);
        }
        if let Some(ref mut provider) = self.providers.anthropic {
            provider.api_key = expand_env_var(&provider.api_key);
        }
    }

    /// Get provider configuration by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        match name.to_lowercase().as_str() {
            "openai" => self.providers.openai.as_ref(),
            "anthropic" => self.providers.anthropic.as_ref(),
            _ => None,
        }
    }

    /// Check value ranges, reporting every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if !SUPPORTED_PROVIDERS.contains(&self.default_provider.to_lowercase().as_str()) {
            problems.push(format!(
                "default_provider '{}' is not one of: {}",
                self.default_provider,
                SUPPORTED_PROVIDERS.join(", ")
            ));
        }

        let threshold = self.organization.company_similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            problems.push(format!(
                "organization.company_similarity_threshold must be between 0 and 1 (got {})",
                threshold
            ));
        }

        let confidence = self.processing.confidence_threshold;
        if !(0.0..=1.0).contains(&confidence) {
            problems.push(format!(
                "processing.confidence_threshold must be between 0 and 1 (got {})",
                confidence
            ));
        }

        if self.processing.max_text_for_ai < 100 {
            problems.push(format!(
                "processing.max_text_for_ai must be at least 100 (got {})",
                self.processing.max_text_for_ai
            ));
        }

        if self.files.max_file_size_mb == 0 {
            problems.push("files.max_file_size_mb must be greater than 0".to_string());
        }

        if !self.organization.structure_pattern.contains("{company}") {
            problems.push(format!(
                "organization.structure_pattern must contain {{company}} (got '{}')",
                self.organization.structure_pattern
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Invalid configuration:\n  - {}", problems.join("\n  - "))
        }
    }
}

/// Expand environment variable references like ${VAR_NAME}
fn expand_env_var(value: &str) -> String {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).unwrap_or_default()
    } else if let Some(var_name) = value.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_default()
    } else {
        value.to_string()
    }
}
