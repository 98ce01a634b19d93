pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "ocrganizer")]
#[command(author = "OCRganizer Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Organize PDFs into company/year/month folders using OCR and LLMs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long, default_value = "false")]
        force: bool,
    },

    /// Extract, classify and file PDFs into the output tree
    #[command(long_about = "Extract, classify and file PDFs into the output tree.\n\n\
        Text is extracted from every PDF (falling back to OCR for scanned\n\
        documents), sent to the configured LLM for classification, and the\n\
        file is moved into <output>/<company>/<year>/<MM - Month>/.\n\n\
        Company names are normalized against the folders already present in\n\
        the output directory, so \"CHASE BANK INC\" lands next to \"Chase Bank\".\n\n\
        The OpenAI provider works with any OpenAI-compatible API. Point\n\
        base_url at localhost to use LM Studio without an API key.")]
    Organize {
        /// PDF file or directory of PDFs
        #[arg(required = true)]
        input: PathBuf,

        /// Output directory (defaults to files.output_dir from config)
        #[arg(short, long, env = "OCRGANIZER_OUTPUT")]
        output: Option<PathBuf>,

        /// LLM provider (openai, anthropic)
        #[arg(short, long, env = "OCRGANIZER_PROVIDER")]
        provider: Option<LlmProvider>,

        /// Model name (provider-specific, e.g. gpt-4o-mini, claude-3-5-haiku-latest)
        #[arg(short, long, env = "OCRGANIZER_MODEL")]
        model: Option<String>,

        /// Show where files would go without touching them
        #[arg(long, default_value = "false")]
        dry_run: bool,

        /// Copy files instead of moving them
        #[arg(long, default_value = "false")]
        copy: bool,

        /// Folder structure pattern, e.g. "{company}/{year}/{month}"
        #[arg(long)]
        structure: Option<String>,

        /// File name pattern, e.g. "{company}_{type}_{date}"
        #[arg(long)]
        filename: Option<String>,

        /// Similarity threshold for matching company names (0.0-1.0)
        #[arg(long)]
        threshold: Option<f64>,

        /// Disable company name normalization
        #[arg(long, default_value = "false")]
        no_normalize: bool,

        /// Skip merging duplicate company folders at startup
        #[arg(long, default_value = "false")]
        no_merge: bool,

        /// Number of concurrent LLM requests
        #[arg(short = 'j', long, default_value = "4")]
        concurrency: usize,
    },

    /// List the companies known from the output directory
    Companies {
        /// Output directory to scan
        #[arg(short, long, env = "OCRGANIZER_OUTPUT")]
        output: Option<PathBuf>,

        /// Print as JSON
        #[arg(long, default_value = "false")]
        json: bool,

        /// Show how a raw company name would be resolved
        #[arg(long, value_name = "NAME")]
        resolve: Option<String>,
    },

    /// Merge company folders whose names are near-duplicates
    Merge {
        /// Output directory to consolidate
        #[arg(short, long, env = "OCRGANIZER_OUTPUT")]
        output: Option<PathBuf>,

        /// Only list the folders that would be merged
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },

    /// Move organized files back to where they came from
    Undo {
        /// Output directory holding the history file
        #[arg(short, long, env = "OCRGANIZER_OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Check system health and diagnose common problems
    Doctor,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum LlmProvider {
    #[default]
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::OpenAI => write!(f, "openai"),
            LlmProvider::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAI),
            "anthropic" => Ok(LlmProvider::Anthropic),
            other => anyhow::bail!("Unsupported AI provider: {}", other),
        }
    }
}
