use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub semantic: SemanticConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_dir")]
    pub dir: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            dir: default_dataset_dir(),
        }
    }
}

fn default_dataset_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    6
}

#[derive(Debug, Deserialize, Clone)]
pub struct SemanticConfig {
    /// Backend name: `tfidf` (in-process, deterministic) or `openai`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Vocabulary cap for the TF-IDF backend.
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    /// Model name for the OpenAI backend (e.g. `text-embedding-3-small`).
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            max_features: default_max_features(),
            model: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "tfidf".to_string()
}
fn default_max_features() -> usize {
    4096
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            semantic: SemanticConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Load and validate configuration from a TOML file.
///
/// A missing file yields the defaults so `srag` works out of the box;
/// a file that exists but fails to parse or validate is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    // Validate semantic backend
    match config.semantic.provider.as_str() {
        "tfidf" => {
            if config.semantic.max_features == 0 {
                anyhow::bail!("semantic.max_features must be > 0");
            }
        }
        "openai" => {
            if config.semantic.model.is_none() {
                anyhow::bail!(
                    "semantic.model must be specified when provider is '{}'",
                    config.semantic.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown semantic provider: '{}'. Must be tfidf or openai.",
            other
        ),
    }

    Ok(config)
}
