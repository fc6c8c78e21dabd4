use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub translate: TranslateConfig,
    pub store: StoreConfig,
    pub retrieval: RetrievalConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Gemini,
    Ollama,
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(LlmProvider::Gemini),
            "ollama" => Ok(LlmProvider::Ollama),
            other => anyhow::bail!("unknown LLM provider: {}", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_embedding_model: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub ollama_embedding_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "file" => Ok(StoreBackend::File),
            other => anyhow::bail!("unknown session backend: {}", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_input_chars: usize,
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_addr: "0.0.0.0:8000".to_string(),
                request_timeout_secs: 60,
            },
            llm: LlmConfig {
                provider: LlmProvider::Gemini,
                gemini_api_key: None,
                gemini_model: "gemini-1.5-pro-latest".to_string(),
                gemini_embedding_model: "embedding-001".to_string(),
                ollama_url: "http://localhost:11434".to_string(),
                ollama_model: "llama3".to_string(),
                ollama_embedding_model: "nomic-embed-text".to_string(),
            },
            translate: TranslateConfig { api_key: None },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                data_dir: PathBuf::from("data/sessions"),
            },
            retrieval: RetrievalConfig {
                chunk_size: 1000,
                chunk_overlap: 100,
                max_input_chars: extract::DEFAULT_MAX_INPUT_CHARS,
                top_k: index::DEFAULT_TOP_K,
            },
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 500,
                max_backoff_ms: 5000,
            },
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup, starting from the defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BIND_ADDR") {
            config.server.bind_addr = v;
        }
        parse_into(&get, "REQUEST_TIMEOUT_SECS", &mut config.server.request_timeout_secs)?;

        parse_into(&get, "LLM_PROVIDER", &mut config.llm.provider)?;
        config.llm.gemini_api_key = get("GEMINI_API_KEY");
        if let Some(v) = get("GEMINI_MODEL") {
            config.llm.gemini_model = v;
        }
        if let Some(v) = get("GEMINI_EMBEDDING_MODEL") {
            config.llm.gemini_embedding_model = v;
        }
        if let Some(v) = get("OLLAMA_URL") {
            config.llm.ollama_url = v;
        }
        if let Some(v) = get("OLLAMA_MODEL") {
            config.llm.ollama_model = v;
        }
        if let Some(v) = get("OLLAMA_EMBEDDING_MODEL") {
            config.llm.ollama_embedding_model = v;
        }

        config.translate.api_key =
            get("GOOGLE_TRANSLATE_API_KEY").or_else(|| config.llm.gemini_api_key.clone());

        parse_into(&get, "SESSION_BACKEND", &mut config.store.backend)?;
        if let Some(v) = get("SESSION_DIR") {
            config.store.data_dir = PathBuf::from(v);
        }

        parse_into(&get, "CHUNK_SIZE", &mut config.retrieval.chunk_size)?;
        parse_into(&get, "CHUNK_OVERLAP", &mut config.retrieval.chunk_overlap)?;
        parse_into(&get, "MAX_INPUT_CHARS", &mut config.retrieval.max_input_chars)?;
        parse_into(&get, "RETRIEVAL_TOP_K", &mut config.retrieval.top_k)?;

        parse_into(&get, "LLM_MAX_RETRIES", &mut config.retry.max_retries)?;
        parse_into(&get, "LLM_INITIAL_BACKOFF_MS", &mut config.retry.initial_backoff_ms)?;
        parse_into(&get, "LLM_MAX_BACKOFF_MS", &mut config.retry.max_backoff_ms)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retrieval.chunk_size == 0 {
            anyhow::bail!("CHUNK_SIZE must be greater than zero");
        }
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            anyhow::bail!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.retrieval.chunk_overlap,
                self.retrieval.chunk_size
            );
        }
        if self.retrieval.top_k == 0 {
            anyhow::bail!("RETRIEVAL_TOP_K must be greater than zero");
        }
        if self.retrieval.max_input_chars == 0 {
            anyhow::bail!("MAX_INPUT_CHARS must be greater than zero");
        }
        if self.llm.provider == LlmProvider::Gemini && self.llm.gemini_api_key.is_none() {
            anyhow::bail!("GEMINI_API_KEY is required when LLM_PROVIDER is gemini");
        }
        Ok(())
    }

    pub fn chunker_config(&self) -> ingest::ChunkerConfig {
        ingest::ChunkerConfig {
            chunk_size: self.retrieval.chunk_size,
            chunk_overlap: self.retrieval.chunk_overlap,
        }
    }
}

fn parse_into<T, G>(get: &G, key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw))?;
    }
    Ok(())
}
