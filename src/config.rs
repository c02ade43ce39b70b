use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    // LLM configuration (OpenAI-compatible: LM Studio, Ollama, vLLM, OpenAI, etc.)
    #[serde(default = "default_llm_url")]
    pub llm_api_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default)]
    pub llm_api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub llm_temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub llm_max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,

    // Campaigns REST API (the CRUD service the analytics tools read from)
    #[serde(default = "default_campaigns_api_url")]
    pub campaigns_api_url: String,
    #[serde(default)]
    pub campaigns_api_key: Option<String>,

    // Document search service (vector store over uploaded campaign reports)
    #[serde(default = "default_docs_api_url")]
    pub docs_api_url: String,

    // Web server that hosts campaign image assets
    #[serde(default = "default_web_base_url")]
    pub web_base_url: String,
    #[serde(default)]
    pub web_access_key: Option<String>,

    // Conversation memory
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_llm_url() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_llm_model() -> String {
    "local-model".to_string()
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_llm_timeout_secs() -> u64 {
    120
}

fn default_campaigns_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_docs_api_url() -> String {
    "http://localhost:8030".to_string()
}

fn default_web_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_database_path() -> String {
    "conversations.db".to_string()
}

fn default_history_limit() -> usize {
    10
}

fn default_max_iterations() -> usize {
    10
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            llm_api_url: default_llm_url(),
            llm_model: default_llm_model(),
            llm_api_key: None,
            llm_temperature: default_temperature(),
            llm_max_tokens: default_max_tokens(),
            llm_timeout_secs: default_llm_timeout_secs(),
            campaigns_api_url: default_campaigns_api_url(),
            campaigns_api_key: None,
            docs_api_url: default_docs_api_url(),
            web_base_url: default_web_base_url(),
            web_access_key: None,
            database_path: default_database_path(),
            history_limit: default_history_limit(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl AssistantConfig {
    /// Get the directory containing the executable
    fn get_base_dir() -> PathBuf {
        match std::env::current_exe() {
            Ok(exe_path) => exe_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
            Err(_) => PathBuf::from("."),
        }
    }

    /// Get the path to the config file (relative to executable)
    pub fn config_path() -> PathBuf {
        Self::get_base_dir().join("assistant_config.toml")
    }

    /// Load config from assistant_config.toml (next to executable), falling back to env vars
    pub fn load() -> Self {
        let path = Self::config_path();

        if let Ok(contents) = fs::read_to_string(&path) {
            match toml::from_str::<AssistantConfig>(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    return config;
                }
                Err(e) => {
                    tracing::error!("Failed to parse {:?}: {}", path, e);
                }
            }
        }

        tracing::warn!("No config file found, using defaults + env vars");
        Self::from_env()
    }

    /// Load from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("LLM_API_URL") {
            config.llm_api_url = url;
        }

        if let Ok(model) = env::var("LLM_MODEL") {
            config.llm_model = model;
        }

        if let Ok(key) = env::var("LLM_API_KEY") {
            config.llm_api_key = Some(key);
        }

        if let Ok(url) = env::var("API_BASE_URL") {
            config.campaigns_api_url = url;
        }

        if let Ok(key) = env::var("API_KEY") {
            config.campaigns_api_key = Some(key);
        }

        if let Ok(url) = env::var("DOCS_API_URL") {
            config.docs_api_url = url;
        }

        if let Ok(url) = env::var("WEB_BASE_URL") {
            config.web_base_url = url;
        }

        if let Ok(key) = env::var("WEB_ACCESS_KEY") {
            config.web_access_key = Some(key);
        }

        if let Ok(path) = env::var("ASSISTANT_DATABASE_PATH") {
            if !path.trim().is_empty() {
                config.database_path = path;
            }
        }

        if let Ok(limit) = env::var("ASSISTANT_HISTORY_LIMIT") {
            if let Ok(n) = limit.parse() {
                config.history_limit = n;
            }
        }

        if let Ok(limit) = env::var("ASSISTANT_MAX_ITERATIONS") {
            if let Ok(n) = limit.parse() {
                config.max_iterations = n;
            }
        }

        config
    }
}
