use crate::detect::CoreType;
use serde::Deserialize;
use std::{fs, path::Path};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_reference_dir")]
    pub reference_dir: String,
    #[serde(default)]
    pub display: DisplaySection,
    #[serde(default)]
    pub llm: LlmSection,
}

fn default_db_path() -> String {
    "orders/orders.db".to_string()
}

fn default_reference_dir() -> String {
    "data/reference".to_string()
}

/// Ordering used when summarising an order by core type.
#[derive(Debug, Clone, Deserialize)]
pub struct DisplaySection {
    #[serde(default = "default_core_type_order")]
    pub core_type_order: Vec<CoreType>,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            core_type_order: default_core_type_order(),
        }
    }
}

fn default_core_type_order() -> Vec<CoreType> {
    vec![
        CoreType::NaturalLatex,
        CoreType::MixedLatex7Zone,
        CoreType::ReinforcedLatex,
        CoreType::GroovedFoam7Zone,
        CoreType::Select43,
        CoreType::ViscoFoam,
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Pattern matching only, no model call.
    Heuristics,
    Ollama,
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_backend")]
    pub backend: LlmBackend,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_ollama")]
    pub ollama: Endpoint,
    #[serde(default = "default_remote")]
    pub remote: Endpoint,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            timeout_secs: default_timeout_secs(),
            ollama: default_ollama(),
            remote: default_remote(),
        }
    }
}

fn default_backend() -> LlmBackend {
    LlmBackend::Heuristics
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_ollama() -> Endpoint {
    Endpoint {
        base_url: "http://localhost:11434/v1".to_string(),
        model: "qwen3:8b".to_string(),
    }
}

fn default_remote() -> Endpoint {
    Endpoint {
        base_url: "https://api.openai.com/v1".to_string(),
        model: "gpt-4o-mini".to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub base_url: String,
    pub model: String,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the config file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            info!(path = %path.display(), "No config file, using defaults");
            Ok(toml::from_str("")?)
        }
    }
}
