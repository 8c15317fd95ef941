use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::persona::PersonaOverrides;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Openrouter,
    Ollama,
    Openai,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::Openrouter => write!(f, "openrouter"),
            LlmProvider::Ollama => write!(f, "ollama"),
            LlmProvider::Openai => write!(f, "openai"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default)]
    pub base_url: String,
    /// Absent or empty means fallback-only mode.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Tried in order; the first one that answers wins.
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: String::new(),
            api_key: None,
            models: default_models(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Returns the effective base_url: if the stored value is empty,
    /// fall back to the canonical URL for the configured provider.
    pub fn effective_base_url(&self) -> &str {
        if !self.base_url.is_empty() {
            return &self.base_url;
        }
        match self.provider {
            LlmProvider::Openrouter => "https://openrouter.ai/api/v1",
            LlmProvider::Ollama => "http://localhost:11434/v1",
            LlmProvider::Openai => "https://api.openai.com/v1",
        }
    }

    /// The credential, if one is set and non-blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Sent as HTTP-Referer so OpenRouter can attribute traffic.
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default = "default_app_title")]
    pub app_title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            site_url: default_site_url(),
            app_title: default_app_title(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub persona: PersonaOverrides,
}

fn default_models() -> Vec<String> {
    [
        "meta-llama/llama-3.1-8b-instruct:free",
        "qwen/qwen-2.5-coder-32b-instruct:free",
        "microsoft/wizardlm-2-8x22b:free",
        "huggingfaceh4/zephyr-orpo-141b-ait:free",
        "nousresearch/hermes-3-llama-3.1-8b:free",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.8
}

fn default_timeout_secs() -> u64 {
    25
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_site_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_app_title() -> String {
    "Genesis AI Assistant".to_string()
}

impl Config {
    /// Load from a TOML file, then apply environment overrides.
    /// A missing file is not an error: every field has a default.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            info!(
                "No config file at {}, using built-in defaults",
                path.display()
            );
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Invalid config TOML")?;
        if config.llm.models.is_empty() {
            warn!("[llm] models is empty; every request will use a fallback reply");
        }
        Ok(config)
    }

    /// Overlay `OPENROUTER_API_KEY`, `PORT` and `SITE_URL`. Blank values
    /// count as unset. The lookup is injected so tests don't touch the
    /// process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(key) = lookup("OPENROUTER_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {port}"))?;
        }
        if let Some(site_url) = lookup("SITE_URL") {
            self.server.site_url = site_url;
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.llm.credential().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.llm.models.len(), 5);
        assert_eq!(config.llm.models[0], "meta-llama/llama-3.1-8b-instruct:free");
        assert_eq!(config.llm.timeout_secs, 25);
        assert!(!config.has_api_key());
        assert_eq!(
            config.llm.effective_base_url(),
            "https://openrouter.ai/api/v1"
        );
    }

    #[test]
    fn test_llm_section_overrides() {
        let config = Config::from_toml_str(
            r#"
            [llm]
            provider = "ollama"
            api_key = "sk-or-abc"
            models = ["a", "b"]
            timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.models, vec!["a", "b"]);
        assert_eq!(config.llm.timeout_secs, 5);
        assert_eq!(config.llm.credential(), Some("sk-or-abc"));
        assert_eq!(config.llm.effective_base_url(), "http://localhost:11434/v1");
    }

    #[test]
    fn test_blank_api_key_counts_as_absent() {
        let config = Config::from_toml_str("[llm]\napi_key = \"   \"\n").unwrap();
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("OPENROUTER_API_KEY", "sk-env"),
                ("PORT", "8080"),
                ("SITE_URL", "https://genesis.example"),
            ]))
            .unwrap();
        assert_eq!(config.llm.credential(), Some("sk-env"));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.site_url, "https://genesis.example");
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = Config::from_toml_str("[llm]\napi_key = \"sk-file\"\n").unwrap();
        config
            .apply_env(env(&[
                ("OPENROUTER_API_KEY", ""),
                ("PORT", ""),
                ("SITE_URL", "  "),
            ]))
            .unwrap();
        assert_eq!(config.llm.credential(), Some("sk-file"));
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.site_url, "http://localhost:3000");
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let mut config = Config::default();
        let err = config.apply_env(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::from_toml_str(include_str!("../config.example.toml")).unwrap();
        assert_eq!(config.llm.models.len(), 5);
        assert_eq!(config.server.app_title, "Genesis AI Assistant");
        assert!(config.llm.credential().is_none());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load(Path::new("/nonexistent/genesis/config.toml")).unwrap();
        assert_eq!(config.llm.max_tokens, 1000);
    }
}
