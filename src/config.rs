use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use mica_memory::document::{SegmenterConfig, SegmentStrategy};
use mica_memory::SessionLimits;

/// LLM provider backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Claude,
    Proxy,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Claude => "claude",
            Self::Proxy => "proxy",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub segmenter: SegmenterSection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub index: IndexSection,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: String,
    /// Display name when `provider = "proxy"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Prefer `MICA_API_KEY`; this field exists for local setups only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            model: "gpt-4o-mini".into(),
            base_url: "https://api.openai.com/v1".into(),
            proxy_name: None,
            embedding_model: Some("text-embedding-3-small".into()),
            max_tokens: 1024,
            temperature: 0.7,
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SegmenterSection {
    pub strategy: SegmentStrategy,
    pub max_size: usize,
    pub overlap: usize,
}

impl Default for SegmenterSection {
    fn default() -> Self {
        Self {
            strategy: SegmentStrategy::SeparatorCascade,
            max_size: 500,
            overlap: 50,
        }
    }
}

impl SegmenterSection {
    #[must_use]
    pub fn to_segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            strategy: self.strategy,
            max_size: self.max_size,
            overlap: self.overlap,
            ..SegmenterConfig::default()
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalSection {
    pub top_k: usize,
    pub min_score: f32,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_score: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionSection {
    pub max_turns: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_chars: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            max_turns: 10,
            max_chars: Some(8000),
            system_prompt: None,
        }
    }
}

impl SessionSection {
    #[must_use]
    pub fn limits(&self) -> SessionLimits {
        SessionLimits {
            max_turns: self.max_turns,
            max_chars: self.max_chars,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct IndexSection {
    /// Persist the vector index to this JSON file; in-memory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("MICA_API_KEY")
            && !key.is_empty()
        {
            self.llm.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("MICA_BASE_URL")
            && !url.is_empty()
        {
            self.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("MICA_MODEL")
            && !model.is_empty()
        {
            self.llm.model = model;
        }
        if let Ok(model) = std::env::var("MICA_EMBEDDING_MODEL")
            && !model.is_empty()
        {
            self.llm.embedding_model = Some(model);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = Config::default();
        assert_eq!(config.llm.provider, ProviderKind::OpenAi);
        assert_eq!(config.segmenter.max_size, 500);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.session.max_turns, 10);
        assert!(config.index.path.is_none());
    }

    #[test]
    fn parses_partial_toml() {
        let raw = r#"
            [llm]
            provider = "proxy"
            proxy_name = "litellm"
            model = "gpt-4o-mini"
            base_url = "http://localhost:4000"
            max_tokens = 512
            temperature = 0.2

            [segmenter]
            strategy = "paragraph"
            max_size = 900
            overlap = 90
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.llm.provider, ProviderKind::Proxy);
        assert_eq!(config.llm.proxy_name.as_deref(), Some("litellm"));
        assert_eq!(config.segmenter.strategy, SegmentStrategy::Paragraph);
        assert_eq!(config.segmenter.max_size, 900);
        // Unspecified sections fall back to defaults.
        assert_eq!(config.retrieval.top_k, 3);
    }

    #[test]
    fn serializes_without_secrets_when_unset() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(!toml.contains("api_key"));
    }

    #[test]
    fn provider_kind_parse() {
        let config: Config = toml::from_str("[llm]\nprovider = \"claude\"\nmodel = \"m\"\nbase_url = \"u\"\nmax_tokens = 1\ntemperature = 0.0\n").unwrap();
        assert_eq!(config.llm.provider, ProviderKind::Claude);
        assert_eq!(config.llm.provider.to_string(), "claude");
    }

    #[test]
    fn segmenter_section_converts() {
        let section = SegmenterSection {
            strategy: SegmentStrategy::Fixed,
            max_size: 100,
            overlap: 10,
        };
        let config = section.to_segmenter_config();
        assert_eq!(config.strategy, SegmentStrategy::Fixed);
        assert_eq!(config.max_size, 100);
        assert_eq!(config.overlap, 10);
    }

    #[test]
    fn session_limits_conversion() {
        let section = SessionSection {
            max_turns: 4,
            max_chars: None,
            system_prompt: None,
        };
        let limits = section.limits();
        assert_eq!(limits.max_turns, 4);
        assert!(limits.max_chars.is_none());
    }
}
