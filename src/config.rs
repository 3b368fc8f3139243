//! Task runner configuration
//!
//! Loaded from a TOML file. Secrets never live in the file: every credential
//! is named by the environment variable that holds it and resolved at
//! runtime.

use crate::content::chunker::{MAX_CHUNK, STORE_TEXT_LIMIT};
use crate::notion::PageStatus;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Files tried in order when no `--config` is given
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["taskrunner.toml", "config/taskrunner.toml"];

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRunnerConfig {
    pub notion: NotionSection,
    pub llm: LlmSection,
    /// Research handler settings; the handler is disabled when absent
    pub research: Option<ResearchSection>,
    #[serde(default)]
    pub poller: PollerSection,
    #[serde(default)]
    pub content: ContentSection,
    /// Health endpoint settings; no server is started when absent
    pub health: Option<HealthSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotionSection {
    pub database_id: String,
    #[serde(default = "default_notion_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_notion_base_url")]
    pub base_url: String,
    #[serde(default = "default_notion_version")]
    pub notion_version: String,
    #[serde(default = "default_title_property")]
    pub title_property: String,
    #[serde(default = "default_status_property")]
    pub status_property: String,
    #[serde(default = "default_response_property")]
    pub response_property: String,
    #[serde(default)]
    pub statuses: StatusNames,
}

/// Display names of the status options in the database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatusNames {
    pub execute: String,
    pub iterate: String,
    pub in_progress: String,
    pub review: String,
    pub error: String,
}

impl Default for StatusNames {
    fn default() -> Self {
        Self {
            execute: "Execute".to_string(),
            iterate: "Iterate".to_string(),
            in_progress: "In progress".to_string(),
            review: "Review".to_string(),
            error: "Error".to_string(),
        }
    }
}

impl StatusNames {
    pub fn name(&self, status: PageStatus) -> &str {
        match status {
            PageStatus::Execute => &self.execute,
            PageStatus::Iterate => &self.iterate,
            PageStatus::InProgress => &self.in_progress,
            PageStatus::Review => &self.review,
            PageStatus::Error => &self.error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name; only "openai" is supported
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchSection {
    #[serde(default = "default_search_key_env")]
    pub search_api_key_env: String,
    #[serde(default = "default_search_url")]
    pub search_url: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollerSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
}

impl Default for PollerSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            handler_timeout_secs: default_handler_timeout_secs(),
        }
    }
}

impl PollerSection {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentSection {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for ContentSection {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthSection {
    pub port: u16,
}

fn default_notion_key_env() -> String {
    "NOTION_API_KEY".to_string()
}

fn default_notion_base_url() -> String {
    "https://api.notion.com/v1".to_string()
}

fn default_notion_version() -> String {
    "2022-06-28".to_string()
}

fn default_title_property() -> String {
    "Task".to_string()
}

fn default_status_property() -> String {
    "Status".to_string()
}

fn default_response_property() -> String {
    "Response".to_string()
}

fn default_llm_provider() -> String {
    "openai".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_search_key_env() -> String {
    "SERPER_API_KEY".to_string()
}

fn default_search_url() -> String {
    "https://google.serper.dev/search".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_max_queries() -> usize {
    3
}

fn default_interval_secs() -> u64 {
    300 // 5 minutes
}

fn default_error_backoff_secs() -> u64 {
    60
}

fn default_handler_timeout_secs() -> u64 {
    300
}

fn default_chunk_size() -> usize {
    MAX_CHUNK
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to render TOML: {0}")]
    TomlRender(#[from] toml::ser::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("No config file found (tried {0})")]
    NotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TaskRunnerConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: TaskRunnerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise from the first default location that exists
    pub fn discover(path: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        if let Some(path) = path {
            return Ok((Self::load_from_file(path)?, path.to_path_buf()));
        }

        let found = DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| ConfigError::NotFound(DEFAULT_CONFIG_PATHS.join(", ")))?;

        Ok((Self::load_from_file(&found)?, found))
    }

    /// Render the configuration back to TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notion.database_id.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "notion.database_id must not be empty".to_string(),
            ));
        }
        validate_url("notion.base_url", &self.notion.base_url)?;

        if self.llm.provider != "openai" {
            return Err(ConfigError::InvalidConfig(format!(
                "Unsupported LLM provider '{}', expected 'openai'",
                self.llm.provider
            )));
        }
        if let Some(base_url) = &self.llm.base_url {
            validate_url("llm.base_url", base_url)?;
        }
        if let Some(temperature) = self.llm.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidConfig(format!(
                    "llm.temperature must be between 0.0 and 2.0, got {temperature}"
                )));
            }
        }

        if let Some(research) = &self.research {
            validate_url("research.search_url", &research.search_url)?;
            if research.max_results == 0 || research.max_queries == 0 {
                return Err(ConfigError::InvalidConfig(
                    "research.max_results and research.max_queries must be positive".to_string(),
                ));
            }
        }

        if self.poller.interval_secs == 0
            || self.poller.error_backoff_secs == 0
            || self.poller.handler_timeout_secs == 0
        {
            return Err(ConfigError::InvalidConfig(
                "poller intervals and handler timeout must be positive".to_string(),
            ));
        }

        if !(1..=STORE_TEXT_LIMIT).contains(&self.content.chunk_size) {
            return Err(ConfigError::InvalidConfig(format!(
                "content.chunk_size must be between 1 and {STORE_TEXT_LIMIT}, got {}",
                self.content.chunk_size
            )));
        }

        Ok(())
    }

    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .ok()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Get the Notion integration token from its environment variable
    pub fn get_notion_api_key(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.notion.api_key_env)
    }

    /// Get the LLM API key from its environment variable
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.llm.api_key_env)
    }

    /// Get the search API key, `None` when research is not configured
    pub fn get_search_api_key(&self) -> Option<Result<String, ConfigError>> {
        self.research
            .as_ref()
            .map(|research| Self::get_env_var_required(&research.search_api_key_env))
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[notion]
database_id = "db-test"

[llm]
model = "gpt-4o-mini"
temperature = 0.0
"#;
        Self::from_toml_str(toml_content).expect("Test config should parse")
    }
}

fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value)
        .map_err(|e| ConfigError::InvalidConfig(format!("{field} is not a valid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::InvalidConfig(format!(
            "{field} must use http or https, got {scheme}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config = TaskRunnerConfig::test_config();

        assert_eq!(config.notion.database_id, "db-test");
        assert_eq!(config.notion.api_key_env, "NOTION_API_KEY");
        assert_eq!(config.notion.notion_version, "2022-06-28");
        assert_eq!(config.notion.title_property, "Task");
        assert_eq!(config.notion.statuses, StatusNames::default());
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.poller.interval_secs, 300);
        assert_eq!(config.poller.error_backoff_secs, 60);
        assert_eq!(config.poller.handler_timeout(), Duration::from_secs(300));
        assert_eq!(config.content.chunk_size, 1900);
        assert!(config.research.is_none());
        assert!(config.health.is_none());
    }

    #[test]
    fn test_status_names_partial_override() {
        let config = TaskRunnerConfig::from_toml_str(
            r#"
[notion]
database_id = "db"

[notion.statuses]
in_progress = "Working"

[llm]
"#,
        )
        .unwrap();

        let names = &config.notion.statuses;
        assert_eq!(names.name(PageStatus::InProgress), "Working");
        assert_eq!(names.name(PageStatus::Execute), "Execute");
        assert_eq!(names.name(PageStatus::Review), "Review");
    }

    #[test]
    fn test_research_section_defaults() {
        let config = TaskRunnerConfig::from_toml_str(
            r#"
[notion]
database_id = "db"

[llm]

[research]
"#,
        )
        .unwrap();

        let research = config.research.unwrap();
        assert_eq!(research.search_api_key_env, "SERPER_API_KEY");
        assert_eq!(research.search_url, "https://google.serper.dev/search");
        assert_eq!(research.max_results, 5);
        assert_eq!(research.max_queries, 3);
    }

    #[test]
    fn test_rejects_out_of_range_chunk_size() {
        for size in [0, 2001] {
            let toml = format!(
                "[notion]\ndatabase_id = \"db\"\n\n[llm]\n\n[content]\nchunk_size = {size}\n"
            );
            let result = TaskRunnerConfig::from_toml_str(&toml);
            assert!(matches!(result, Err(ConfigError::InvalidConfig(_))), "size {size}");
        }
    }

    #[test]
    fn test_rejects_unknown_provider_and_bad_url() {
        let result = TaskRunnerConfig::from_toml_str(
            "[notion]\ndatabase_id = \"db\"\n\n[llm]\nprovider = \"anthropic\"\n",
        );
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));

        let result = TaskRunnerConfig::from_toml_str(
            "[notion]\ndatabase_id = \"db\"\nbase_url = \"ftp://example.com\"\n\n[llm]\n",
        );
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_env_var() {
        let mut config = TaskRunnerConfig::test_config();
        config.llm.api_key_env = "TASKRUNNER_TEST_UNSET_KEY_VAR".to_string();

        let result = config.get_llm_api_key();
        assert!(matches!(result, Err(ConfigError::EnvVarNotFound(name)) if name == "TASKRUNNER_TEST_UNSET_KEY_VAR"));
        assert!(config.get_search_api_key().is_none());
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = TaskRunnerConfig::test_config();
        let rendered = config.to_toml_string().unwrap();
        let parsed = TaskRunnerConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
