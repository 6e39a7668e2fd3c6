//! Configuration management
//!
//! Settings are resolved in the following priority order:
//! 1. Environment variables
//! 2. sp-gateway.toml configuration file
//! 3. Defaults
//!
//! `${VAR_NAME}` references inside the configuration file are expanded
//! from the environment before parsing.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Error;

/// LLM Provider type
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Anthropic Claude API
    #[default]
    Claude,
    /// OpenAI-compatible API
    OpenAi,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key; when empty the assistant runs in offline fallback mode
    #[serde(default)]
    pub api_key: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// API provider
    #[serde(default)]
    pub provider: LlmProvider,

    /// Base URL (optional, for custom endpoints)
    pub base_url: Option<String>,

    /// Maximum conversation-history messages sent with each reply request
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            provider: LlmProvider::Claude,
            base_url: None,
            context_window: default_context_window(),
        }
    }
}

/// WebSocket server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port for the WebSocket server
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty means any origin
    #[serde(default)]
    pub allowed_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            allowed_origins: None,
        }
    }
}

/// Browser engine and session-lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Whether to run the engine in headless mode
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Viewport width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Viewport height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Navigation timeout in seconds
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Sessions idle longer than this are reclaimed
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Interval between idle sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// JPEG quality for transported screenshots (1-100)
    #[serde(default = "default_screenshot_quality")]
    pub screenshot_quality: u8,

    /// Settle delay after form filling, for dynamic page reactions
    #[serde(default = "default_form_settle")]
    pub form_settle_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            width: default_width(),
            height: default_height(),
            navigation_timeout_secs: default_navigation_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            screenshot_quality: default_screenshot_quality(),
            form_settle_ms: default_form_settle(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_context_window() -> usize {
    12
}

fn default_port() -> u16 {
    3001
}

fn default_true() -> bool {
    true
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_navigation_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    30 * 60
}

fn default_sweep_interval() -> u64 {
    5 * 60
}

fn default_screenshot_quality() -> u8 {
    80
}

fn default_form_settle() -> u64 {
    1000
}

/// Main configuration for sp-gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// LLM configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// WebSocket server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Browser configuration
    #[serde(default)]
    pub browser: BrowserSettings,
}

impl Config {
    /// Expand `${VAR_NAME}` references from the environment.
    ///
    /// Unset variables expand to the empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // consume '{'

                let mut var_name = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '}' {
                        chars.next(); // consume '}'
                        break;
                    }
                    var_name.push(chars.next().unwrap());
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load configuration from a TOML file.
    ///
    /// `${VAR_NAME}` references in the file are expanded from the
    /// environment first; environment variables then override the
    /// parsed values.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let expanded_content = Self::expand_env_vars(&toml_content);

        let mut config: Config = toml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        config.apply_env_overrides();

        Ok(config)
    }

    /// Load configuration from the default path.
    ///
    /// Tries `./sp-gateway.toml` first, then falls back to environment
    /// variables only.
    pub fn load() -> crate::Result<Self> {
        if Path::new("sp-gateway.toml").exists() {
            return Self::from_toml_file("sp-gateway.toml");
        }

        Ok(Self::from_env())
    }

    /// Build configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Override settings from environment variables.
    fn apply_env_overrides(&mut self) {
        if let Ok(api_key) = std::env::var("LLM_API_KEY") {
            self.llm.api_key = api_key;
        }

        if let Ok(model) = std::env::var("LLM_MODEL") {
            if !model.is_empty() {
                self.llm.model = model;
            }
        }

        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            if !provider.is_empty() {
                self.llm.provider = match provider.to_lowercase().as_str() {
                    "openai" | "glm" | "zai" | "minimax" => LlmProvider::OpenAi,
                    _ => LlmProvider::Claude,
                };
            }
        }

        if let Ok(base_url) = std::env::var("LLM_BASE_URL") {
            if !base_url.is_empty() {
                self.llm.base_url = Some(base_url);
            }
        }

        if let Ok(port) = std::env::var("WS_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        if let Ok(origins) = std::env::var("ALLOWED_ORIGINS") {
            self.server.allowed_origins =
                Some(origins.split(',').map(|s| s.trim().to_string()).collect());
        }

        if let Ok(headless) = std::env::var("BROWSER_HEADLESS") {
            self.browser.headless = headless.to_lowercase() != "false";
        }

        if let Ok(timeout) = std::env::var("BROWSER_IDLE_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                self.browser.idle_timeout_secs = t;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3001);
        assert!(config.browser.headless);
        assert_eq!(config.browser.width, 1280);
        assert_eq!(config.browser.height, 720);
        assert_eq!(config.browser.navigation_timeout_secs, 30);
        assert_eq!(config.browser.idle_timeout_secs, 30 * 60);
        assert_eq!(config.browser.sweep_interval_secs, 5 * 60);
        assert_eq!(config.browser.screenshot_quality, 80);
    }

    #[test]
    fn test_expand_env_vars() {
        unsafe { std::env::set_var("SP_TEST_EXPAND", "secret") };
        assert_eq!(
            Config::expand_env_vars("key = \"${SP_TEST_EXPAND}\""),
            "key = \"secret\""
        );
        assert_eq!(
            Config::expand_env_vars("key = \"${SP_TEST_UNSET_VAR}\""),
            "key = \"\""
        );
        assert_eq!(Config::expand_env_vars("plain text"), "plain text");
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
            [llm]
            api_key = "k"
            provider = "openai"

            [browser]
            idle_timeout_secs = 60
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.llm.api_key, "k");
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.browser.idle_timeout_secs, 60);
        // untouched sections keep their defaults
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.browser.width, 1280);
    }
}
