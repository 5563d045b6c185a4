use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{DocentError, Result};

/// Environment variable overriding `completion.site_url`
pub const SITE_URL_ENV: &str = "DOCENT_SITE_URL";
/// Environment variable overriding `completion.app_name`
pub const APP_NAME_ENV: &str = "DOCENT_APP_NAME";

/// Main configuration structure for Docent
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Remote document acquisition
    #[serde(default)]
    pub source: SourceConfig,
    /// Per-client request throttling
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Grounding prompt assembly
    #[serde(default)]
    pub prompt: PromptConfig,
    /// Completion provider
    #[serde(default)]
    pub completion: CompletionConfig,
}

impl Config {
    /// Parse a config from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| DocentError::Config(format!("Failed to parse config: {e}")))
    }

    /// Read and parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DocentError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Load from an explicit path, or the first default location that exists
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        let default_paths = [
            dirs::home_dir().map(|h| h.join(".docent").join("config.toml")),
            dirs::config_dir().map(|c| c.join("docent").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Overlay values that come from the process environment.
    ///
    /// The lookup is injected so tests never touch the real environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.completion.api_key = lookup(&self.completion.api_key_env)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if let Some(site_url) = lookup(SITE_URL_ENV) {
            self.completion.site_url = Some(site_url);
        }
        if let Some(app_name) = lookup(APP_NAME_ENV) {
            self.completion.app_name = Some(app_name);
        }
    }

    /// Reject values outside the supported ranges
    pub fn validate(&self) -> Result<()> {
        let c = &self.completion;
        if !(0.3..=0.7).contains(&c.temperature) {
            return Err(DocentError::Config(format!(
                "completion.temperature must be within [0.3, 0.7], got {}",
                c.temperature
            )));
        }
        if !(1000..=1024).contains(&c.max_tokens) {
            return Err(DocentError::Config(format!(
                "completion.max_tokens must be within [1000, 1024], got {}",
                c.max_tokens
            )));
        }
        if !(0.0..=1.0).contains(&c.top_p) {
            return Err(DocentError::Config(format!(
                "completion.top_p must be within [0.0, 1.0], got {}",
                c.top_p
            )));
        }
        Url::parse(&c.api_url)
            .map_err(|e| DocentError::Config(format!("Invalid completion.api_url: {e}")))?;

        Url::parse(&self.source.primary_url)
            .map_err(|e| DocentError::Config(format!("Invalid source.primary_url: {e}")))?;
        if let Some(ref backup) = self.source.backup_url {
            Url::parse(backup)
                .map_err(|e| DocentError::Config(format!("Invalid source.backup_url: {e}")))?;
        }

        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            return Err(DocentError::Config(
                "rate_limit.max_requests and rate_limit.window_secs must be non-zero".to_string(),
            ));
        }
        if self.prompt.max_content_chars < 2 {
            return Err(DocentError::Config(
                "prompt.max_content_chars must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:3000")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Upper bound on total handling time of one inbound request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Peers whose `X-Forwarded-For` / `X-Real-IP` headers are believed.
    /// Empty means clients are identified by socket address only.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            request_timeout_secs: default_request_timeout_secs(),
            trusted_proxies: Vec::new(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// Remote document acquisition configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Primary document URL
    #[serde(default = "default_primary_url")]
    pub primary_url: String,
    /// Secondary URL tried once the primary is exhausted
    #[serde(default = "default_backup_url")]
    pub backup_url: Option<String>,
    /// Retries per URL after the initial attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff base; retry n waits `base_delay_ms * 2^n`
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Timeout of a single GET
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    /// Bound on the whole acquisition, retries and backup included
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// How long a live document is reused before refetching (0 disables)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Replaces the bundled fallback text
    #[serde(default)]
    pub fallback_text: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            primary_url: default_primary_url(),
            backup_url: default_backup_url(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            deadline_secs: default_deadline_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            fallback_text: None,
        }
    }
}

fn default_primary_url() -> String {
    "https://www.canada.ca/en/department-national-defence/services/benefits-military/pay-pension-benefits/benefits/canadian-forces-temporary-duty-travel-instructions.html".to_string()
}

fn default_backup_url() -> Option<String> {
    Some("https://www.canada.ca/en/department-national-defence/corporate/policies-standards/canadian-forces-temporary-duty-travel-instructions.html".to_string())
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_attempt_timeout_secs() -> u64 {
    5
}

fn default_deadline_secs() -> u64 {
    10
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

/// Sliding-window rate limit configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests admitted per client per window
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

fn default_max_requests() -> usize {
    10
}

fn default_window_secs() -> u64 {
    60
}

/// Grounding prompt configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptConfig {
    /// Human-readable name of the document, used in the system instruction
    #[serde(default = "default_document_title")]
    pub document_title: String,
    /// Embedded content beyond this many characters is truncated
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            document_title: default_document_title(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

fn default_document_title() -> String {
    "Canadian Forces Temporary Duty Travel Instructions (CFTDTI)".to_string()
}

fn default_max_content_chars() -> usize {
    15000
}

/// Completion provider configuration (OpenAI-compatible API)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionConfig {
    /// API base URL; `/chat/completions` is appended
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Environment variable name for API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Resolved from `api_key_env`, never read from the file
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Request timeout in seconds
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
    /// Sent as `HTTP-Referer`
    #[serde(default)]
    pub site_url: Option<String>,
    /// Sent as `X-Title`
    #[serde(default)]
    pub app_name: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key_env: default_api_key_env(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            timeout_secs: default_completion_timeout_secs(),
            site_url: None,
            app_name: None,
        }
    }
}

fn default_api_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_model() -> String {
    "google/gemini-flash-1.5-8b".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_top_p() -> f32 {
    0.9
}

fn default_completion_timeout_secs() -> u64 {
    60
}
