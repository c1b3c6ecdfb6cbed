//! Procflow configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main Procflow configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level override (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Generative assistant configuration
    pub assistant: AssistantConfig,

    /// Diagram rendering service configuration
    pub renderer: RendererConfig,

    /// Retry and validation settings for the generation pipeline
    pub generation: GenerationConfig,

    /// Session lifetime settings
    pub sessions: SessionsConfig,

    /// Report dispatch settings
    pub report: ReportConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks numeric settings that would break the runtime, then that
    /// required environment variables are set.
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.generation.max_attempts == 0 {
            return Err(eyre::eyre!("generation.max-attempts must be at least 1"));
        }
        if self.sessions.sweep_interval_secs == 0 {
            return Err(eyre::eyre!("sessions.sweep-interval-secs must be at least 1"));
        }
        if std::env::var(&self.assistant.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "Assistant API key not found. Set the {} environment variable.",
                self.assistant.api_key_env
            ));
        }
        if std::env::var(&self.assistant.assistant_id_env).is_err() {
            return Err(eyre::eyre!(
                "Assistant id not found. Set the {} environment variable.",
                self.assistant.assistant_id_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .procflow.yml
        let local_config = PathBuf::from(".procflow.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/procflow/procflow.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("procflow").join("procflow.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Errors are swallowed: the full load reports them once logging is up.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Generative assistant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Environment variable containing the assistant id runs are started against
    #[serde(rename = "assistant-id-env")]
    pub assistant_id_env: String,

    /// Interval between run status polls in milliseconds
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on waiting for a run to finish in milliseconds
    #[serde(rename = "run-timeout-ms")]
    pub run_timeout_ms: u64,

    /// Per-request HTTP timeout in milliseconds
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Directory holding prompt template overrides
    #[serde(rename = "prompt-dir")]
    pub prompt_dir: Option<PathBuf>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            assistant_id_env: "ASSISTANT_ID".to_string(),
            poll_interval_ms: 2_000,
            run_timeout_ms: 120_000,
            request_timeout_ms: 60_000,
            prompt_dir: None,
        }
    }
}

impl AssistantConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).context(format!("{} is not set", self.api_key_env))
    }

    /// Read the assistant id from the configured environment variable
    pub fn assistant_id(&self) -> Result<String> {
        std::env::var(&self.assistant_id_env).context(format!("{} is not set", self.assistant_id_env))
    }
}

/// Diagram rendering service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Rendering server base URL; tokens are appended as `/svg/~1<token>`
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Resolution used when converting vector units to pixels
    pub dpi: f32,

    /// Scale factor applied to the vector image when rasterizing
    pub scale: f32,

    /// Per-request HTTP timeout in milliseconds
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            base_url: "http://www.plantuml.com/plantuml".to_string(),
            dpi: 300.0,
            scale: 2.0,
            request_timeout_ms: 30_000,
        }
    }
}

/// Generation pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum attempts per request before giving up
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Keywords that must appear in accepted diagram source
    #[serde(rename = "required-keywords")]
    pub required_keywords: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 2_000,
            required_keywords: Vec::new(),
        }
    }
}

impl GenerationConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Session lifetime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Absolute session lifetime in seconds
    #[serde(rename = "ttl-secs")]
    pub ttl_secs: u64,

    /// Silence after the last turn before the inactivity report fires
    #[serde(rename = "inactivity-secs")]
    pub inactivity_secs: u64,

    /// How often the housekeeper sweeps expired sessions
    #[serde(rename = "sweep-interval-secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            inactivity_secs: 10 * 60,
            sweep_interval_secs: 60 * 60,
        }
    }
}

impl SessionsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn inactivity(&self) -> Duration {
        Duration::from_secs(self.inactivity_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Report dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Whether inactivity reports are sent at all
    pub enabled: bool,

    /// Recipient used when a session has no contact
    #[serde(rename = "default-recipient")]
    pub default_recipient: Option<String>,

    /// From address for outgoing mail
    pub sender: String,

    /// Subject line for outgoing mail
    pub subject: String,

    /// SMTP transport settings
    pub smtp: SmtpConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_recipient: None,
            sender: "procflow@localhost".to_string(),
            subject: "Your process diagram".to_string(),
            smtp: SmtpConfig::default(),
        }
    }
}

/// SMTP transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,

    pub port: u16,

    /// Environment variable containing the SMTP username
    #[serde(rename = "username-env")]
    pub username_env: String,

    /// Environment variable containing the SMTP password
    #[serde(rename = "password-env")]
    pub password_env: String,

    /// Upgrade the connection with STARTTLS
    pub starttls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            username_env: "SMTP_USER".to_string(),
            password_env: "SMTP_PASS".to_string(),
            starttls: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.assistant.poll_interval_ms, 2_000);
        assert_eq!(config.generation.max_attempts, 3);
        assert_eq!(config.generation.retry_delay(), Duration::from_secs(2));
        assert_eq!(config.sessions.ttl(), Duration::from_secs(86_400));
        assert_eq!(config.sessions.inactivity(), Duration::from_secs(600));
        assert_eq!(config.renderer.dpi, 300.0);
        assert_eq!(config.renderer.scale, 2.0);
        assert!(config.generation.required_keywords.is_empty());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug

assistant:
  base-url: https://api.example.com
  api-key-env: MY_KEY
  assistant-id-env: MY_ASSISTANT
  poll-interval-ms: 500
  run-timeout-ms: 30000

renderer:
  base-url: http://localhost:8080
  dpi: 150

generation:
  max-attempts: 5
  retry-delay-ms: 100
  required-keywords: [start]

sessions:
  inactivity-secs: 60

report:
  default-recipient: ops@example.com
  smtp:
    host: smtp.example.com
    port: 2525
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.assistant.base_url, "https://api.example.com");
        assert_eq!(config.assistant.api_key_env, "MY_KEY");
        assert_eq!(config.assistant.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.renderer.base_url, "http://localhost:8080");
        assert_eq!(config.renderer.dpi, 150.0);
        assert_eq!(config.generation.max_attempts, 5);
        assert_eq!(config.generation.required_keywords, vec!["start".to_string()]);
        assert_eq!(config.sessions.inactivity(), Duration::from_secs(60));
        assert_eq!(config.report.default_recipient.as_deref(), Some("ops@example.com"));
        assert_eq!(config.report.smtp.port, 2525);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
renderer:
  scale: 1.5
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.renderer.scale, 1.5);

        // Defaults for unspecified
        assert_eq!(config.renderer.dpi, 300.0);
        assert_eq!(config.assistant.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.sessions.ttl_secs, 86_400);
        assert!(config.report.enabled);
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yml");
        fs::write(&path, "generation:\n  max-attempts: 7\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.generation.max_attempts, 7);
    }

    #[test]
    fn test_load_explicit_path_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yml");

        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    #[serial]
    fn test_load_project_local_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".procflow.yml"), "log-level: warn\n").unwrap();

        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let level = Config::load_log_level(None);
        std::env::set_current_dir(previous).unwrap();

        assert_eq!(level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_validate_reports_missing_key() {
        let mut config = Config::default();
        config.assistant.api_key_env = "PROCFLOW_TEST_SURELY_UNSET_KEY".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("PROCFLOW_TEST_SURELY_UNSET_KEY"));
    }

    #[test]
    fn test_validate_rejects_zero_sweep_interval() {
        let config: Config = serde_yaml::from_str("sessions:\n  sweep-interval-secs: 0\n").unwrap();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sweep-interval-secs"));
    }
}
