use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::agent::AgentConfig;
use crate::domain::faq::Faq;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub admission: AdmissionConfig,
    pub logging: LoggingConfig,
    pub seed: SeedConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    /// Primary model identifier, tried first.
    pub model: String,
    /// Ordered fallback model identifiers, advanced to on "model not found".
    pub fallback_models: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AdmissionConfig {
    /// Maximum number of distinct sessions processed concurrently.
    pub max_concurrent_sessions: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Agents and FAQs loaded into the in-memory store at bootstrap.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    pub faqs: Vec<Faq>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidValue {
                field: "logging.format".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub max_concurrent_sessions: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid value `{value}` for `{field}`")]
    InvalidValue { field: String, value: String },
    #[error("invalid environment value for `{var}`: {value}")]
    InvalidEnvValue { var: &'static str, value: String },
}

/// Optional TOML shape; every absent field keeps its default.
#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    llm: Option<LlmPatch>,
    admission: Option<AdmissionPatch>,
    logging: Option<LoggingPatch>,
    seed: Option<SeedConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    fallback_models: Option<Vec<String>>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AdmissionPatch {
    max_concurrent_sessions: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            llm: LlmConfig {
                base_url: "https://api.x.ai/v1".to_string(),
                api_key: None,
                model: "grok-beta".to_string(),
                fallback_models: Vec::new(),
                timeout_secs: 30,
            },
            admission: AdmissionConfig { max_concurrent_sessions: 2 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            seed: SeedConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file (when present), then environment
    /// variables, then programmatic overrides. Later layers win.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let resolved = resolve_config_path(options.config_path.as_deref());
        match resolved {
            Some(path) => config.apply_patch(read_patch(&path)?),
            None if options.require_file => {
                return Err(ConfigError::MissingConfigFile(
                    options.config_path.unwrap_or_else(|| PathBuf::from("helpline.toml")),
                ));
            }
            None => {}
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;
        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key.into());
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(fallback_models) = llm.fallback_models {
                self.llm.fallback_models = fallback_models;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(admission) = patch.admission {
            if let Some(max_concurrent_sessions) = admission.max_concurrent_sessions {
                self.admission.max_concurrent_sessions = max_concurrent_sessions;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(seed) = patch.seed {
            self.seed = seed;
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HELPLINE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("HELPLINE_SERVER_PORT") {
            self.server.port = value.parse().map_err(|_| ConfigError::InvalidEnvValue {
                var: "HELPLINE_SERVER_PORT",
                value,
            })?;
        }

        if let Some(value) = read_env("HELPLINE_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("HELPLINE_LLM_API_KEY") {
            self.llm.api_key = Some(value.into());
        }
        if let Some(value) = read_env("HELPLINE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("HELPLINE_LLM_FALLBACK_MODELS") {
            self.llm.fallback_models =
                value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(Into::into).collect();
        }
        if let Some(value) = read_env("HELPLINE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = value.parse().map_err(|_| ConfigError::InvalidEnvValue {
                var: "HELPLINE_LLM_TIMEOUT_SECS",
                value,
            })?;
        }

        if let Some(value) = read_env("HELPLINE_MAX_CONCURRENT_SESSIONS") {
            self.admission.max_concurrent_sessions =
                value.parse().map_err(|_| ConfigError::InvalidEnvValue {
                    var: "HELPLINE_MAX_CONCURRENT_SESSIONS",
                    value,
                })?;
        }

        if let Some(value) = read_env("HELPLINE_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("HELPLINE_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(llm_api_key.into());
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(max_concurrent_sessions) = overrides.max_concurrent_sessions {
            self.admission.max_concurrent_sessions = max_concurrent_sessions;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admission.max_concurrent_sessions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "admission.max_concurrent_sessions".to_string(),
                value: "0".to_string(),
            });
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.timeout_secs".to_string(),
                value: "0".to_string(),
            });
        }
        for agent in &self.seed.agents {
            if !(0.5..=0.9).contains(&agent.confidence_threshold) {
                return Err(ConfigError::InvalidValue {
                    field: format!("seed.agents.{}.confidence_threshold", agent.agent_id),
                    value: agent.confidence_threshold.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("helpline.toml"), PathBuf::from("config/helpline.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str::<ConfigPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};

    #[test]
    fn defaults_match_the_documented_limits() {
        let config = AppConfig::load(LoadOptions::default()).unwrap();
        assert_eq!(config.admission.max_concurrent_sessions, 2);
        assert_eq!(config.llm.model, "grok-beta");
        assert!(config.llm.fallback_models.is_empty());
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn toml_file_patches_defaults_and_seeds_agents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [llm]
            model = "grok-3"
            fallback_models = ["grok-beta", "grok-2"]

            [logging]
            format = "json"

            [[seed.agents]]
            agent_id = "default-agent"
            name = "Support"
            persona = "You are a concise support agent."
            language_mode = "english"
            safety_mode = "strict"
            confidence_threshold = 0.7

            [[seed.faqs]]
            agent_id = "default-agent"
            question = "What is your return policy?"
            answer = "30 days, no questions asked."
            "#
        )
        .unwrap();

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            ..LoadOptions::default()
        })
        .unwrap();

        assert_eq!(config.llm.model, "grok-3");
        assert_eq!(config.llm.fallback_models, vec!["grok-beta", "grok-2"]);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.seed.agents.len(), 1);
        assert_eq!(config.seed.faqs.len(), 1);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("does/not/exist.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn programmatic_overrides_win() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                llm_model: Some("grok-4".to_string()),
                max_concurrent_sessions: Some(8),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .unwrap();

        assert_eq!(config.llm.model, "grok-4");
        assert_eq!(config.admission.max_concurrent_sessions, 8);
    }

    #[test]
    fn out_of_range_seed_threshold_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [[seed.agents]]
            agent_id = "default-agent"
            name = "Support"
            persona = "p"
            language_mode = "english"
            safety_mode = "balanced"
            confidence_threshold = 0.3
            "#
        )
        .unwrap();

        let result = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            ..LoadOptions::default()
        });
        assert!(result.is_err());
    }
}
