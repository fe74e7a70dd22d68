use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{RelayflowError, Result};

/// Top-level relayflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub host: HostConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Steps a single call may run before it is cut off.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_iterations() -> usize {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "relayflow=info,warn".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// Per-call timeout applied by the tool registry. None = no timeout.
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| RelayflowError::ConfigNotFound(path.display().to_string()))?;
        Self::parse(&content)
    }

    /// Load config if the file exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from TOML text, with env var expansion.
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let config: Self =
            toml::from_str(&expanded).map_err(|e| RelayflowError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.engine.max_iterations == 0 {
            return Err(RelayflowError::Config(
                "engine.max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn env_ref() -> &'static Regex {
    static ENV_REF: OnceLock<Regex> = OnceLock::new();
    ENV_REF.get_or_init(|| Regex::new(r"\$\{([^}]*)\}").expect("env reference pattern is valid"))
}

/// Expand `${ENV_VAR}` references. Unset variables are left as written.
fn expand_env_vars(input: &str) -> String {
    env_ref()
        .replace_all(input, |caps: &Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}
