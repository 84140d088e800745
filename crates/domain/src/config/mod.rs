mod recipes;
mod server;

pub use recipes::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub recipes: RecipesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

impl Config {
    pub fn from_toml_str(raw: &str) -> crate::error::Result<Config> {
        toml::from_str(raw).map_err(|e| crate::error::Error::Config(e.to_string()))
    }

    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Config> {
        let raw = std::fs::read_to_string(path)?;
        Config::from_toml_str(&raw)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logging
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "d_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: d_log_level(),
            json: false,
        }
    }
}

fn d_log_level() -> String {
    "info".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admin / auth (ambient, not a spec feature — see DESIGN.md)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Environment variable holding the API bearer token. If unset, the
    /// gateway runs in dev mode with auth disabled.
    #[serde(default = "d_api_token_env")]
    pub api_token_env: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            api_token_env: d_api_token_env(),
        }
    }
}

fn d_api_token_env() -> String {
    "COOKLINE_API_TOKEN".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validates the configuration and returns every issue found. An
    /// empty vec means the config is good to run with. Callers should
    /// bail at startup if any `ConfigSeverity::Error` is present.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        match self.recipes.source {
            RecipesSource::Local => {
                if self.recipes.dir.is_none() {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: "recipes.dir".into(),
                        message: "recipes.source = \"local\" requires recipes.dir".into(),
                    });
                }
            }
            RecipesSource::Remote => {
                match &self.recipes.manifest_url {
                    None => errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: "recipes.manifest_url".into(),
                        message: "recipes.source = \"remote\" requires recipes.manifest_url".into(),
                    }),
                    Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                        errors.push(ConfigError {
                            severity: ConfigSeverity::Error,
                            field: "recipes.manifest_url".into(),
                            message: format!(
                                "manifest_url must start with http:// or https:// (got \"{url}\")"
                            ),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        if std::env::var(&self.admin.api_token_env).is_err() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "admin.api_token_env".into(),
                message: format!(
                    "{} is not set; running with auth disabled (dev mode)",
                    self.admin.api_token_env
                ),
            });
        }

        errors
    }

    pub fn has_blocking_errors(errors: &[ConfigError]) -> bool {
        errors.iter().any(|e| e.severity == ConfigSeverity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_only_warns_about_missing_token() {
        let cfg = Config::default();
        let errors = cfg.validate();
        assert!(!Config::has_blocking_errors(&errors), "{errors:?}");
    }

    #[test]
    fn remote_without_manifest_url_is_an_error() {
        let mut cfg = Config::default();
        cfg.recipes.source = RecipesSource::Remote;
        cfg.recipes.manifest_url = None;
        let errors = cfg.validate();
        assert!(Config::has_blocking_errors(&errors));
    }

    #[test]
    fn port_zero_is_an_error() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        let errors = cfg.validate();
        assert!(Config::has_blocking_errors(&errors));
    }
}
