//! Server configuration: defaults, then the YAML file, then `SOMA__`
//! environment variables, then command line flags.

use std::path::PathBuf;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use perm_cache::catalog::RootAccount;
use rest_gateway::RestConfig;
use serde::Deserialize;
use supervisor::SupervisorConfig;

pub const ENV_PREFIX: &str = "SOMA__";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub rest: RestConfig,
    pub supervisor: SupervisorConfig,
    pub bootstrap: BootstrapConfig,
    pub logging: LoggingConfig,
}

/// Initial owner replayed into the permission cache at start-up.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapConfig {
    pub user_id: String,
    pub user_name: String,
    pub team_id: String,
    pub team_name: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            user_id: "00000000-0000-0000-0000-000000000001".to_owned(),
            user_name: "root".to_owned(),
            team_id: "00000000-0000-0000-0000-000000000002".to_owned(),
            team_name: "wheel".to_owned(),
        }
    }
}

impl BootstrapConfig {
    #[must_use]
    pub fn root_account(&self) -> RootAccount {
        RootAccount {
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            team_id: self.team_id.clone(),
            team_name: self.team_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Text,
        }
    }
}

/// Values given on the command line. Unset fields leave the lower layers
/// alone.
#[derive(Debug, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub log_level: Option<String>,
    pub read_only: bool,
    pub observer: bool,
}

/// Merges every configuration layer and extracts the result.
///
/// # Errors
/// Unreadable files, unknown keys and values of the wrong type.
pub fn load(overrides: &Overrides) -> Result<AppConfig, Box<figment::Error>> {
    let mut figment = Figment::new();
    if let Some(path) = &overrides.config {
        figment = figment.merge(Yaml::file_exact(path));
    }
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    if let Some(addr) = &overrides.bind_addr {
        figment = figment.merge(Serialized::default("rest.bind_addr", addr));
    }
    if let Some(level) = &overrides.log_level {
        figment = figment.merge(Serialized::default("logging.level", level));
    }
    if overrides.read_only {
        figment = figment.merge(Serialized::default("rest.read_only", true));
    }
    if overrides.observer {
        figment = figment.merge(Serialized::default("rest.observer", true));
    }
    figment.extract().map_err(Box::new)
}
