//! Configuration for the static supervisor.

use std::collections::BTreeMap;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

fn default_kex_ttl() -> Duration {
    Duration::from_secs(300)
}

/// Supervisor configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupervisorConfig {
    /// Accounts known at start-up: login name to its initial token. The
    /// token also serves as the account password.
    pub tokens: BTreeMap<String, SecretString>,

    /// Accounts waiting for activation.
    pub activation: ActivationConfig,

    /// Lifetime of a key exchange.
    #[serde(with = "soma_msg::duration")]
    pub kex_ttl: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            tokens: BTreeMap::new(),
            activation: ActivationConfig::default(),
            kex_ttl: default_kex_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivationConfig {
    /// Login names that may activate themselves.
    pub pending: Vec<String>,
    pub min_password_length: usize,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            min_password_length: 12,
        }
    }
}
