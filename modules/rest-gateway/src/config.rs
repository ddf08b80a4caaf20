use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_bind_addr() -> String {
    "127.0.0.1:8888".to_owned()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_owned()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_body_limit_bytes() -> usize {
    1024 * 1024
}

/// REST boundary configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
#[allow(clippy::struct_excessive_bools)]
pub struct RestConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Reported in the `X-Version` ping header.
    #[serde(default = "default_version")]
    pub version: String,

    /// Refuse every request that would change state.
    #[serde(default)]
    pub read_only: bool,

    /// Read-only, and additionally refuse supervisor writes other than key
    /// exchange and basic authentication.
    #[serde(default)]
    pub observer: bool,

    /// Skip authentication and authorization. Test and development only.
    #[serde(default)]
    pub open_instance: bool,

    /// How long an adapter waits for the handler's reply.
    #[serde(default = "default_request_timeout", with = "soma_msg::duration")]
    pub request_timeout: Duration,

    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,

    #[serde(default)]
    pub tls: TlsConfig,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            version: default_version(),
            read_only: false,
            observer: false,
            open_instance: false,
            request_timeout: default_request_timeout(),
            body_limit_bytes: default_body_limit_bytes(),
            tls: TlsConfig::default(),
        }
    }
}

impl RestConfig {
    #[must_use]
    pub const fn mode(&self) -> Mode {
        if self.observer {
            Mode::Observer
        } else if self.read_only {
            Mode::ReadOnly
        } else {
            Mode::Normal
        }
    }
}

/// TLS listener settings. Termination happens in front of the service;
/// enabling it here is refused at start-up.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct TlsConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,
}

/// Operating mode advertised in the `X-SOMA-Mode` ping header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    ReadOnly,
    Observer,
}

impl Mode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::ReadOnly => "read-only",
            Self::Observer => "observer",
        }
    }
}
