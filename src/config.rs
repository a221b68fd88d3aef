//! Consul client configuration.
//!
//! Defaults follow the Consul client conventions and can be overridden from
//! the environment:
//!
//! - `CONSUL_HTTP_ADDR`: agent address, `host:port` or a full `http(s)://` URL
//! - `CONSUL_HTTP_SSL`: `true` / `1` selects https when no scheme is given
//! - `CONSUL_HTTP_TOKEN`: ACL token sent as `X-Consul-Token`

use std::time::Duration;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8500";

/// Configuration for [`crate::consul::ConsulClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Agent address, with or without scheme.
    /// Default: 127.0.0.1:8500
    pub address: String,

    /// Use https when `address` carries no scheme.
    /// Default: false
    pub tls: bool,

    /// ACL token.
    pub token: Option<String>,

    /// Datacenter to target instead of the agent's own.
    pub datacenter: Option<String>,

    /// Timeout for requests that do not block server-side.
    /// Default: 10s
    pub timeout: Duration,

    /// TTL of the session backing each lock.
    /// Default: 15s
    pub session_ttl: Duration,

    /// Lock delay applied after a session holding a lock is invalidated.
    /// Default: unset (server default)
    pub lock_delay: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            tls: false,
            token: None,
            datacenter: None,
            timeout: Duration::from_secs(10),
            session_ttl: Duration::from_secs(15),
            lock_delay: None,
        }
    }
}

impl ClientConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `CONSUL_HTTP_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(address) = lookup("CONSUL_HTTP_ADDR").filter(|v| !v.is_empty()) {
            config.address = address;
        }
        if let Some(ssl) = lookup("CONSUL_HTTP_SSL") {
            config.tls = matches!(ssl.to_ascii_lowercase().as_str(), "1" | "true");
        }
        config.token = lookup("CONSUL_HTTP_TOKEN").filter(|v| !v.is_empty());
        config
    }

    /// Base URL of the agent's HTTP API, always ending in `/`.
    pub fn base_url(&self) -> String {
        let address = self.address.trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            format!("{address}/")
        } else if self.tls {
            format!("https://{address}/")
        } else {
            format!("http://{address}/")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.base_url(), "http://127.0.0.1:8500/");
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("CONSUL_HTTP_ADDR", "consul.service:8501"),
            ("CONSUL_HTTP_SSL", "TRUE"),
            ("CONSUL_HTTP_TOKEN", "s3cr3t"),
        ]));
        assert_eq!(config.base_url(), "https://consul.service:8501/");
        assert_eq!(config.token.as_deref(), Some("s3cr3t"));
    }

    #[test]
    fn test_explicit_scheme_wins() {
        let mut config = ClientConfig::new("http://10.1.2.3:8500/");
        config.tls = true;
        assert_eq!(config.base_url(), "http://10.1.2.3:8500/");
    }

    #[test]
    fn test_empty_values_ignored() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("CONSUL_HTTP_ADDR", ""),
            ("CONSUL_HTTP_TOKEN", ""),
        ]));
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.token, None);
    }
}
