//! Listener settings for the scrape endpoint and dashboard.

use crate::error::{PulseError, Result};
use serde::{Deserialize, Serialize};

/// Where the HTTP endpoint listens and which headers it adds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Interface to listen on; IPv6 literals may be given with or without brackets
    pub host: String,
    /// TCP port (0 picks a free port)
    pub port: u16,
    /// Send permissive CORS headers so other origins can scrape `/metrics`
    pub enable_cors: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_WEB_PORT,
            enable_cors: true,
        }
    }
}

impl WebConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_cors(mut self, enable_cors: bool) -> Self {
        self.enable_cors = enable_cors;
        self
    }

    /// Reject a blank host before trying to bind.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(PulseError::config_error("web host must not be empty"));
        }
        Ok(())
    }

    /// `host:port`, bracketing bare IPv6 literals (`::1` becomes `[::1]:port`).
    pub fn bind_address(&self) -> String {
        let host = self.host.trim();
        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_and_hostname_addresses() {
        assert_eq!(WebConfig::new("0.0.0.0", 8000).bind_address(), "0.0.0.0:8000");
        assert_eq!(WebConfig::new("localhost", 9100).bind_address(), "localhost:9100");
    }

    #[test]
    fn test_ipv6_hosts_are_bracketed() {
        assert_eq!(WebConfig::new("::", 8000).bind_address(), "[::]:8000");
        assert_eq!(WebConfig::new("[::1]", 8000).bind_address(), "[::1]:8000");
    }

    #[test]
    fn test_blank_host_is_rejected() {
        let config = WebConfig::new("  ", 8000);
        assert!(matches!(config.validate(), Err(PulseError::Config(_))));
        assert!(WebConfig::default().validate().is_ok());
    }
}
