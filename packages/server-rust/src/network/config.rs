//! HTTP listener configuration.

use std::time::Duration;

/// Where the query API listens and how much work one request may cost.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub host: String,
    /// 0 lets the OS pick.
    pub port: u16,
    /// `"*"` allows any origin.
    pub cors_origins: Vec<String>,
    /// Covers translation and store execution together.
    pub request_timeout: Duration,
    /// Request bodies (query text, inline schemas, find filters) above this
    /// are rejected with 413.
    pub max_body_bytes: usize,
    /// Grace period for in-flight queries once shutdown starts.
    pub drain_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            max_body_bytes: 1024 * 1024,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

impl NetworkConfig {
    /// `host:port` string handed to the listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_config_defaults() {
        let config = NetworkConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 0);
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_body_bytes, 1_048_576);
        assert_eq!(config.drain_timeout, Duration::from_secs(30));
        assert_eq!(config.bind_addr(), "0.0.0.0:0");
    }
}
