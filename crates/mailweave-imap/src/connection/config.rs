//! Connection configuration types.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::pipeline::PipelineConfig;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 143).
    StartTls,
    /// TLS from the start (port 993). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 143,
            Self::Implicit => 993,
        }
    }
}

/// IMAP session configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Per-operation read/write timeout. Exceeding a read timeout is
    /// terminal for the session.
    pub io_timeout: Duration,
    /// Messages per FETCH batch when ranges are split.
    pub fetch_batch_size: usize,
    /// Chunk size for streamed body retrieval.
    pub transfer_chunk_size: u64,
    /// Pipelining behavior.
    pub pipeline: PipelineConfig,
    /// Cancellation signal checked at every suspension point.
    pub cancellation: CancellationToken,
}

impl Config {
    /// Creates a new configuration with implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 993,
            security: Security::Implicit,
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(60),
            fetch_batch_size: 100,
            transfer_chunk_size: 64 * 1024,
            pipeline: PipelineConfig::default(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builder for session configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
    port: Option<u16>,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            config: Config::new(host),
            port: None,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.config.security = security;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Sets the fetch batch size.
    #[must_use]
    pub fn fetch_batch_size(mut self, size: usize) -> Self {
        self.config.fetch_batch_size = size.max(1);
        self
    }

    /// Sets the streamed-transfer chunk size.
    #[must_use]
    pub fn transfer_chunk_size(mut self, size: u64) -> Self {
        self.config.transfer_chunk_size = size.max(1024);
        self
    }

    /// Sets the pipelining configuration.
    #[must_use]
    pub fn pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.config.pipeline = pipeline;
        self
    }

    /// Installs a cancellation token shared with the caller.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.config.cancellation = token;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(mut self) -> Config {
        self.config.port = self
            .port
            .unwrap_or_else(|| self.config.security.default_port());
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::StartTls.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn config_new() {
        let config = Config::new("imap.example.com");
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
    }

    #[test]
    fn builder_defaults_port_from_security() {
        let config = Config::builder("imap.example.com")
            .security(Security::StartTls)
            .build();
        assert_eq!(config.port, 143);
    }

    #[test]
    fn builder_explicit_port_wins() {
        let config = Config::builder("imap.example.com")
            .security(Security::StartTls)
            .port(1143)
            .build();
        assert_eq!(config.port, 1143);
    }

    #[test]
    fn builder_clamps_sizes() {
        let config = Config::builder("h").fetch_batch_size(0).transfer_chunk_size(1).build();
        assert_eq!(config.fetch_batch_size, 1);
        assert_eq!(config.transfer_chunk_size, 1024);
    }
}
