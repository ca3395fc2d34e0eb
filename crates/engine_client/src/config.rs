//! Client configuration.

use std::time::Duration;

use engine_net::{Compression, DEFAULT_HANDSHAKE_TIMEOUT, server_addr_from_env};
use engine_world::TickConfig;

/// Configuration for a client process.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// The id this client introduces itself with. It becomes the `updater`
    /// of every entity the client creates.
    pub peer_id: String,
    /// Optional server address override (defaults to `ENGINE_SERVER_ADDR`
    /// or `127.0.0.1:5560`).
    pub server_addr: Option<String>,
    /// Simulation and network cadences.
    pub tick: TickConfig,
    /// Compression to ask the server for.
    pub compression: Compression,
    /// Bound on the handshake.
    pub handshake_timeout: Duration,
}

impl ClientConfig {
    /// Create a config with default cadences and deflate requested.
    #[must_use]
    pub fn new(peer_id: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            server_addr: None,
            tick: TickConfig::default(),
            compression: Compression::Deflate,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Override the server address.
    #[must_use]
    pub fn with_server_addr(mut self, addr: impl Into<String>) -> Self {
        self.server_addr = Some(addr.into());
        self
    }

    /// Set the tick cadences.
    #[must_use]
    pub fn with_tick(mut self, tick: TickConfig) -> Self {
        self.tick = tick;
        self
    }

    /// Set the compression to ask for.
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the handshake timeout.
    #[must_use]
    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    /// The address to dial.
    #[must_use]
    pub fn server_addr(&self) -> String {
        self.server_addr.clone().unwrap_or_else(server_addr_from_env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("c1");
        assert_eq!(config.peer_id, "c1");
        assert_eq!(config.compression, Compression::Deflate);
        assert_eq!(config.tick, TickConfig::default());
        assert_eq!(config.handshake_timeout, DEFAULT_HANDSHAKE_TIMEOUT);
    }

    #[test]
    fn test_server_addr_override() {
        let config = ClientConfig::new("c1").with_server_addr("10.0.0.2:6000");
        assert_eq!(config.server_addr(), "10.0.0.2:6000");
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("c1")
            .with_tick(TickConfig::default().with_max_ticks(10))
            .with_compression(Compression::None)
            .with_handshake_timeout(Duration::from_secs(1));
        assert_eq!(config.tick.max_ticks, 10);
        assert_eq!(config.compression, Compression::None);
        assert_eq!(config.handshake_timeout, Duration::from_secs(1));
    }
}
