//! Connection configuration

use crate::{LinkError, Result};
use std::time::Duration;

/// Port used when a target names none
pub const DEFAULT_PORT: u16 = 1555;

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Remote hostname or IP
    pub host: String,
    /// Remote port
    pub port: u16,
    /// Disable Nagle's algorithm
    pub nodelay: bool,
    /// Transport connect timeout (none: OS default)
    pub connect_timeout: Option<Duration>,
    /// Transport read timeout (none: block indefinitely)
    pub read_timeout: Option<Duration>,
    /// Transport write timeout (none: block indefinitely)
    pub write_timeout: Option<Duration>,
    /// Size of each read from the socket
    pub read_buffer_size: usize,
    /// Largest payload accepted in either direction
    pub max_frame_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            nodelay: true,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            read_buffer_size: 8192,
            max_frame_size: msglink_proto::MAX_FRAME_SIZE,
        }
    }
}

impl ConnectionConfig {
    /// Create a configuration from a `host[:port]` target
    pub fn new(target: &str) -> Result<Self> {
        let (host, port) = Self::parse_target(target)?;
        Ok(Self {
            host,
            port,
            ..Default::default()
        })
    }

    /// Parse target string into host and port
    fn parse_target(target: &str) -> Result<(String, u16)> {
        let target = target.trim();
        if target.is_empty() {
            return Err(LinkError::InvalidTarget("empty target".to_string()));
        }

        // Bracketed IPv6: [::1]:1555
        if let Some(rest) = target.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| LinkError::InvalidTarget(target.to_string()))?;
            let port = match tail.strip_prefix(':') {
                Some(port) => Self::parse_port(target, port)?,
                None if tail.is_empty() => DEFAULT_PORT,
                None => return Err(LinkError::InvalidTarget(target.to_string())),
            };
            return Ok((host.to_string(), port));
        }

        match target.rsplit_once(':') {
            // A bare IPv6 address has several colons and no port
            Some((host, _)) if host.contains(':') => Ok((target.to_string(), DEFAULT_PORT)),
            Some((host, port)) if !host.is_empty() => {
                Ok((host.to_string(), Self::parse_port(target, port)?))
            }
            Some(_) => Err(LinkError::InvalidTarget(target.to_string())),
            None => Ok((target.to_string(), DEFAULT_PORT)),
        }
    }

    fn parse_port(target: &str, port: &str) -> Result<u16> {
        port.parse::<u16>()
            .map_err(|_| LinkError::InvalidTarget(format!("{}: bad port '{}'", target, port)))
    }

    /// `host:port` as dialled
    pub fn target(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set read timeout; an expired read closes the connection
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set write timeout; an expired write closes the connection
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Set read buffer size
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Set maximum payload size
    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }
}
