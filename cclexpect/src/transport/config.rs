//! SSH connection configuration.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::{ConfigError, Result};

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys. Connection fails if the host
    /// is not already in known_hosts.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For testing and lab use only.
    Disabled,
}

/// Host-independent SSH settings shared by every connection a pool opens.
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// Port used when the host string does not carry one.
    pub port: u16,

    /// Connect timeout.
    pub timeout: Duration,

    /// Close the session after this long without traffic. `None` keeps an
    /// idle session open, which long-running CCL programs need.
    pub inactivity_timeout: Option<Duration>,

    /// Interval between keepalive requests while the peer is silent.
    pub keepalive_interval: Option<Duration>,

    /// Unanswered keepalives tolerated before the session is dropped.
    pub keepalive_max: usize,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,

    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file.
    pub known_hosts_path: Option<PathBuf>,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            port: 22,
            timeout: Duration::from_secs(30),
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }
}

/// Everything needed to open one authenticated SSH session.
#[derive(Debug)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub options: SshOptions,
}

impl SshConfig {
    /// Build a config for `host_spec`, which is `host` or `host:port`.
    pub fn new(
        host_spec: &str,
        username: impl Into<String>,
        password: SecretString,
        options: &SshOptions,
    ) -> Result<Self> {
        let (host, port) = parse_host(host_spec, options.port)?;
        Ok(Self {
            host,
            port,
            username: username.into(),
            password,
            options: options.clone(),
        })
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Split `host[:port]`, falling back to `default_port`.
pub fn parse_host(host_spec: &str, default_port: u16) -> Result<(String, u16)> {
    let host_spec = host_spec.trim();
    if host_spec.is_empty() {
        return Err(ConfigError::Invalid {
            message: "host must not be empty".to_string(),
        }
        .into());
    }

    match host_spec.rsplit_once(':') {
        // Bare IPv6 literals contain colons but no port.
        Some((host, port)) if !host.contains(':') => {
            let port = port.parse::<u16>().map_err(|_| ConfigError::Invalid {
                message: format!("invalid port in host '{host_spec}'"),
            })?;
            Ok((host.to_string(), port))
        }
        _ => Ok((host_spec.to_string(), default_port)),
    }
}
