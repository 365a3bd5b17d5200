//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use log::{debug, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::config::{HostKeyVerification, SshConfig, SshOptions};
use crate::channel::ShellChannel;
use crate::error::{ChannelError, Result, TransportError};

/// russh settings for `options`. `timeout` bounds only the connect.
fn client_config(options: &SshOptions) -> client::Config {
    client::Config {
        inactivity_timeout: options.inactivity_timeout,
        keepalive_interval: options.keepalive_interval,
        keepalive_max: options.keepalive_max,
        ..Default::default()
    }
}

/// An authenticated SSH session.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// Options used for this connection.
    options: SshOptions,
}

impl SshTransport {
    /// Connect to the SSH server and authenticate with a password.
    pub async fn connect(config: &SshConfig) -> Result<Self> {
        let ssh_config = Arc::new(client_config(&config.options));

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.options.host_key_verification.clone(),
            known_hosts_path: config.options.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        let mut session = tokio::time::timeout(
            config.options.timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.options.timeout))?
        .map_err(|e| {
            // Prefer the detailed host-key error over russh's generic one.
            let stored = host_key_error
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            stored.unwrap_or(TransportError::Ssh(e))
        })?;

        let success = session
            .authenticate_password(&config.username, config.password.expose_secret())
            .await
            .map_err(TransportError::Ssh)?
            .success();

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        debug!("ssh session established to {}", config.socket_addr());

        Ok(Self {
            session,
            options: config.options.clone(),
        })
    }

    /// Open a new PTY shell channel on this connection.
    async fn open_shell(&self) -> Result<Channel<Msg>> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(ChannelError::OpenFailed)?;

        channel
            .request_pty(
                true,
                "vt100",
                self.options.terminal_width,
                self.options.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(ChannelError::OpenFailed)?;

        channel
            .request_shell(true)
            .await
            .map_err(ChannelError::OpenFailed)?;

        Ok(channel)
    }

    /// Whether the underlying session has gone away.
    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    /// Close the connection.
    pub async fn close(self) -> Result<()> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// An interactive shell on a (possibly pooled) SSH session.
///
/// Created unconnected by [`SshConnectionPool`](super::SshConnectionPool);
/// `connect()` requests the PTY and shell.
pub struct SshChannel {
    transport: Option<SshTransport>,
    channel: Option<Channel<Msg>>,
    exit_status: Option<u32>,
    pub(super) key: super::pool::PoolKey,
}

impl SshChannel {
    pub(super) fn new(transport: SshTransport, key: super::pool::PoolKey) -> Self {
        Self {
            transport: Some(transport),
            channel: None,
            exit_status: None,
            key,
        }
    }

    /// Hand the session back, leaving this channel unusable.
    pub(super) fn take_transport(&mut self) -> Option<SshTransport> {
        self.transport.take()
    }
}

impl ShellChannel for SshChannel {
    async fn connect(&mut self) -> Result<()> {
        let transport = self.transport.as_ref().ok_or(TransportError::Disconnected)?;
        self.channel = Some(transport.open_shell().await?);
        self.exit_status = None;
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let channel = self.channel.as_mut().ok_or(ChannelError::NotConnected)?;
        channel.data(data).await.map_err(ChannelError::Ssh)?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Bytes>> {
        let channel = self.channel.as_mut().ok_or(ChannelError::NotConnected)?;
        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    return Ok(Some(Bytes::copy_from_slice(&data)));
                }
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    return Ok(Some(Bytes::copy_from_slice(&data)));
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    debug!("remote shell exited with status {}", exit_status);
                    self.exit_status = Some(exit_status);
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => return Ok(None),
                Some(_) => {}
            }
        }
    }

    fn exit_status(&self) -> Option<u32> {
        self.exit_status
    }

    fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(channel) = self.channel.take() {
            channel.close().await.map_err(ChannelError::Ssh)?;
        }
        Ok(())
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> std::result::Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> std::result::Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: TransportError) -> bool {
        *self
            .host_key_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(error);
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key: {}", e);
                    }
                    Ok(true)
                }
                Err(e) => Ok(self.reject(e)),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => Ok(self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })),
                Err(e) => Ok(self.reject(e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_silent_session_is_not_timed_out_by_default() {
        let options = SshOptions {
            timeout: Duration::from_secs(5),
            ..SshOptions::default()
        };
        let config = client_config(&options);

        assert_eq!(config.inactivity_timeout, None);
        assert_eq!(config.keepalive_interval, Some(Duration::from_secs(30)));
        assert_eq!(config.keepalive_max, 3);
    }

    #[test]
    fn test_idle_settings_are_passed_through() {
        let options = SshOptions {
            inactivity_timeout: Some(Duration::from_secs(600)),
            keepalive_interval: None,
            keepalive_max: 5,
            ..SshOptions::default()
        };
        let config = client_config(&options);

        assert_eq!(config.inactivity_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.keepalive_interval, None);
        assert_eq!(config.keepalive_max, 5);
    }
}
