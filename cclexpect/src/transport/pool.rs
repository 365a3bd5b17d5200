//! Pooled SSH sessions.

use std::sync::Mutex;

use indexmap::IndexMap;
use log::{debug, warn};
use secrecy::{ExposeSecret, SecretString};

use super::ConnectionProvider;
use super::config::{SshConfig, SshOptions};
use super::ssh::{SshChannel, SshTransport};
use crate::channel::ShellChannel;
use crate::error::Result;

/// Identifies sessions that are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub host: String,
    pub port: u16,
    pub username: String,
}

/// A thread-safe pool of authenticated SSH sessions.
///
/// Every `acquire` hands out a fresh shell channel; only the underlying
/// session is reused. Sessions are checked back in by `release` while they
/// are still open and the per-key idle limit has room.
pub struct SshConnectionPool {
    options: SshOptions,
    max_idle_per_key: usize,
    idle: Mutex<IndexMap<PoolKey, Vec<SshTransport>>>,
}

impl SshConnectionPool {
    pub fn new(options: SshOptions) -> Self {
        Self {
            options,
            max_idle_per_key: 4,
            idle: Mutex::new(IndexMap::new()),
        }
    }

    /// Limit how many idle sessions are kept per host/user.
    pub fn with_max_idle_per_key(mut self, max_idle: usize) -> Self {
        self.max_idle_per_key = max_idle;
        self
    }

    /// Number of idle sessions currently pooled.
    pub fn idle_count(&self) -> usize {
        self.lock_idle().values().map(Vec::len).sum()
    }

    fn lock_idle(&self) -> std::sync::MutexGuard<'_, IndexMap<PoolKey, Vec<SshTransport>>> {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_out(&self, key: &PoolKey) -> Option<SshTransport> {
        let mut idle = self.lock_idle();
        let sessions = idle.get_mut(key)?;
        while let Some(transport) = sessions.pop() {
            if !transport.is_closed() {
                return Some(transport);
            }
            debug!("discarding closed pooled session for {}@{}", key.username, key.host);
        }
        None
    }

    /// Returns the transport when the pool declines to keep it.
    fn check_in(&self, key: PoolKey, transport: SshTransport) -> Option<SshTransport> {
        if transport.is_closed() {
            return None;
        }
        let mut idle = self.lock_idle();
        let sessions = idle.entry(key).or_default();
        if sessions.len() >= self.max_idle_per_key {
            return Some(transport);
        }
        sessions.push(transport);
        None
    }
}

impl Default for SshConnectionPool {
    fn default() -> Self {
        Self::new(SshOptions::default())
    }
}

impl ConnectionProvider for SshConnectionPool {
    type Channel = SshChannel;

    async fn acquire(
        &self,
        host: &str,
        username: &str,
        password: &SecretString,
    ) -> Result<SshChannel> {
        let password = SecretString::from(password.expose_secret().to_owned());
        let config = SshConfig::new(host, username, password, &self.options)?;
        let key = PoolKey {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
        };

        let transport = match self.check_out(&key) {
            Some(transport) => {
                debug!("reusing pooled session for {}@{}", key.username, key.host);
                transport
            }
            None => SshTransport::connect(&config).await?,
        };

        Ok(SshChannel::new(transport, key))
    }

    async fn release(&self, mut channel: SshChannel) {
        if channel.is_connected() {
            if let Err(e) = channel.disconnect().await {
                warn!("failed to close shell channel: {}", e);
            }
        }

        let Some(transport) = channel.take_transport() else {
            return;
        };
        if let Some(surplus) = self.check_in(channel.key.clone(), transport) {
            if let Err(e) = surplus.close().await {
                warn!("failed to close surplus session: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_new_pool_is_empty() {
        let pool = SshConnectionPool::default().with_max_idle_per_key(1);
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.max_idle_per_key, 1);
    }

    #[tokio::test]
    async fn test_acquire_rejects_bad_host_before_connecting() {
        let pool = SshConnectionPool::default();
        let password = SecretString::from("pw".to_string());

        let Err(err) = pool.acquire("node1:notaport", "d_user", &password).await else {
            panic!("invalid port accepted");
        };
        assert_eq!(err.kind(), ErrorKind::Config);

        let Err(err) = pool.acquire("", "d_user", &password).await else {
            panic!("empty host accepted");
        };
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(pool.idle_count(), 0);
    }
}
