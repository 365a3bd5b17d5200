//! SSH transport layer wrapping russh.
//!
//! The engine never opens sessions itself; it asks a [`ConnectionProvider`]
//! for a shell channel and hands it back when the flow ends.

pub mod config;
mod pool;
mod ssh;

use std::future::Future;

use secrecy::SecretString;

use crate::channel::ShellChannel;
use crate::error::Result;

pub use config::{HostKeyVerification, SshConfig, SshOptions};
pub use pool::{PoolKey, SshConnectionPool};
pub use ssh::{SshChannel, SshTransport};

/// Source of shell channels to a remote host.
///
/// Implementations must tolerate concurrent `acquire`/`release` from many
/// flows at once.
pub trait ConnectionProvider: Send + Sync {
    /// The channel type handed out.
    type Channel: ShellChannel;

    /// Obtain an unconnected shell channel for `username@host`.
    fn acquire(
        &self,
        host: &str,
        username: &str,
        password: &SecretString,
    ) -> impl Future<Output = Result<Self::Channel>> + Send;

    /// Give a channel back. Never fails; problems are logged.
    fn release(&self, channel: Self::Channel) -> impl Future<Output = ()> + Send;
}
