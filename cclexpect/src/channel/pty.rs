//! Duplex shell channel abstraction.

use std::future::Future;

use bytes::Bytes;

use crate::error::Result;

/// A live, interactive shell on the remote host.
///
/// The engine sends one command at a time and reads whatever the remote side
/// prints back. Implementations must be usable from a single task; they do not
/// need to be `Sync`.
pub trait ShellChannel: Send {
    /// Start the shell (request PTY and shell on the underlying session).
    fn connect(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Write raw bytes to the shell's input.
    fn send(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the next chunk of output.
    ///
    /// Returns `Ok(None)` once the remote end has closed the stream.
    fn recv(&mut self) -> impl Future<Output = Result<Option<Bytes>>> + Send;

    /// Exit status reported by the remote shell, if it has reported one.
    fn exit_status(&self) -> Option<u32>;

    /// Whether `connect()` succeeded and `disconnect()` has not run yet.
    fn is_connected(&self) -> bool;

    /// Close the shell.
    fn disconnect(&mut self) -> impl Future<Output = Result<()>> + Send;
}
