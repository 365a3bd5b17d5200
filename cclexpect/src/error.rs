//! Error types for cclexpect.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for cclexpect operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A command's response did not satisfy any admissible expectation
    #[error("Expectation error: {0}")]
    Expect(#[from] ExpectError),

    /// Invalid flow or transport configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Host key does not match the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Host key is not present in known_hosts and strict checking is on
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Channel layer errors (shell channel I/O and output mirroring).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Failed to open the shell channel
    #[error("Failed to open shell channel: {0}")]
    OpenFailed(russh::Error),

    /// Channel used before `connect()` or after `disconnect()`
    #[error("Channel not connected")]
    NotConnected,

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    Closed,

    /// SSH protocol error on the channel
    #[error("Channel SSH error: {0}")]
    Ssh(russh::Error),

    /// I/O error writing the output sink
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// The failure taxonomy of an expect-driven flow.
///
/// Every variant except [`ExpectError::InvalidPattern`] is fatal for the
/// `execute` call that produced it. `command` carries the display form of the
/// command in flight, so masked commands never leak into errors.
#[derive(Error, Debug)]
pub enum ExpectError {
    /// No admissible pattern matched within the effective timeout
    #[error("No expected response to command ({command}) within {timeout:?}")]
    Timeout {
        command: String,
        timeout: Duration,
        transcript: String,
    },

    /// The remote side closed the stream before any pattern matched
    #[error("Stream ended while waiting for a response to command ({command})")]
    UnexpectedEof { command: String, transcript: String },

    /// The remote interpreter crashed or aborted
    #[error("CCL session abort detected after command ({command})")]
    RemoteAbort { command: String, transcript: String },

    /// The interactive result viewer opened, so the session is blocked on paging
    #[error(
        "CCL result viewer opened after command ({command}); \
         redirect query output (e.g. `select into \"nl:\"`) so the session is not paged"
    )]
    MisconfiguredViewer { command: String, transcript: String },

    /// An expectation pattern failed to compile
    #[error("Invalid expectation pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required value is missing or a value is out of range
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    /// A configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] io::Error),

    /// A configuration document could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Kind of an [`Error`], for callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ExpectationTimeout,
    UnexpectedEndOfStream,
    RemoteAbort,
    MisconfiguredViewer,
    InvalidPattern,
    Transport,
    Channel,
    Config,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Expect(ExpectError::Timeout { .. }) => ErrorKind::ExpectationTimeout,
            Error::Expect(ExpectError::UnexpectedEof { .. }) => ErrorKind::UnexpectedEndOfStream,
            Error::Expect(ExpectError::RemoteAbort { .. }) => ErrorKind::RemoteAbort,
            Error::Expect(ExpectError::MisconfiguredViewer { .. }) => {
                ErrorKind::MisconfiguredViewer
            }
            Error::Expect(ExpectError::InvalidPattern { .. }) => ErrorKind::InvalidPattern,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Channel(_) => ErrorKind::Channel,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// The recent session output captured with the failure, if any.
    pub fn transcript(&self) -> Option<&str> {
        match self {
            Error::Expect(
                ExpectError::Timeout { transcript, .. }
                | ExpectError::UnexpectedEof { transcript, .. }
                | ExpectError::RemoteAbort { transcript, .. }
                | ExpectError::MisconfiguredViewer { transcript, .. },
            ) => Some(transcript),
            _ => None,
        }
    }
}

/// Result type alias using cclexpect's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err: Error = ExpectError::RemoteAbort {
            command: "execute my_prg go".into(),
            transcript: "Segmentation fault (core dumped)".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::RemoteAbort);
        assert_eq!(err.transcript(), Some("Segmentation fault (core dumped)"));

        let err: Error = ConfigError::Invalid {
            message: "osPromptPattern is required".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.transcript().is_none());
    }

    #[test]
    fn test_viewer_message_has_remediation() {
        let err = ExpectError::MisconfiguredViewer {
            command: "select * from person go".into(),
            transcript: String::new(),
        };
        assert!(err.to_string().contains("nl:"));
    }
}
