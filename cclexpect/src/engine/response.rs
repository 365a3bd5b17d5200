//! Result of a completed terminal session.

/// The outcome of one successful `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalResponse {
    exit_status: i32,
    transcript: String,
}

impl TerminalResponse {
    pub fn new(exit_status: i32, transcript: impl Into<String>) -> Self {
        Self {
            exit_status,
            transcript: transcript.into(),
        }
    }

    /// Exit status reported by the remote shell, or `-1` if none was reported.
    pub fn exit_status(&self) -> i32 {
        self.exit_status
    }

    /// Everything the remote side printed, in arrival order.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Consume the response, keeping only the transcript.
    pub fn into_transcript(self) -> String {
        self.transcript
    }
}

impl std::fmt::Display for TerminalResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.transcript)
    }
}
