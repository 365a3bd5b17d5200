//! The expect loop: send a command, wait for an admissible response.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use log::{debug, error, trace, warn};
use tokio::time::Instant;

use super::group::CommandGroup;
use super::response::TerminalResponse;
use super::sink::OutputSink;
use super::timeout::{ExpectTimeout, effective_timeout, is_execute_command};
use crate::channel::{
    Identity, PatternBuffer, PatternMatch, ShellChannel, execute_expectations, is_strict_prompt,
};
use crate::credentials::HostCredentials;
use crate::error::{ExpectError, Result};
use crate::transport::ConnectionProvider;

/// Bytes of recent output attached to expectation errors.
const TRANSCRIPT_TAIL: usize = 2000;

/// Line terminator sent after every command.
const LINE_TERMINATOR: &str = "\r";

/// Per-group matching state.
///
/// Owned by the execute loop and passed to the matcher explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineState {
    /// Numeric prompt candidates must pass strict validation.
    pub prompt_disambiguation: bool,
}

impl EngineState {
    /// Fresh state for `group`.
    pub fn for_group(group: &CommandGroup) -> Self {
        Self {
            prompt_disambiguation: group.expects(&Identity::ReadyPrompt),
        }
    }
}

/// Output gathered while the session runs.
#[derive(Debug)]
struct Session {
    /// Unmatched output since the last accepted expectation.
    buffer: PatternBuffer,
    /// Every byte received, in arrival order.
    transcript: Vec<u8>,
}

impl Session {
    fn tail(&self) -> String {
        let start = self.transcript.len().saturating_sub(TRANSCRIPT_TAIL);
        String::from_utf8_lossy(&self.transcript[start..]).into_owned()
    }
}

/// Find the first admissible response in `buffer`.
///
/// Expectations are tried in priority order; within one expectation the
/// leftmost occurrence wins. Returns the identity and the offset just past
/// the accepted match.
pub fn scan(
    buffer: &PatternBuffer,
    expectations: &[PatternMatch],
    state: &EngineState,
) -> Option<(Identity, usize)> {
    for expectation in expectations {
        for found in buffer.matches_in_tail(expectation.regex()) {
            if state.prompt_disambiguation
                && expectation.identity().is_numeric_prompt()
                && !is_strict_prompt(buffer.as_slice(), found.clone())
            {
                trace!(
                    "Premature prompt match {:?} detected. Waiting for additional output.",
                    String::from_utf8_lossy(&buffer.as_slice()[found])
                );
                continue;
            }
            return Some((expectation.identity().clone(), found.end));
        }
    }
    None
}

/// Drives one remote shell through a list of [`CommandGroup`]s.
///
/// An engine is good for exactly one [`execute`](Self::execute) call: it
/// acquires a channel from the provider, runs every group, and releases the
/// channel on every exit path.
pub struct TerminalEngine<'a, P: ConnectionProvider> {
    provider: &'a P,
    credentials: &'a HostCredentials,
    default_timeout: ExpectTimeout,
    session_ready: Option<PatternMatch>,
    search_depth: usize,
    sink: OutputSink,
}

impl<'a, P: ConnectionProvider> TerminalEngine<'a, P> {
    pub fn new(provider: &'a P, credentials: &'a HostCredentials) -> Self {
        Self {
            provider,
            credentials,
            default_timeout: ExpectTimeout::default(),
            session_ready: None,
            search_depth: PatternBuffer::default().search_depth(),
            sink: OutputSink::default(),
        }
    }

    /// Default expectation timeout (see [`effective_timeout`]).
    pub fn with_timeout(mut self, timeout: ExpectTimeout) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Wait for `pattern` before sending the first command.
    pub fn with_session_ready(mut self, pattern: PatternMatch) -> Self {
        self.session_ready = Some(pattern);
        self
    }

    /// How many trailing bytes of pending output are searched.
    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth;
        self
    }

    /// Mirror session output into `sink`.
    pub fn with_output(mut self, sink: OutputSink) -> Self {
        self.sink = sink;
        self
    }

    /// Run `groups` against a freshly acquired channel.
    pub async fn execute(mut self, groups: &[CommandGroup]) -> Result<TerminalResponse> {
        for group in groups {
            debug!("command group: {}", group);
        }
        if groups.is_empty() {
            return Ok(TerminalResponse::new(0, String::new()));
        }

        let provider = self.provider;
        let credentials = self.credentials;
        let mut channel = provider
            .acquire(&credentials.host, &credentials.username, &credentials.password)
            .await?;

        let outcome = AssertUnwindSafe(self.run(&mut channel, groups))
            .catch_unwind()
            .await;

        let flushed = self.sink.flush().await;
        if let Err(e) = &flushed {
            warn!("failed to flush output sink: {}", e);
        }

        if channel.is_connected() {
            if let Err(e) = channel.disconnect().await {
                warn!("failed to disconnect shell channel: {}", e);
            }
        }
        provider.release(channel).await;

        match outcome {
            Ok(result) => {
                let response = result?;
                flushed?;
                Ok(response)
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn run(&mut self, channel: &mut P::Channel, groups: &[CommandGroup]) -> Result<TerminalResponse> {
        channel.connect().await?;

        let mut session = Session {
            buffer: PatternBuffer::new(self.search_depth),
            transcript: Vec::new(),
        };

        if let Some(ready) = self.session_ready.take() {
            debug!("waiting for session ready pattern {}", ready);
            self.expect(
                channel,
                &mut session,
                &EngineState::default(),
                std::slice::from_ref(&ready),
                self.default_timeout,
                "",
            )
            .await?;
        }

        let execute_set = execute_expectations();

        for group in groups {
            let state = EngineState::for_group(group);

            for (index, command) in group.commands().iter().enumerate() {
                let display = group.display_command(index);
                let timeout = effective_timeout(command, self.default_timeout);

                debug!("sending command ({})", display);
                channel
                    .send(format!("{command}{LINE_TERMINATOR}").as_bytes())
                    .await?;

                let active = if is_execute_command(command) {
                    execute_set.as_slice()
                } else {
                    group.expectations()
                };
                if command.is_empty() || active.is_empty() {
                    continue;
                }

                let identity = self
                    .expect(channel, &mut session, &state, active, timeout, display)
                    .await?;

                match identity {
                    Identity::RemoteAbort => {
                        error!("CCL session abort detected");
                        return Err(ExpectError::RemoteAbort {
                            command: display.to_string(),
                            transcript: session.tail(),
                        }
                        .into());
                    }
                    Identity::ViewerWarning => {
                        error!("select without 'nl:' detected");
                        return Err(ExpectError::MisconfiguredViewer {
                            command: display.to_string(),
                            transcript: session.tail(),
                        }
                        .into());
                    }
                    other => trace!("command ({}) answered by {}", display, other),
                }
            }
        }

        let exit_status = channel.exit_status().map_or(-1, |status| status as i32);
        Ok(TerminalResponse::new(
            exit_status,
            String::from_utf8_lossy(&session.transcript).into_owned(),
        ))
    }

    /// Read until one of `expectations` is accepted or the wait runs out.
    async fn expect(
        &mut self,
        channel: &mut P::Channel,
        session: &mut Session,
        state: &EngineState,
        expectations: &[PatternMatch],
        timeout: ExpectTimeout,
        display: &str,
    ) -> Result<Identity> {
        let deadline = timeout.duration().map(|d| Instant::now() + d);

        loop {
            if let Some((identity, end)) = scan(&session.buffer, expectations, state) {
                session.buffer.consume(end);
                return Ok(identity);
            }

            let dropped = session.buffer.trim_to_window();
            if dropped > 0 {
                trace!("dropped {} bytes behind the search window", dropped);
            }

            let received = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, channel.recv()).await {
                    Ok(received) => received?,
                    Err(_) => {
                        debug!(
                            "The expectation result was TIMEOUT for command ({}) with patterns {:?}",
                            display,
                            expectations.iter().map(PatternMatch::as_str).collect::<Vec<_>>()
                        );
                        return Err(ExpectError::Timeout {
                            command: display.to_string(),
                            timeout: timeout.duration().unwrap_or_default(),
                            transcript: session.tail(),
                        }
                        .into());
                    }
                },
                None => channel.recv().await?,
            };

            let Some(chunk) = received else {
                return Err(ExpectError::UnexpectedEof {
                    command: display.to_string(),
                    transcript: session.tail(),
                }
                .into());
            };

            self.sink.write(&chunk).await?;
            session.transcript.extend_from_slice(&chunk);
            session.buffer.extend(&chunk);
        }
    }
}
