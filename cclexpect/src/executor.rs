//! One-call entry point: build a flow and run it.

use std::borrow::Cow;

use log::{debug, warn};

use crate::channel::{Identity, PatternMatch};
use crate::credentials::CredentialSource;
use crate::engine::{OutputSink, TerminalEngine, TerminalResponse};
use crate::error::Result;
use crate::flow::{CAPTURE_BEGIN_MARKER, CAPTURE_END_MARKER, FlowBuilder, FlowConfig};
use crate::transport::ConnectionProvider;

/// Runs CCL command flows against a backend host.
///
/// Each [`execute`](Self::execute) call builds a fresh flow and a fresh
/// engine; nothing carries over between calls except the provider's pooled
/// sessions.
///
/// # Example
///
/// ```rust,no_run
/// use cclexpect::credentials::{HostCredentials, StaticCredentials};
/// use cclexpect::flow::FlowConfig;
/// use cclexpect::transport::SshConnectionPool;
/// use cclexpect::CclExecutor;
///
/// # async fn example() -> Result<(), cclexpect::Error> {
/// let credentials = StaticCredentials::new(HostCredentials::new("node1", "d_user", "secret"));
/// let executor = CclExecutor::new(SshConnectionPool::default(), credentials);
///
/// let config = FlowConfig::builder(FlowConfig::default_os_prompt_pattern("node1", "dev", "d_user"))
///     .environment("dev")
///     .build()?;
///
/// let response = executor
///     .execute(&["execute my_prog go"], false, &config)
///     .await?;
/// println!("{}", response.transcript());
/// # Ok(())
/// # }
/// ```
pub struct CclExecutor<P, C> {
    provider: P,
    credentials: C,
}

impl<P: ConnectionProvider, C: CredentialSource> CclExecutor<P, C> {
    pub fn new(provider: P, credentials: C) -> Self {
        Self {
            provider,
            credentials,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Run `commands` in a new CCL session, mirroring output to memory.
    pub async fn execute<S: AsRef<str>>(
        &self,
        commands: &[S],
        authenticate: bool,
        config: &FlowConfig,
    ) -> Result<TerminalResponse> {
        self.execute_with_output(commands, authenticate, config, OutputSink::default())
            .await
    }

    /// Run `commands` in a new CCL session, mirroring output into `sink`.
    ///
    /// With output capture configured, only the text between the capture
    /// markers reaches `sink`; the returned transcript is always complete.
    pub async fn execute_with_output<S: AsRef<str>>(
        &self,
        commands: &[S],
        authenticate: bool,
        config: &FlowConfig,
        sink: OutputSink,
    ) -> Result<TerminalResponse> {
        let config = self.resolve_config(config, authenticate);
        let groups = FlowBuilder::new(&config).build(commands, authenticate);

        let sink = if config.capture_output() {
            sink.with_capture(CAPTURE_BEGIN_MARKER, CAPTURE_END_MARKER)
        } else {
            sink
        };

        let mut engine = TerminalEngine::new(&self.provider, self.credentials.host_credentials())
            .with_timeout(config.expectation_timeout())
            .with_output(sink);

        match PatternMatch::new(config.os_prompt_pattern(), Identity::OsPrompt) {
            Ok(ready) => engine = engine.with_session_ready(ready),
            Err(e) => warn!("not waiting for the OS prompt: {}", e),
        }

        engine.execute(&groups).await
    }

    /// Fill in domain credentials from the credential source when the
    /// configuration has none.
    fn resolve_config<'c>(&self, config: &'c FlowConfig, authenticate: bool) -> Cow<'c, FlowConfig> {
        if !authenticate || config.domain_credentials().is_some() {
            return Cow::Borrowed(config);
        }
        match self.credentials.domain_credentials() {
            Some(domain) => {
                debug!("using domain credentials from the credential source");
                Cow::Owned(config.clone().with_domain_credentials(domain))
            }
            None => Cow::Borrowed(config),
        }
    }
}
