//! Scripted shell channels for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use secrecy::SecretString;

use crate::channel::ShellChannel;
use crate::credentials::HostCredentials;
use crate::error::{ChannelError, Result};
use crate::transport::ConnectionProvider;

type Responder = Box<dyn FnMut(&str) -> Vec<Vec<u8>> + Send>;

/// A shell that answers each command with whatever the responder returns.
pub(crate) struct MockChannel {
    responder: Responder,
    greeting: Option<Vec<u8>>,
    pending: VecDeque<Bytes>,
    sent: Arc<Mutex<Vec<String>>>,
    eof_when_drained: bool,
    exit_status: Option<u32>,
    connected: bool,
}

impl MockChannel {
    pub(crate) fn new(responder: impl FnMut(&str) -> Vec<Vec<u8>> + Send + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            greeting: None,
            pending: VecDeque::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            eof_when_drained: false,
            exit_status: Some(0),
            connected: false,
        }
    }

    /// Output queued as soon as the shell connects.
    pub(crate) fn with_greeting(mut self, greeting: &[u8]) -> Self {
        self.greeting = Some(greeting.to_vec());
        self
    }

    /// Report end of stream instead of blocking once nothing is queued.
    pub(crate) fn eof_when_drained(mut self) -> Self {
        self.eof_when_drained = true;
        self
    }

    /// Every command sent, without the line terminator.
    pub(crate) fn sent_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.sent)
    }
}

impl ShellChannel for MockChannel {
    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        if let Some(greeting) = self.greeting.take() {
            self.pending.push_back(Bytes::from(greeting));
        }
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(ChannelError::NotConnected.into());
        }
        let text = String::from_utf8_lossy(data);
        let command = text.strip_suffix('\r').unwrap_or(&text).to_string();
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(command.clone());

        for chunk in (self.responder)(&command) {
            self.pending.push_back(Bytes::from(chunk));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Bytes>> {
        if let Some(chunk) = self.pending.pop_front() {
            return Ok(Some(chunk));
        }
        if self.eof_when_drained {
            return Ok(None);
        }
        std::future::pending().await
    }

    fn exit_status(&self) -> Option<u32> {
        self.exit_status
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }
}

/// Hands out a single [`MockChannel`] and counts acquire/release calls.
pub(crate) struct MockProvider {
    channel: Mutex<Option<MockChannel>>,
    acquired: AtomicUsize,
    released: AtomicUsize,
    released_connected: AtomicBool,
}

impl MockProvider {
    pub(crate) fn new(channel: MockChannel) -> Self {
        Self {
            channel: Mutex::new(Some(channel)),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            released_connected: AtomicBool::new(false),
        }
    }

    pub(crate) fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Whether any channel came back still connected.
    pub(crate) fn released_connected(&self) -> bool {
        self.released_connected.load(Ordering::SeqCst)
    }
}

impl ConnectionProvider for MockProvider {
    type Channel = MockChannel;

    async fn acquire(
        &self,
        _host: &str,
        _username: &str,
        _password: &SecretString,
    ) -> Result<MockChannel> {
        let channel = self
            .channel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match channel {
            Some(channel) => {
                self.acquired.fetch_add(1, Ordering::SeqCst);
                Ok(channel)
            }
            None => Err(ChannelError::Closed.into()),
        }
    }

    async fn release(&self, channel: MockChannel) {
        if channel.is_connected() {
            self.released_connected.store(true, Ordering::SeqCst);
        }
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn host_credentials() -> HostCredentials {
    HostCredentials::new("node1", "d_user", "pw")
}

pub(crate) const OS_PROMPT: &str = "d_user:dev@node1:/home/d_user\r\n# ";

pub(crate) const LOGIN_BANNER: &str = "\r\n(Hit PF3 or RETURN to skip security login; this will disable Uar functions)\r\nUsername: ";

/// A responder that behaves like a backend host running CCL.
///
/// `crash_on` makes that command kill the interpreter.
pub(crate) fn ccl_host(crash_on: Option<&'static str>) -> impl FnMut(&str) -> Vec<Vec<u8>> + Send {
    let mut line = 1usize;
    move |cmd: &str| {
        let prompt = |line: usize| format!("\r\n{line:>3})");
        match cmd {
            "envset dev" => vec![format!("envset dev\r\n{OS_PROMPT}").into_bytes()],
            "ccl" | "$cer_exe/cclora_dbg" => {
                vec![format!("{cmd}{LOGIN_BANNER}").into_bytes()]
            }
            "jsmith" => vec![b"jsmith\r\nDomain: ".to_vec()],
            "prod" => vec![b"prod\r\nPassword: ".to_vec()],
            "s3cret" => vec![b"\r\nEnter Y to continue".to_vec()],
            "" => vec![b"\r\n".to_vec()],
            "exit" => vec![format!("exit\r\n{OS_PROMPT}").into_bytes()],
            c if Some(c) == crash_on => {
                vec![format!("{c}\r\nSegmentation fault (core dumped)\r\n").into_bytes()]
            }
            c if c == "reset" || c.starts_with("reset ;") => {
                line = 1;
                vec![format!("{c}\r\n{}", prompt(line)).into_bytes()]
            }
            c if crate::engine::is_execute_command(c) => {
                line = 1;
                vec![
                    format!("{c}\r\n").into_bytes(),
                    format!("row 1\r\n 12) lookalike\r\n{}", prompt(line)).into_bytes(),
                ]
            }
            c => {
                line += 1;
                vec![format!("{c}{}", prompt(line)).into_bytes()]
            }
        }
    }
}
