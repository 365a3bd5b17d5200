//! Mirroring of session output as it arrives.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use memchr::memmem;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{ChannelError, Result};

/// In-memory output shared between the engine and whoever reads it later.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    fn append(&self, data: &[u8]) {
        self.lock().extend_from_slice(data);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

enum Target {
    Memory(SharedBuffer),
    Writer(Box<dyn AsyncWrite + Send + Unpin>),
}

/// Where raw session output is copied while the engine runs.
///
/// Output is written chunk by chunk as it is received, so whatever arrived
/// before a failure is kept.
pub struct OutputSink {
    target: Target,
    capture: Option<SessionCapture>,
}

impl OutputSink {
    /// A sink writing into `buffer`.
    pub fn memory(buffer: SharedBuffer) -> Self {
        Self {
            target: Target::Memory(buffer),
            capture: None,
        }
    }

    /// A sink writing to any async writer.
    pub fn writer(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            target: Target::Writer(Box::new(writer)),
            capture: None,
        }
    }

    /// A sink writing to a newly created file; parent directories are created.
    pub async fn file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(ChannelError::Io)?;
            }
        }
        let file = tokio::fs::File::create(path)
            .await
            .map_err(ChannelError::Io)?;
        Ok(Self::writer(file))
    }

    /// Only forward output found between `begin` and `end` markers.
    pub fn with_capture(mut self, begin: &str, end: &str) -> Self {
        self.capture = Some(SessionCapture::new(begin, end));
        self
    }

    pub(crate) async fn write(&mut self, data: &[u8]) -> Result<()> {
        let filtered;
        let data = match self.capture.as_mut() {
            Some(capture) => {
                filtered = capture.filter(data);
                filtered.as_slice()
            }
            None => data,
        };
        if data.is_empty() {
            return Ok(());
        }
        match &mut self.target {
            Target::Memory(buffer) => buffer.append(data),
            Target::Writer(writer) => writer.write_all(data).await.map_err(ChannelError::Io)?,
        }
        Ok(())
    }

    pub(crate) async fn flush(&mut self) -> Result<()> {
        if let Target::Writer(writer) = &mut self.target {
            writer.flush().await.map_err(ChannelError::Io)?;
        }
        Ok(())
    }
}

impl Default for OutputSink {
    fn default() -> Self {
        Self::memory(SharedBuffer::new())
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match self.target {
            Target::Memory(_) => "memory",
            Target::Writer(_) => "writer",
        };
        f.debug_struct("OutputSink")
            .field("target", &target)
            .field("capture", &self.capture)
            .finish()
    }
}

/// Streaming filter that passes through only the text between markers.
///
/// Markers may be split across chunks; a marker-sized tail is held back
/// until it can be decided.
#[derive(Debug)]
pub struct SessionCapture {
    begin: Vec<u8>,
    end: Vec<u8>,
    capturing: bool,
    pending: Vec<u8>,
}

impl SessionCapture {
    pub fn new(begin: &str, end: &str) -> Self {
        Self {
            begin: begin.as_bytes().to_vec(),
            end: end.as_bytes().to_vec(),
            capturing: false,
            pending: Vec::new(),
        }
    }

    /// Feed a chunk, returning the bytes to forward.
    pub fn filter(&mut self, data: &[u8]) -> Vec<u8> {
        self.pending.extend_from_slice(data);
        let mut out = Vec::new();

        loop {
            let marker = if self.capturing { &self.end } else { &self.begin };
            match memmem::find(&self.pending, marker) {
                Some(pos) => {
                    if self.capturing {
                        out.extend_from_slice(&self.pending[..pos]);
                    }
                    let consumed = pos + marker.len();
                    self.pending.drain(..consumed);
                    self.capturing = !self.capturing;
                }
                None => {
                    let keep = marker.len().saturating_sub(1).min(self.pending.len());
                    let decided = self.pending.len() - keep;
                    if self.capturing {
                        out.extend_from_slice(&self.pending[..decided]);
                    }
                    self.pending.drain(..decided);
                    return out;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_between_markers() {
        let mut capture = SessionCapture::new("<<B>>", "<<E>>");
        let out = capture.filter(b"noise<<B>>wanted<<E>>more noise");
        assert_eq!(out, b"wanted");
    }

    #[test]
    fn test_capture_markers_split_across_chunks() {
        let mut capture = SessionCapture::new("<<B>>", "<<E>>");
        let mut out = Vec::new();
        for chunk in [&b"noise<<"[..], b"B>>wan", b"ted<", b"<E", b">>tail"] {
            out.extend(capture.filter(chunk));
        }
        assert_eq!(out, b"wanted");
    }

    #[test]
    fn test_capture_repeated_sections() {
        let mut capture = SessionCapture::new("[", "]");
        assert_eq!(capture.filter(b"a[b]c[d]e"), b"bd");
    }

    #[tokio::test]
    async fn test_memory_sink_mirrors_chunks() {
        let buffer = SharedBuffer::new();
        let mut sink = OutputSink::memory(buffer.clone());
        sink.write(b"hello ").await.unwrap();
        sink.write(b"world").await.unwrap();
        sink.flush().await.unwrap();
        assert_eq!(buffer.to_string_lossy(), "hello world");
    }

    #[tokio::test]
    async fn test_file_sink_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("session.log");
        let mut sink = OutputSink::file(&path).await.unwrap();
        sink.write(b"  1)").await.unwrap();
        sink.flush().await.unwrap();
        drop(sink);
        assert_eq!(std::fs::read(&path).unwrap(), b"  1)");
    }
}
