//! Pattern buffer with tail-search and ANSI stripping.
//!
//! Incoming bytes are run through a `vte` parser so that colour codes and
//! cursor movement emitted by the remote shell never split a prompt. Only the
//! last `search_depth` bytes are scanned for expectations, which keeps
//! matching cheap while a long-running CCL program streams output.

use std::fmt;
use std::ops::Range;

use memchr::memrchr;
use regex::bytes::Regex;
use vte::{Parser, Perform};

/// Collects the printable text (plus line control) out of a VT byte stream.
#[derive(Default)]
struct Printable {
    out: Vec<u8>,
}

impl Perform for Printable {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out
            .extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.push(byte);
        }
    }
}

/// Buffer of not-yet-matched session output.
///
/// Holds everything received since the last accepted expectation. The VT
/// parser is kept across `extend` calls, so an escape sequence split over two
/// network reads is still stripped.
pub struct PatternBuffer {
    /// Pending (unmatched) output, ANSI-stripped.
    buffer: Vec<u8>,

    /// How many bytes from the end to search for patterns.
    search_depth: usize,

    parser: Parser,
}

impl PatternBuffer {
    /// Create a new pattern buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
            parser: Parser::new(),
        }
    }

    /// Extend the buffer with new data, stripping ANSI escape codes.
    pub fn extend(&mut self, data: &[u8]) {
        let mut printable = Printable {
            out: Vec::with_capacity(data.len()),
        };
        self.parser.advance(&mut printable, data);
        self.buffer.extend_from_slice(&printable.out);
    }

    /// Offset at which the searchable tail begins.
    pub fn tail_start(&self) -> usize {
        self.buffer.len().saturating_sub(self.search_depth)
    }

    /// All matches of `pattern` within the tail, leftmost first.
    ///
    /// Ranges are absolute offsets into [`as_slice`](Self::as_slice).
    pub fn matches_in_tail(&self, pattern: &Regex) -> Vec<Range<usize>> {
        let start = self.tail_start();
        pattern
            .find_iter(&self.buffer[start..])
            .map(|m| start + m.start()..start + m.end())
            .collect()
    }

    /// Remove and return everything up to `end`.
    pub fn consume(&mut self, end: usize) -> Vec<u8> {
        let end = end.min(self.buffer.len());
        self.buffer.drain(..end).collect()
    }

    /// Drop pending output that can no longer be searched.
    ///
    /// Keeps the line the searchable tail starts in, so a prompt candidate
    /// near the window edge still sees its whole line. Returns the number
    /// of bytes dropped.
    pub fn trim_to_window(&mut self) -> usize {
        let start = self.tail_start();
        if start == 0 {
            return 0;
        }
        let cut = memrchr(b'\n', &self.buffer[..start]).unwrap_or(start);
        self.buffer.drain(..cut);
        cut
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn search_depth(&self) -> usize {
        self.search_depth
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(8192)
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("len", &self.buffer.len())
            .field("search_depth", &self.search_depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extend() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"  1)\r\n");
        assert_eq!(buffer.as_slice(), b"  1)\r\n");
    }

    #[test]
    fn test_ansi_stripping() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"\x1b[1mCCL\x1b[0m ready");
        assert_eq!(buffer.as_slice(), b"CCL ready");
    }

    #[test]
    fn test_escape_split_across_reads() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"abc\x1b[3");
        buffer.extend(b"2mdef");
        assert_eq!(buffer.as_slice(), b"abcdef");
    }

    #[test]
    fn test_tail_search_not_in_tail() {
        let mut buffer = PatternBuffer::new(10);
        buffer.extend(b"ready>");
        buffer.extend(&[b'x'; 100]);

        let pattern = Regex::new(r"ready>").unwrap();
        assert!(buffer.matches_in_tail(&pattern).is_empty());
    }

    #[test]
    fn test_matches_are_absolute() {
        let mut buffer = PatternBuffer::new(8);
        buffer.extend(b"0123456789 1) 2)");

        let pattern = Regex::new(r"\d\)").unwrap();
        let found = buffer.matches_in_tail(&pattern);
        assert_eq!(found, vec![11..13, 14..16]);
        assert_eq!(&buffer.as_slice()[found[1].clone()], b"2)");
    }

    #[test]
    fn test_consume_through_match() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"login: rest");
        assert_eq!(buffer.consume(6), b"login:");
        assert_eq!(buffer.as_slice(), b" rest");
        assert_eq!(buffer.consume(1000), b" rest");
        assert!(buffer.as_slice().is_empty());
    }

    #[test]
    fn test_trim_keeps_only_the_window_line() {
        let mut buffer = PatternBuffer::new(16);
        for _ in 0..200 {
            buffer.extend(b"row of program output\r\n");
        }
        buffer.extend(b"\r\n 42)");

        let before = buffer.as_slice().len();
        let dropped = buffer.trim_to_window();
        assert!(dropped > 0);
        assert_eq!(buffer.as_slice().len(), before - dropped);
        assert!(buffer.as_slice().len() <= 16 + "row of program output\r\n".len());
        assert_eq!(buffer.as_slice()[0], b'\n');

        let pattern = Regex::new(r"\n\s*[1-9]\d*\)").unwrap();
        let found = buffer.matches_in_tail(&pattern);
        assert_eq!(found.len(), 1);
        assert!(buffer.as_slice()[found[0].clone()].ends_with(b" 42)"));
    }

    #[test]
    fn test_trim_within_window_is_noop() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"short\n  1)");
        assert_eq!(buffer.trim_to_window(), 0);
        assert_eq!(buffer.as_slice(), b"short\n  1)");
    }
}
