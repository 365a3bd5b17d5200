//! Channel layer for pattern matching and shell I/O.
//!
//! This module holds the pieces the engine reads through: the duplex
//! [`ShellChannel`], the ANSI-stripping [`PatternBuffer`], and the
//! identity-tagged [`PatternMatch`] expectations.

mod buffer;
mod patterns;
mod pty;

pub use buffer::PatternBuffer;
pub use patterns::{
    ABORT_PATTERN, EXECUTE_PROMPT_PATTERN, Identity, PatternMatch, VIEWER_PATTERN,
    execute_expectations, is_strict_prompt,
};
pub use pty::ShellChannel;
