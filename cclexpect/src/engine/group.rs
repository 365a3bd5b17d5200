//! Command groups: commands plus the responses admissible after each.

use std::fmt;

use log::warn;

use crate::channel::{Identity, PatternMatch};

/// Placeholder shown instead of a masked command.
pub const MASK: &str = "********";

/// An ordered list of commands and the expectations that may answer any of
/// them.
///
/// The engine sends the commands one at a time and, after each, waits for
/// the first expectation (in priority order) to match. A masked group sends
/// its real commands but only ever displays [`MASK`] in logs and errors.
///
/// # Example
///
/// ```rust
/// use cclexpect::channel::Identity;
/// use cclexpect::engine::CommandGroup;
///
/// let group = CommandGroup::masked()
///     .with_command("s3cret")
///     .with_pattern("Enter Y to continue.*", Identity::LoginSuccess);
///
/// assert_eq!(group.commands(), ["s3cret"]);
/// assert!(!group.render().contains("s3cret"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommandGroup {
    commands: Vec<String>,
    expectations: Vec<PatternMatch>,
    masked: bool,
    skipped_patterns: Vec<String>,
}

impl CommandGroup {
    /// An unmasked, empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty group whose commands are hidden from logs.
    pub fn masked() -> Self {
        Self {
            masked: true,
            ..Self::default()
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.add_command(command);
        self
    }

    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_commands(commands);
        self
    }

    pub fn with_expectation(mut self, expectation: PatternMatch) -> Self {
        self.expectations.push(expectation);
        self
    }

    /// Compile and append an expectation.
    ///
    /// A pattern that fails to compile is logged, recorded in
    /// [`skipped_patterns`](Self::skipped_patterns) and left out; the group
    /// stays usable.
    pub fn with_pattern(mut self, pattern: &str, identity: Identity) -> Self {
        match PatternMatch::new(pattern, identity) {
            Ok(expectation) => self.expectations.push(expectation),
            Err(e) => {
                warn!("skipping expectation: {}", e);
                self.skipped_patterns.push(pattern.to_string());
            }
        }
        self
    }

    /// Compile and append several expectations sharing one identity.
    pub fn with_patterns<I, S>(mut self, patterns: I, identity: Identity) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            self = self.with_pattern(pattern.as_ref(), identity.clone());
        }
        self
    }

    /// Append one command.
    pub fn add_command(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }

    /// Append several commands, keeping their order.
    pub fn add_commands<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn expectations(&self) -> &[PatternMatch] {
        &self.expectations
    }

    /// Patterns that were dropped because they failed to compile.
    pub fn skipped_patterns(&self) -> &[String] {
        &self.skipped_patterns
    }

    pub fn is_masked(&self) -> bool {
        self.masked
    }

    /// A group without commands is a no-op step.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Whether any expectation carries `identity`.
    pub fn expects(&self, identity: &Identity) -> bool {
        self.expectations.iter().any(|e| e.identity() == identity)
    }

    /// The loggable form of the command at `index`.
    pub fn display_command(&self, index: usize) -> &str {
        if self.masked {
            MASK
        } else {
            self.commands.get(index).map_or("", String::as_str)
        }
    }

    /// `[command, ...][pattern, ...]`, with masked commands replaced.
    pub fn render(&self) -> String {
        let commands: Vec<&str> = (0..self.commands.len())
            .map(|i| self.display_command(i))
            .collect();
        let expectations: Vec<&str> = self.expectations.iter().map(PatternMatch::as_str).collect();
        format!("[{}][{}]", commands.join(", "), expectations.join(", "))
    }
}

impl fmt::Display for CommandGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
