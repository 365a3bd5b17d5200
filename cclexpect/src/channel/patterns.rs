//! Expectation patterns and prompt disambiguation.

use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

use regex::bytes::Regex;

use crate::error::ExpectError;

/// Header row of CCL's interactive result viewer.
pub const VIEWER_PATTERN: &str =
    "EXIT  VIEW  FIND  PRINT  HELP  SCROLL  BREAK  DIRECTION  WIDTH  MARGIN";

/// Output printed when the CCL process dies.
pub const ABORT_PATTERN: &str = r"(?:Segmentation fault|Aborted) \(core dumped\)";

/// The first-line prompt CCL prints once an executed statement returns.
pub const EXECUTE_PROMPT_PATTERN: &str = r"\n\s{2}1\)\s*$";

/// A CCL line prompt: a line number right-justified in three columns,
/// followed by `)`. Numbers past 999 overflow the column.
static STRICT_PROMPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\s{2}[1-9]|\s[1-9]\d|[1-9]\d{2,})\)$").expect("static prompt pattern")
});

/// What an admissible response means to the flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// The operating system shell prompt.
    OsPrompt,
    /// CCL's security-login banner.
    LoginPrompt,
    /// Accepted domain login.
    LoginSuccess,
    /// Any of the rejected-login banners.
    LoginFailure,
    /// The remote echo of a value typed during login.
    Echo,
    /// The interpreter line prompt (`  1)`, ` 12)`, ...).
    ReadyPrompt,
    /// The prompt CCL returns to after a `go`-terminated statement.
    ExecutePrompt,
    /// The result viewer opened.
    ViewerWarning,
    /// The interpreter crashed.
    RemoteAbort,
    /// Caller-defined.
    Custom(String),
}

impl Identity {
    /// Whether this identity is a numeric line prompt that incidental output
    /// can imitate.
    pub fn is_numeric_prompt(&self) -> bool {
        matches!(self, Identity::ReadyPrompt | Identity::ExecutePrompt)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::OsPrompt => f.write_str("os-prompt"),
            Identity::LoginPrompt => f.write_str("login-prompt"),
            Identity::LoginSuccess => f.write_str("login-success"),
            Identity::LoginFailure => f.write_str("login-failure"),
            Identity::Echo => f.write_str("echo"),
            Identity::ReadyPrompt => f.write_str("ready-prompt"),
            Identity::ExecutePrompt => f.write_str("execute-prompt"),
            Identity::ViewerWarning => f.write_str("viewer-warning"),
            Identity::RemoteAbort => f.write_str("remote-abort"),
            Identity::Custom(name) => f.write_str(name),
        }
    }
}

/// A compiled regular expression bound to the identity it recognizes.
#[derive(Debug, Clone)]
pub struct PatternMatch {
    pattern: Regex,
    identity: Identity,
}

impl PatternMatch {
    /// Compile `pattern` for `identity`.
    pub fn new(pattern: &str, identity: Identity) -> Result<Self, ExpectError> {
        let compiled = Regex::new(pattern).map_err(|source| ExpectError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: compiled,
            identity,
        })
    }

    /// Match `text` literally.
    pub fn literal(text: &str, identity: Identity) -> Self {
        Self {
            pattern: Regex::new(&regex::escape(text)).expect("escaped literal is a valid regex"),
            identity,
        }
    }

    pub fn regex(&self) -> &Regex {
        &self.pattern
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The source text of the pattern.
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl fmt::Display for PatternMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.identity, self.pattern.as_str())
    }
}

/// The fixed expectation set used while a `go`-terminated statement runs.
pub fn execute_expectations() -> Vec<PatternMatch> {
    vec![
        PatternMatch::new(EXECUTE_PROMPT_PATTERN, Identity::ExecutePrompt)
            .expect("static execute prompt pattern"),
        PatternMatch::new(VIEWER_PATTERN, Identity::ViewerWarning)
            .expect("static viewer pattern"),
        PatternMatch::new(ABORT_PATTERN, Identity::RemoteAbort).expect("static abort pattern"),
    ]
}

/// Validate a numeric-prompt candidate found at `found` within `haystack`.
///
/// The candidate is genuine only if the line it ends is exactly a
/// right-justified 1-3 digit line number followed by `)`, and nothing but
/// whitespace has been printed after it.
pub fn is_strict_prompt(haystack: &[u8], found: Range<usize>) -> bool {
    if !haystack[found.end..].iter().all(u8::is_ascii_whitespace) {
        return false;
    }

    let mut end = found.end;
    while end > found.start && haystack[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    let line_start = memchr::memrchr(b'\n', &haystack[..end]).map_or(0, |nl| nl + 1);
    let line: Vec<u8> = haystack[line_start..end]
        .iter()
        .copied()
        .filter(|b| *b != b'\r')
        .collect();

    STRICT_PROMPT.is_match(&line)
}
