//! Per-command expectation timeouts.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

static EXECUTE_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:go|.*\sgo|go\s*;.*|.*\sgo\s*;.*)$").expect("static execute pattern")
});

static EXIT_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^exit$").expect("static exit pattern"));

/// How long to wait for an expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectTimeout {
    Bounded(Duration),
    /// Wait for as long as it takes.
    Unbounded,
}

impl ExpectTimeout {
    /// Interpret a millisecond count where `-1` means unbounded.
    ///
    /// Zero and other negative values are not valid timeouts.
    pub fn from_millis(millis: i64) -> Option<Self> {
        match millis {
            -1 => Some(ExpectTimeout::Unbounded),
            m if m > 0 => Some(ExpectTimeout::Bounded(Duration::from_millis(m as u64))),
            _ => None,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            ExpectTimeout::Bounded(d) => Some(*d),
            ExpectTimeout::Unbounded => None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, ExpectTimeout::Unbounded)
    }
}

impl Default for ExpectTimeout {
    fn default() -> Self {
        ExpectTimeout::Bounded(Duration::from_secs(20))
    }
}

/// Whether `command` runs a CCL statement (ends in `go`).
///
/// Such statements may run for an arbitrary time and return to the line-1
/// prompt when they finish.
pub fn is_execute_command(command: &str) -> bool {
    EXECUTE_COMMAND.is_match(command)
}

/// Whether `command` ends the CCL session.
pub fn is_exit_command(command: &str) -> bool {
    EXIT_COMMAND.is_match(command)
}

/// Effective wait for `command` under a configured default.
///
/// An unbounded default stays unbounded. Executed statements are unbounded,
/// since a long test program is legitimate once the prompt has been proven.
/// `exit` gets twice the default. Everything else gets the default.
pub fn effective_timeout(command: &str, default: ExpectTimeout) -> ExpectTimeout {
    match default {
        ExpectTimeout::Unbounded => ExpectTimeout::Unbounded,
        _ if is_execute_command(command) => ExpectTimeout::Unbounded,
        ExpectTimeout::Bounded(d) if is_exit_command(command) => {
            ExpectTimeout::Bounded(d.saturating_mul(2))
        }
        bounded => bounded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: ExpectTimeout = ExpectTimeout::Bounded(Duration::from_millis(301));

    #[test]
    fn test_execute_command_shapes() {
        for cmd in [
            "go",
            "execute my_prog go",
            "set width 132 go",
            "go ;comment",
            "execute my_prog go ; with trailing",
            "execute\tx\tgo",
        ] {
            assert!(is_execute_command(cmd), "{cmd}");
        }
        for cmd in ["", "reset", "ago", "execute my_prog", "gone", "go away", "execute x go2"] {
            assert!(!is_execute_command(cmd), "{cmd}");
        }
    }

    #[test]
    fn test_exit_command_shape() {
        assert!(is_exit_command("exit"));
        assert!(!is_exit_command("exit now"));
        assert!(!is_exit_command(" exit"));
    }

    #[test]
    fn test_effective_timeout_bounded() {
        assert_eq!(effective_timeout("execute my_prog go", T), ExpectTimeout::Unbounded);
        assert_eq!(
            effective_timeout("exit", T),
            ExpectTimeout::Bounded(Duration::from_millis(602))
        );
        assert_eq!(effective_timeout("reset", T), T);
        assert_eq!(effective_timeout("", T), T);
    }

    #[test]
    fn test_effective_timeout_unbounded_default() {
        for cmd in ["execute my_prog go", "exit", "reset", "ccl"] {
            assert_eq!(
                effective_timeout(cmd, ExpectTimeout::Unbounded),
                ExpectTimeout::Unbounded
            );
        }
    }

    #[test]
    fn test_from_millis() {
        assert_eq!(ExpectTimeout::from_millis(-1), Some(ExpectTimeout::Unbounded));
        assert_eq!(
            ExpectTimeout::from_millis(1234),
            Some(ExpectTimeout::Bounded(Duration::from_millis(1234)))
        );
        assert_eq!(ExpectTimeout::from_millis(0), None);
        assert_eq!(ExpectTimeout::from_millis(-500), None);
        assert_eq!(
            ExpectTimeout::default().duration(),
            Some(Duration::from_secs(20))
        );
    }
}
