//! Command-group execution engine.
//!
//! A flow is a list of [`CommandGroup`]s. The [`TerminalEngine`] sends each
//! command in order and waits for one of the group's expectations before
//! moving on.

mod group;
mod response;
mod sink;
mod terminal;
mod timeout;

pub use group::{CommandGroup, MASK};
pub use response::TerminalResponse;
pub use sink::{OutputSink, SessionCapture, SharedBuffer};
pub use terminal::{EngineState, TerminalEngine, scan};
pub use timeout::{ExpectTimeout, effective_timeout, is_execute_command, is_exit_command};
