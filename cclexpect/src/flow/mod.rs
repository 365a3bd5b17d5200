//! CCL session choreography.
//!
//! [`FlowConfig`] describes the target environment and login, and
//! [`FlowBuilder`] turns a list of caller commands into the ordered
//! [`CommandGroup`](crate::engine::CommandGroup)s the engine runs.

mod builder;
mod config;

pub use builder::{
    CAPTURE_BEGIN_MARKER, CAPTURE_END_MARKER, DEBUG_LAUNCH_COMMAND, EXIT_COMMAND, FlowBuilder,
    LAUNCH_COMMAND, READY_COMMAND, WIDTH_COMMAND,
};
pub use config::{
    DEFAULT_LOGIN_FAILURES, DEFAULT_LOGIN_PROMPT, DEFAULT_LOGIN_SUCCESS, DEFAULT_READY_PROMPT,
    FlowConfig, FlowConfigBuilder,
};
