//! Lays out the command groups of a CCL session.

use log::debug;
use secrecy::ExposeSecret;

use super::config::FlowConfig;
use crate::channel::{ABORT_PATTERN, Identity, PatternMatch, VIEWER_PATTERN};
use crate::engine::CommandGroup;

pub const LAUNCH_COMMAND: &str = "ccl";
pub const DEBUG_LAUNCH_COMMAND: &str = "$cer_exe/cclora_dbg";
pub const READY_COMMAND: &str = "reset";
pub const WIDTH_COMMAND: &str = "set width 132 go";
pub const EXIT_COMMAND: &str = "exit";

pub const CAPTURE_BEGIN_MARKER: &str = "##CCL##OUTPUT##BEGIN##";
pub const CAPTURE_END_MARKER: &str = "##CCL##OUTPUT##END##";

/// Turns caller commands into the full session choreography.
///
/// The groups come out in a fixed order: environment selection, interpreter
/// launch, optional security login, login dismissal, wait for ready, the
/// session body, and exit.
#[derive(Debug)]
pub struct FlowBuilder<'a> {
    config: &'a FlowConfig,
}

impl<'a> FlowBuilder<'a> {
    pub fn new(config: &'a FlowConfig) -> Self {
        Self { config }
    }

    /// Build the groups for `commands`.
    ///
    /// Each command string may hold several newline-separated CCL lines.
    /// The security login steps are only emitted when `authenticate` is set
    /// and the configuration carries domain credentials.
    pub fn build<S: AsRef<str>>(&self, commands: &[S], authenticate: bool) -> Vec<CommandGroup> {
        let mut groups = vec![self.startup(), self.launch()];
        if authenticate {
            groups.extend(self.authentication());
        }
        groups.push(self.finalize_login());
        groups.push(self.ready());
        groups.push(self.session(commands));
        groups.push(self.exit());

        debug!("built flow of {} command groups", groups.len());
        groups
    }

    fn startup(&self) -> CommandGroup {
        if self.config.skip_env_set() {
            return CommandGroup::new();
        }
        CommandGroup::new()
            .with_command(format!("envset {}", self.config.environment()))
            .with_pattern(self.config.os_prompt_pattern(), Identity::OsPrompt)
    }

    fn launch(&self) -> CommandGroup {
        let command = if self.config.use_debug_binary() {
            DEBUG_LAUNCH_COMMAND
        } else {
            LAUNCH_COMMAND
        };
        CommandGroup::new()
            .with_command(command)
            .with_pattern(self.config.login_prompt_pattern(), Identity::LoginPrompt)
    }

    fn authentication(&self) -> Vec<CommandGroup> {
        let Some(credentials) = self.config.domain_credentials() else {
            debug!("no domain credentials configured, skipping security login");
            return Vec::new();
        };

        let username = CommandGroup::new()
            .with_command(credentials.username.as_str())
            .with_expectation(PatternMatch::literal(&credentials.username, Identity::Echo));
        let domain = CommandGroup::new()
            .with_command(credentials.domain.as_str())
            .with_expectation(PatternMatch::literal(&credentials.domain, Identity::Echo));
        let password = CommandGroup::masked()
            .with_command(credentials.password.expose_secret())
            .with_pattern(self.config.login_success_pattern(), Identity::LoginSuccess)
            .with_patterns(self.config.login_failure_patterns(), Identity::LoginFailure);

        vec![username, domain, password]
    }

    /// Two blank lines dismiss whatever the login step left on screen.
    fn finalize_login(&self) -> CommandGroup {
        CommandGroup::new().with_commands(["", ""])
    }

    fn ready(&self) -> CommandGroup {
        CommandGroup::new()
            .with_command(READY_COMMAND)
            .with_pattern(self.config.ready_prompt_pattern(), Identity::ReadyPrompt)
    }

    fn session<S: AsRef<str>>(&self, commands: &[S]) -> CommandGroup {
        let mut group = CommandGroup::new().with_command(WIDTH_COMMAND);
        if self.config.capture_output() {
            group.add_command(format!("{READY_COMMAND} ;{CAPTURE_BEGIN_MARKER}"));
        }
        for command in commands {
            group.add_commands(command.as_ref().split('\n'));
        }
        if self.config.capture_output() {
            group.add_command(format!("{READY_COMMAND} ;{CAPTURE_END_MARKER}"));
        }
        group
            .with_pattern(self.config.ready_prompt_pattern(), Identity::ReadyPrompt)
            .with_pattern(VIEWER_PATTERN, Identity::ViewerWarning)
            .with_pattern(ABORT_PATTERN, Identity::RemoteAbort)
    }

    fn exit(&self) -> CommandGroup {
        CommandGroup::new()
            .with_command(EXIT_COMMAND)
            .with_pattern(self.config.os_prompt_pattern(), Identity::OsPrompt)
    }
}
