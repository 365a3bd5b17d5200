//! Flow configuration.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use serde::Deserialize;

use crate::credentials::DomainCredentials;
use crate::engine::ExpectTimeout;
use crate::error::{ConfigError, Result};

/// Interpreter line prompt.
pub const DEFAULT_READY_PROMPT: &str = r"\n\s*[1-9]\d*\)\s*$";

/// CCL's security-login banner.
pub const DEFAULT_LOGIN_PROMPT: &str =
    r"\(Hit PF3 or RETURN to skip security login; this will disable Uar functions\)";

pub const DEFAULT_LOGIN_SUCCESS: &str = "Enter Y to continue.*";

pub const DEFAULT_LOGIN_FAILURES: [&str; 4] = [
    "V500 SECURITY LOGIN FAILURE",
    "V500 SECURITY LOGIN WARNING",
    r"Retry \(Y/N\)",
    "Repeat New Password:",
];

/// Everything [`FlowBuilder`](super::FlowBuilder) needs to lay out a flow.
///
/// Built once through [`FlowConfig::builder`] (or loaded from TOML) and only
/// read afterwards.
///
/// # Example
///
/// ```rust
/// use cclexpect::flow::FlowConfig;
///
/// let config = FlowConfig::builder(FlowConfig::default_os_prompt_pattern("node1", "dev", "d_user"))
///     .environment("dev")
///     .capture_output(true)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.environment(), "dev");
/// assert!(config.capture_output());
/// ```
#[derive(Debug, Clone)]
pub struct FlowConfig {
    environment: String,
    skip_env_set: bool,
    use_debug_binary: bool,
    os_prompt_pattern: String,
    ready_prompt_pattern: String,
    login_prompt_pattern: String,
    login_success_pattern: String,
    login_failure_patterns: Vec<String>,
    expectation_timeout: ExpectTimeout,
    domain_credentials: Option<Arc<DomainCredentials>>,
    capture_output: bool,
}

impl FlowConfig {
    /// Start a configuration around the OS shell prompt pattern.
    pub fn builder(os_prompt_pattern: impl Into<String>) -> FlowConfigBuilder {
        FlowConfigBuilder::new(os_prompt_pattern)
    }

    /// The OS prompt of `username` on `host` in `environment`.
    ///
    /// The prompt looks like `user:env@host:/cwd` followed by `#` on the next
    /// line. An empty environment matches any.
    pub fn default_os_prompt_pattern(host: &str, environment: &str, username: &str) -> String {
        let environment = if environment.is_empty() {
            r"\w*".to_string()
        } else {
            regex::escape(environment)
        };
        format!(
            r"{}:{}@{}:[^\r\n]*(\r|\n)+#\s*",
            regex::escape(username),
            environment,
            regex::escape(host)
        )
    }

    /// Parse a TOML document.
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let settings: FlowSettings = toml::from_str(document).map_err(ConfigError::Parse)?;
        settings.into_config()
    }

    /// Read and parse a TOML file.
    pub async fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let document = tokio::fs::read_to_string(path)
            .await
            .map_err(ConfigError::Io)?;
        Self::from_toml_str(&document)
    }

    /// A copy of this configuration logging in with `credentials`.
    pub fn with_domain_credentials(mut self, credentials: Arc<DomainCredentials>) -> Self {
        self.domain_credentials = Some(credentials);
        self
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn skip_env_set(&self) -> bool {
        self.skip_env_set
    }

    pub fn use_debug_binary(&self) -> bool {
        self.use_debug_binary
    }

    pub fn os_prompt_pattern(&self) -> &str {
        &self.os_prompt_pattern
    }

    pub fn ready_prompt_pattern(&self) -> &str {
        &self.ready_prompt_pattern
    }

    pub fn login_prompt_pattern(&self) -> &str {
        &self.login_prompt_pattern
    }

    pub fn login_success_pattern(&self) -> &str {
        &self.login_success_pattern
    }

    pub fn login_failure_patterns(&self) -> &[String] {
        &self.login_failure_patterns
    }

    pub fn expectation_timeout(&self) -> ExpectTimeout {
        self.expectation_timeout
    }

    pub fn domain_credentials(&self) -> Option<&Arc<DomainCredentials>> {
        self.domain_credentials.as_ref()
    }

    /// Whether only the output between the capture markers is kept.
    pub fn capture_output(&self) -> bool {
        self.capture_output
    }
}

/// Builder for [`FlowConfig`].
#[derive(Debug, Clone)]
pub struct FlowConfigBuilder {
    config: FlowConfig,
}

impl FlowConfigBuilder {
    fn new(os_prompt_pattern: impl Into<String>) -> Self {
        Self {
            config: FlowConfig {
                environment: String::new(),
                skip_env_set: false,
                use_debug_binary: false,
                os_prompt_pattern: os_prompt_pattern.into(),
                ready_prompt_pattern: DEFAULT_READY_PROMPT.to_string(),
                login_prompt_pattern: DEFAULT_LOGIN_PROMPT.to_string(),
                login_success_pattern: DEFAULT_LOGIN_SUCCESS.to_string(),
                login_failure_patterns: DEFAULT_LOGIN_FAILURES
                    .iter()
                    .map(|p| p.to_string())
                    .collect(),
                expectation_timeout: ExpectTimeout::default(),
                domain_credentials: None,
                capture_output: false,
            },
        }
    }

    /// Environment selected with `envset` before CCL starts.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.config.environment = environment.into();
        self
    }

    /// Leave out the `envset` step.
    pub fn skip_env_set(mut self, skip: bool) -> Self {
        self.config.skip_env_set = skip;
        self
    }

    /// Launch the debug interpreter binary instead of `ccl`.
    pub fn use_debug_binary(mut self, debug: bool) -> Self {
        self.config.use_debug_binary = debug;
        self
    }

    /// Override the ready prompt. Empty keeps the default.
    pub fn ready_prompt_pattern(mut self, pattern: impl Into<String>) -> Self {
        replace_unless_empty(&mut self.config.ready_prompt_pattern, pattern.into());
        self
    }

    /// Override the login banner. Empty keeps the default.
    pub fn login_prompt_pattern(mut self, pattern: impl Into<String>) -> Self {
        replace_unless_empty(&mut self.config.login_prompt_pattern, pattern.into());
        self
    }

    /// Override the login success banner. Empty keeps the default.
    pub fn login_success_pattern(mut self, pattern: impl Into<String>) -> Self {
        replace_unless_empty(&mut self.config.login_success_pattern, pattern.into());
        self
    }

    /// Replace the login failure banners. An empty list keeps the defaults.
    pub fn login_failure_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(Into::into)
            .filter(|p| !p.is_empty())
            .collect();
        if !patterns.is_empty() {
            self.config.login_failure_patterns = patterns;
        }
        self
    }

    /// Default expectation timeout. A zero duration is ignored.
    pub fn expectation_timeout(mut self, timeout: ExpectTimeout) -> Self {
        if timeout.duration() == Some(Duration::ZERO) {
            warn!("ignoring zero expectation timeout");
        } else {
            self.config.expectation_timeout = timeout;
        }
        self
    }

    /// Default expectation timeout in milliseconds, `-1` for no limit.
    ///
    /// Zero and other negative values are ignored.
    pub fn expectation_timeout_millis(mut self, millis: i64) -> Self {
        match ExpectTimeout::from_millis(millis) {
            Some(timeout) => self.config.expectation_timeout = timeout,
            None => warn!("ignoring invalid expectation timeout {}ms", millis),
        }
        self
    }

    /// Log in to CCL's security prompt as `credentials`.
    pub fn domain_credentials(mut self, credentials: DomainCredentials) -> Self {
        self.config.domain_credentials = Some(Arc::new(credentials));
        self
    }

    /// Keep only the output between the capture markers.
    pub fn capture_output(mut self, capture: bool) -> Self {
        self.config.capture_output = capture;
        self
    }

    pub fn build(self) -> Result<FlowConfig> {
        if self.config.os_prompt_pattern.is_empty() {
            return Err(ConfigError::Invalid {
                message: "an OS prompt pattern is required".to_string(),
            }
            .into());
        }
        if !self.config.skip_env_set && self.config.environment.is_empty() {
            warn!("no environment configured; envset will be sent without one");
        }
        Ok(self.config)
    }
}

fn replace_unless_empty(slot: &mut String, value: String) {
    if !value.is_empty() {
        *slot = value;
    }
}

/// On-disk form of [`FlowConfig`]. Domain credentials are never read from
/// configuration files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FlowSettings {
    os_prompt: String,
    #[serde(default)]
    environment: String,
    #[serde(default)]
    skip_env_set: bool,
    #[serde(default)]
    use_debug_binary: bool,
    #[serde(default)]
    ready_prompt: String,
    #[serde(default)]
    login_prompt: String,
    #[serde(default)]
    login_success: String,
    #[serde(default)]
    login_failures: Vec<String>,
    expectation_timeout_ms: Option<i64>,
    #[serde(default)]
    capture_output: bool,
}

impl FlowSettings {
    fn into_config(self) -> Result<FlowConfig> {
        let mut builder = FlowConfig::builder(self.os_prompt)
            .environment(self.environment)
            .skip_env_set(self.skip_env_set)
            .use_debug_binary(self.use_debug_binary)
            .ready_prompt_pattern(self.ready_prompt)
            .login_prompt_pattern(self.login_prompt)
            .login_success_pattern(self.login_success)
            .login_failure_patterns(self.login_failures)
            .capture_output(self.capture_output);
        if let Some(millis) = self.expectation_timeout_ms {
            builder = builder.expectation_timeout_millis(millis);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults() {
        let config = FlowConfig::builder("# ").build().unwrap();
        assert_eq!(config.ready_prompt_pattern(), DEFAULT_READY_PROMPT);
        assert_eq!(config.login_prompt_pattern(), DEFAULT_LOGIN_PROMPT);
        assert_eq!(config.login_success_pattern(), DEFAULT_LOGIN_SUCCESS);
        assert_eq!(config.login_failure_patterns().len(), 4);
        assert_eq!(
            config.expectation_timeout(),
            ExpectTimeout::Bounded(Duration::from_secs(20))
        );
        assert!(config.domain_credentials().is_none());
        assert!(!config.skip_env_set());
        assert!(!config.capture_output());
    }

    #[test]
    fn test_empty_os_prompt_rejected() {
        let err = FlowConfig::builder("").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_empty_overrides_keep_defaults() {
        let config = FlowConfig::builder("# ")
            .ready_prompt_pattern("")
            .login_failure_patterns(Vec::<String>::new())
            .build()
            .unwrap();
        assert_eq!(config.ready_prompt_pattern(), DEFAULT_READY_PROMPT);
        assert_eq!(config.login_failure_patterns().len(), 4);
    }

    #[test]
    fn test_invalid_timeouts_ignored() {
        let config = FlowConfig::builder("# ")
            .expectation_timeout_millis(5000)
            .expectation_timeout_millis(0)
            .expectation_timeout(ExpectTimeout::Bounded(Duration::ZERO))
            .expectation_timeout_millis(-7)
            .build()
            .unwrap();
        assert_eq!(
            config.expectation_timeout(),
            ExpectTimeout::Bounded(Duration::from_millis(5000))
        );

        let config = FlowConfig::builder("# ")
            .expectation_timeout_millis(-1)
            .build()
            .unwrap();
        assert!(config.expectation_timeout().is_unbounded());
    }

    #[test]
    fn test_default_os_prompt_pattern() {
        let pattern = FlowConfig::default_os_prompt_pattern("node1.example", "dev", "d_user");
        let re = regex::Regex::new(&pattern).unwrap();
        assert!(re.is_match("d_user:dev@node1.example:/home/d_user\r\n# "));
        assert!(!re.is_match("d_user:dev@node1xexample:/home/d_user\r\n# "));
        assert!(!re.is_match("d_user:prod@node1.example:/home/d_user\r\n# "));

        let any_env = FlowConfig::default_os_prompt_pattern("node1", "", "d_user");
        let re = regex::Regex::new(&any_env).unwrap();
        assert!(re.is_match("d_user:prod@node1:/cerner\n#"));
    }

    #[test]
    fn test_from_toml_str() {
        let config = FlowConfig::from_toml_str(
            r#"
            os-prompt = "d_user:dev@node1:[^\\r\\n]*(\\r|\\n)+#\\s*"
            environment = "dev"
            use-debug-binary = true
            login-failures = ["LOCKED OUT"]
            expectation-timeout-ms = -1
            capture-output = true
            "#,
        )
        .unwrap();
        assert_eq!(config.environment(), "dev");
        assert!(config.use_debug_binary());
        assert_eq!(config.login_failure_patterns(), ["LOCKED OUT"]);
        assert!(config.expectation_timeout().is_unbounded());
        assert!(config.capture_output());
        assert_eq!(config.ready_prompt_pattern(), DEFAULT_READY_PROMPT);
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        let err = FlowConfig::from_toml_str("os-prompt = \"# \"\npassword = \"x\"\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "os-prompt = \"# \"").unwrap();
        writeln!(file, "skip-env-set = true").unwrap();
        let config = tokio_test::block_on(FlowConfig::from_toml_file(file.path())).unwrap();
        assert!(config.skip_env_set());

        let err = tokio_test::block_on(FlowConfig::from_toml_file("/nonexistent/cclexpect.toml"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
