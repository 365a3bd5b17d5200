//! # cclexpect
//!
//! Async expect-style automation of CCL interpreter sessions over SSH.
//!
//! cclexpect logs in to a backend host, selects an environment, starts the
//! CCL interpreter, optionally passes its security login, runs a batch of
//! CCL commands and exits, all by sending one command at a time and waiting
//! for a matching response.
//!
//! ## Features
//!
//! - Async SSH shells via russh, with a pooled [`ConnectionProvider`]
//! - Ordered command groups with prioritized response patterns
//! - Line-prompt disambiguation against lookalike program output
//! - Per-command timeouts with unbounded waits for executed statements
//! - Output mirroring to memory or file, with marker-based capture
//! - Classified errors carrying the recent transcript
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cclexpect::credentials::{DomainCredentials, HostCredentials, StaticCredentials};
//! use cclexpect::flow::FlowConfig;
//! use cclexpect::transport::SshConnectionPool;
//! use cclexpect::CclExecutor;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cclexpect::Error> {
//!     let credentials = StaticCredentials::new(HostCredentials::new("node1", "d_user", "secret"))
//!         .with_domain(DomainCredentials::new("jsmith", "prod", "s3cret"));
//!     let executor = CclExecutor::new(SshConnectionPool::default(), credentials);
//!
//!     let config = FlowConfig::builder(FlowConfig::default_os_prompt_pattern("node1", "dev", "d_user"))
//!         .environment("dev")
//!         .capture_output(true)
//!         .build()?;
//!
//!     let response = executor
//!         .execute(&["execute my_prog go"], true, &config)
//!         .await?;
//!     println!("{}", response.transcript());
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod executor;
pub mod flow;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use engine::{CommandGroup, OutputSink, TerminalEngine, TerminalResponse};
pub use error::{Error, ErrorKind, Result};
pub use executor::CclExecutor;
pub use flow::{FlowBuilder, FlowConfig};
pub use transport::{ConnectionProvider, SshConfig, SshConnectionPool};
