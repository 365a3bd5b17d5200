//! Run CCL commands on a backend host.
//!
//! Connects over SSH, starts the interpreter in the given environment,
//! runs each `--command`, and prints the session transcript.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example run_ccl -- --host node1 --user d_user --password secret \
//!     --env dev --command 'execute my_prog go'
//! ```
//!
//! With a security login:
//! ```bash
//! cargo run --example run_ccl -- --host node1 --user d_user --password secret \
//!     --env dev --domain-user jsmith --domain prod --domain-password s3cret \
//!     --command 'execute my_prog go'
//! ```

use std::env;
use std::time::Duration;

use cclexpect::credentials::{DomainCredentials, HostCredentials, StaticCredentials};
use cclexpect::transport::{SshConnectionPool, SshOptions};
use cclexpect::{CclExecutor, FlowConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let host = HostCredentials::new(&args.host, &args.user, args.password.clone().unwrap_or_default());
    let mut credentials = StaticCredentials::new(host);
    let authenticate = match (&args.domain_user, &args.domain, &args.domain_password) {
        (Some(user), Some(domain), Some(password)) => {
            credentials = credentials.with_domain(DomainCredentials::new(user, domain, password));
            true
        }
        _ => false,
    };

    let options = SshOptions {
        timeout: Duration::from_secs(args.timeout),
        ..SshOptions::default()
    };
    let executor = CclExecutor::new(SshConnectionPool::new(options), credentials);

    let host_name = args.host.split(':').next().unwrap_or(&args.host);
    let config = FlowConfig::builder(FlowConfig::default_os_prompt_pattern(
        host_name, &args.env, &args.user,
    ))
    .environment(&args.env)
    .skip_env_set(args.env.is_empty())
    .capture_output(args.capture)
    .build()?;

    println!("Running {} command(s) on {}...", args.commands.len(), args.host);

    match executor.execute(&args.commands, authenticate, &config).await {
        Ok(response) => {
            println!("{}", "-".repeat(50));
            println!("{}", response.transcript());
            println!("{}", "-".repeat(50));
            println!("Exit status: {}", response.exit_status());
        }
        Err(e) => {
            eprintln!("Flow failed ({:?}): {}", e.kind(), e);
            if let Some(transcript) = e.transcript() {
                eprintln!("Last output:\n{}", transcript);
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    user: String,
    password: Option<String>,
    env: String,
    domain_user: Option<String>,
    domain: Option<String>,
    domain_password: Option<String>,
    commands: Vec<String>,
    capture: bool,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut parsed = Self {
            host: "localhost".to_string(),
            user: env::var("USER").unwrap_or_else(|_| "root".to_string()),
            password: None,
            env: String::new(),
            domain_user: None,
            domain: None,
            domain_password: None,
            commands: Vec::new(),
            capture: false,
            timeout: 30,
        };

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1).cloned();
            match args[i].as_str() {
                "--host" | "-h" => parsed.host = value.unwrap_or(parsed.host),
                "--user" | "-u" => parsed.user = value.unwrap_or(parsed.user),
                "--password" | "-P" => parsed.password = value,
                "--env" | "-e" => parsed.env = value.unwrap_or_default(),
                "--domain-user" => parsed.domain_user = value,
                "--domain" => parsed.domain = value,
                "--domain-password" => parsed.domain_password = value,
                "--command" | "-c" => parsed.commands.extend(value),
                "--timeout" | "-t" => {
                    parsed.timeout = value.and_then(|v| v.parse().ok()).unwrap_or(30)
                }
                "--capture" => {
                    parsed.capture = true;
                    i += 1;
                    continue;
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {}", other);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        parsed
    }

    fn print_help() {
        println!(
            r#"cclexpect run_ccl example

USAGE:
    cargo run --example run_ccl -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>             Backend host, optionally host:port [default: localhost]
    -u, --user <USER>             SSH username [default: $USER]
    -P, --password <PASS>         SSH password
    -e, --env <ENV>               CCL environment passed to envset
    --domain-user <USER>          Security login username
    --domain <DOMAIN>             Security login domain
    --domain-password <PASS>      Security login password
    -c, --command <CCL>           Command to run (repeatable)
    --capture                     Only mirror output between capture markers
    -t, --timeout <SECS>          Connection timeout [default: 30]
    --help                        Print this help message
"#
        );
    }
}
