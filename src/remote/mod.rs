// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fan-out of genv operations to remote hosts over SSH.
//!
//! One SSH subprocess per host; hosts are partitioned by exit status, and
//! the partial-failure policy is configured per run: raise on the first
//! failed host, report it on stderr, or stay quiet.

pub mod core;
pub mod enforce;
mod runner;
mod ssh;

use futures_util::future::join_all;

use crate::error::{Error, Result};

pub use runner::{CommandOutput, Runner};
pub use ssh::Ssh;

/// A remote host.
#[derive(Debug, Clone)]
pub struct Host {
    pub hostname: String,
    pub timeout: Option<u64>,
}

/// Fan-out execution configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub hosts: Vec<Host>,
    /// Raise on the first host that cannot be reached.
    pub throw_on_error: bool,
    /// Swallow SSH errors entirely.
    pub quiet: bool,
}

/// A genv command to run on every host.
#[derive(Debug, Clone)]
pub struct Command {
    pub args: Vec<String>,
    pub sudo: bool,
}

impl Command {
    pub fn new(args: &[&str], sudo: bool) -> Self {
        Self {
            args: args.iter().map(|arg| arg.to_string()).collect(),
            sudo,
        }
    }

    /// The full remote argument vector, including the genv executable.
    fn all_args(&self) -> Vec<String> {
        let mut args = vec!["genv".to_string()];
        args.extend(self.args.iter().cloned());

        args
    }
}

/// Reprints remote output line by line with a `[hostname] ` prefix so human
/// output from remote rules is attributable.
pub fn reprint(hostname: &str, output: &str, to_stderr: bool) {
    for line in output.lines() {
        if line.is_empty() {
            continue;
        }

        if to_stderr {
            eprintln!("[{hostname}] {line}");
        } else {
            println!("[{hostname}] {line}");
        }
    }
}

/// Runs a command on multiple hosts over SSH and waits for all of them.
///
/// Returns the hosts that succeeded paired with their standard outputs.
/// Failed hosts are handled per the configured policy; stderr of successful
/// hosts is reprinted with a hostname prefix.
pub async fn run(
    config: &Config,
    command: &Command,
    stdins: Option<Vec<String>>,
) -> Result<Vec<(Host, String)>> {
    let args = command.all_args();

    let runs = config.hosts.iter().enumerate().map(|(i, host)| {
        let runner = Ssh::new(&host.hostname, host.timeout);
        let stdin = stdins.as_ref().map(|stdins| stdins[i].clone());
        let args = args.clone();

        async move { runner.run(&args, stdin.as_deref(), command.sudo).await }
    });

    let results = join_all(runs).await;

    let mut succeeded = Vec::new();

    for (host, result) in config.hosts.iter().zip(results) {
        let message = match result {
            Ok(output) if output.status.success() => {
                reprint(&host.hostname, &output.stderr, true);
                succeeded.push((host.clone(), output.stdout));
                continue;
            }
            Ok(output) => output.stderr.trim().to_string(),
            Err(err) => err.to_string(),
        };

        if config.throw_on_error {
            return Err(Error::Ssh {
                hostname: host.hostname.clone(),
                message,
            });
        }

        if !config.quiet {
            eprintln!(
                "Failed running SSH command on {} ({message})",
                host.hostname
            );
        }
    }

    Ok(succeeded)
}
