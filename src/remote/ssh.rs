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

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::Result;

use super::runner::{CommandOutput, Runner};

/// Runs commands on a remote host over an SSH subprocess.
pub struct Ssh {
    hostname: String,
    timeout: Option<u64>,
    env: Vec<(String, String)>,
}

impl Ssh {
    pub fn new(hostname: &str, timeout: Option<u64>) -> Self {
        Self {
            hostname: hostname.to_string(),
            timeout,
            env: Vec::new(),
        }
    }

    /// Adds environment variables to prefix the remote command with.
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    /// The single command string executed by the remote shell.
    fn remote_command(&self, args: &[String], sudo: bool) -> String {
        let mut command = args.join(" ");

        if !self.env.is_empty() {
            let env = self
                .env
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join(" ");

            command = format!("env {env} {command}");
        }

        if sudo {
            command = format!("sudo {command}");
        }

        command
    }
}

#[async_trait]
impl Runner for Ssh {
    async fn run(
        &self,
        args: &[String],
        stdin: Option<&str>,
        sudo: bool,
    ) -> Result<CommandOutput> {
        let mut command = tokio::process::Command::new("ssh");

        if let Some(timeout) = self.timeout {
            command.arg("-o").arg(format!("ConnectTimeout={timeout}"));
        }

        command
            .arg(&self.hostname)
            .arg(self.remote_command(args, sudo))
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn()?;

        if let Some(stdin) = stdin {
            let mut handle = child.stdin.take().expect("stdin is piped");

            handle.write_all(stdin.as_bytes()).await?;
            drop(handle);
        }

        let output = child.wait_with_output().await?;

        Ok(CommandOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_command_plain() {
        let ssh = Ssh::new("gpu-17", None);

        assert_eq!(
            ssh.remote_command(&["genv".to_string(), "status".to_string()], false),
            "genv status"
        );
    }

    #[test]
    fn test_remote_command_with_env_and_sudo() {
        let ssh = Ssh::new("gpu-17", None)
            .with_env(vec![("GENV_PREACTIVATE".to_string(), "1".to_string())]);

        assert_eq!(
            ssh.remote_command(&["genv".to_string(), "activate".to_string()], true),
            "sudo env GENV_PREACTIVATE=1 genv activate"
        );
    }
}
