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

use std::process::ExitStatus;

use async_trait::async_trait;

use crate::error::Result;

/// The output of a finished remote command.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Something that can run a command and capture its output.
///
/// The seam between the fan-out logic and the SSH transport; tests provide
/// their own implementation.
#[async_trait]
pub trait Runner {
    async fn run(&self, args: &[String], stdin: Option<&str>, sudo: bool)
        -> Result<CommandOutput>;
}
