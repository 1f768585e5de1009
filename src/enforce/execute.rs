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

use std::path::Path;

use tracing::debug;

use crate::core;
use crate::entities::Report;
use crate::error::Result;
use crate::probe;

/// Applies a report: terminates the listed processes and removes the listed
/// attachments.
///
/// Vanished processes are tolerated and permission failures are reported;
/// neither aborts the run. The caller must hold the global lock.
pub fn execute(root: &Path, report: &Report) -> Result<()> {
    for process in report.terminate.iter() {
        let indices: Vec<String> = process
            .indices()
            .iter()
            .map(|index| index.to_string())
            .collect();

        println!(
            "Terminating process {} from environment {} that is running on GPU(s) {}",
            process.pid,
            process.eid.as_deref().unwrap_or("N/A"),
            indices.join(",")
        );

        if let Err(err) = probe::process::terminate(process.pid) {
            match err.raw_os_error() {
                Some(libc::ESRCH) => debug!("Process {} already terminated", process.pid),
                Some(libc::EPERM) => eprintln!(
                    "[ERROR] Not enough permissions to terminate process {}",
                    process.pid
                ),
                _ => eprintln!(
                    "[ERROR] Failed terminating process {} ({err})",
                    process.pid
                ),
            }
        }
    }

    for (index, envs) in &report.detach {
        for env in envs.iter() {
            println!(
                "Detaching environment {} of user {} from device {index}",
                env.eid,
                env.username.as_deref().unwrap_or("N/A")
            );

            core::devices::detach(root, &env.eid, Some(*index))?;
        }
    }

    Ok(())
}
