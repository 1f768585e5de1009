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

use serde::{Deserialize, Serialize};

use crate::utils;

/// The declared requirements of an environment.
///
/// All fields are optional; configuring an environment replaces the
/// configuration in full.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub name: Option<String>,
    pub gpu_memory: Option<String>,
    pub gpus: Option<u32>,
}

/// A logical GPU user: a shell, a container, a notebook kernel or a Python
/// process, identified by an opaque environment identifier (eid).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Env {
    pub eid: String,
    pub uid: u32,
    pub creation: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub config: Config,
    #[serde(default)]
    pub pids: Vec<u32>,
    #[serde(default)]
    pub kernel_ids: Vec<String>,
}

impl Env {
    /// An environment is active while it still holds at least one process or
    /// kernel. Inactive environments are removed by cleanup.
    pub fn active(&self) -> bool {
        !self.pids.is_empty() || !self.kernel_ids.is_empty()
    }

    /// Human readable time since creation.
    pub fn time_since(&self) -> String {
        utils::time_since(&self.creation)
    }

    /// Attaches a process or a Jupyter kernel to the environment.
    ///
    /// Repeated attachment of the same pid is allowed; cleanup removes every
    /// occurrence once the process dies.
    pub fn attach(&mut self, pid: Option<u32>, kernel_id: Option<&str>) {
        if let Some(pid) = pid {
            self.pids.push(pid);
        }

        if let Some(kernel_id) = kernel_id {
            self.kernel_ids.push(kernel_id.to_string());
        }
    }

    /// Drops the pids and kernels for which the poll returns false.
    pub fn cleanup(
        &mut self,
        poll_pid: &mut impl FnMut(u32) -> bool,
        poll_kernel: &mut impl FnMut(&str) -> bool,
    ) {
        self.pids.retain(|pid| poll_pid(*pid));
        self.kernel_ids.retain(|kernel_id| poll_kernel(kernel_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Env {
        Env {
            eid: "1337".to_string(),
            uid: 1000,
            creation: "01/02/2025 12:00:00".to_string(),
            username: Some("raz".to_string()),
            config: Config::default(),
            pids: vec![1337],
            kernel_ids: vec![],
        }
    }

    #[test]
    fn test_active() {
        let mut env = env();
        assert!(env.active());

        env.pids.clear();
        assert!(!env.active());

        env.kernel_ids.push("abc".to_string());
        assert!(env.active());
    }

    #[test]
    fn test_attach_allows_duplicates() {
        let mut env = env();
        env.attach(Some(1337), None);

        assert_eq!(env.pids, vec![1337, 1337]);
    }

    #[test]
    fn test_cleanup_removes_every_occurrence() {
        let mut env = env();
        env.attach(Some(1337), None);
        env.attach(Some(42), Some("abc"));

        env.cleanup(&mut |pid| pid != 1337, &mut |_| true);

        assert_eq!(env.pids, vec![42]);
        assert_eq!(env.kernel_ids, vec!["abc".to_string()]);
    }
}
