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

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::utils;

use super::{Config, Env};

/// A collection of environments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envs {
    pub envs: Vec<Env>,
}

impl Envs {
    pub fn eids(&self) -> Vec<String> {
        self.envs.iter().map(|env| env.eid.clone()).collect()
    }

    /// The distinct usernames of all environments that have one.
    pub fn usernames(&self) -> Vec<String> {
        let mut usernames: Vec<String> = self
            .envs
            .iter()
            .filter_map(|env| env.username.clone())
            .collect();

        usernames.sort();
        usernames.dedup();

        usernames
    }

    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Env> {
        self.envs.iter()
    }

    pub fn contains(&self, eid: &str) -> bool {
        self.envs.iter().any(|env| env.eid == eid)
    }

    pub fn get(&self, eid: &str) -> Option<&Env> {
        self.envs.iter().find(|env| env.eid == eid)
    }

    pub fn get_mut(&mut self, eid: &str) -> Option<&mut Env> {
        self.envs.iter_mut().find(|env| env.eid == eid)
    }

    /// Activates a new environment with no holders and a default config.
    pub fn activate(&mut self, eid: &str, uid: u32, username: Option<&str>) {
        self.envs.push(Env {
            eid: eid.to_string(),
            uid,
            creation: utils::now(),
            username: username.map(str::to_string),
            config: Config::default(),
            pids: Vec::new(),
            kernel_ids: Vec::new(),
        });
    }

    /// Returns a new collection with only the given environment.
    pub fn filter_eid(&self, eid: &str) -> Envs {
        Envs {
            envs: self
                .envs
                .iter()
                .filter(|env| env.eid == eid)
                .cloned()
                .collect(),
        }
    }

    /// Returns a new collection with only the given environments.
    pub fn filter_eids(&self, eids: &HashSet<String>) -> Envs {
        Envs {
            envs: self
                .envs
                .iter()
                .filter(|env| eids.contains(&env.eid))
                .cloned()
                .collect(),
        }
    }

    /// Returns a new collection with only the environments of a user.
    pub fn filter_username(&self, username: &str) -> Envs {
        Envs {
            envs: self
                .envs
                .iter()
                .filter(|env| env.username.as_deref() == Some(username))
                .cloned()
                .collect(),
        }
    }

    /// Returns a new collection with only the environments of a given name.
    pub fn filter_name(&self, name: &str) -> Envs {
        Envs {
            envs: self
                .envs
                .iter()
                .filter(|env| env.config.name.as_deref() == Some(name))
                .cloned()
                .collect(),
        }
    }

    /// Prunes dead holders from every environment and drops the ones left
    /// with no holders at all.
    pub fn cleanup(
        &mut self,
        mut poll_pid: impl FnMut(u32) -> bool,
        mut poll_kernel: impl FnMut(&str) -> bool,
    ) {
        for env in &mut self.envs {
            env.cleanup(&mut poll_pid, &mut poll_kernel);
        }

        self.envs.retain(Env::active);
    }

    /// Returns the environments holding the given process or kernel.
    pub fn find(&self, pid: Option<u32>, kernel_id: Option<&str>) -> Vec<&Env> {
        self.envs
            .iter()
            .filter(|env| {
                if let Some(pid) = pid {
                    if env.pids.contains(&pid) {
                        return true;
                    }
                }

                if let Some(kernel_id) = kernel_id {
                    if env.kernel_ids.iter().any(|k| k == kernel_id) {
                        return true;
                    }
                }

                false
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envs() -> Envs {
        let mut envs = Envs::default();

        envs.activate("1337", 1000, Some("raz"));
        envs.get_mut("1337").unwrap().attach(Some(1337), None);

        envs.activate("42", 1001, Some("paul"));
        envs.get_mut("42").unwrap().attach(None, Some("kernel-a"));

        envs
    }

    #[test]
    fn test_activate_starts_with_no_holders() {
        let mut envs = Envs::default();
        envs.activate("1337", 1000, None);

        let env = envs.get("1337").unwrap();
        assert!(env.pids.is_empty());
        assert!(env.kernel_ids.is_empty());
        assert_eq!(env.config, Config::default());
    }

    #[test]
    fn test_filter_eid_keeps_only_that_env() {
        let envs = envs();
        let filtered = envs.filter_eid("1337");

        assert_eq!(filtered.eids(), vec!["1337".to_string()]);
    }

    #[test]
    fn test_filter_username() {
        let envs = envs();

        assert_eq!(envs.filter_username("paul").eids(), vec!["42".to_string()]);
        assert!(envs.filter_username("nobody").is_empty());
    }

    #[test]
    fn test_cleanup_drops_empty_envs() {
        let mut envs = envs();

        envs.cleanup(|_| false, |_| true);

        assert_eq!(envs.eids(), vec!["42".to_string()]);

        envs.cleanup(|_| false, |_| false);

        assert!(envs.is_empty());
    }

    #[test]
    fn test_cleanup_twice_is_idempotent() {
        let mut envs = envs();

        envs.cleanup(|pid| pid == 1337, |_| false);
        let once = envs.eids();

        envs.cleanup(|pid| pid == 1337, |_| false);

        assert_eq!(envs.eids(), once);
    }

    #[test]
    fn test_find_by_pid_and_kernel() {
        let envs = envs();

        let by_pid = envs.find(Some(1337), None);
        assert_eq!(by_pid.len(), 1);
        assert_eq!(by_pid[0].eid, "1337");

        let by_kernel = envs.find(None, Some("kernel-a"));
        assert_eq!(by_kernel.len(), 1);
        assert_eq!(by_kernel[0].eid, "42");

        assert!(envs.find(Some(7), None).is_empty());
    }

    #[test]
    fn test_no_two_envs_share_a_pid_after_deactivate() {
        let mut envs = envs();

        // deactivating a pid removes it from every environment that holds it
        envs.get_mut("42").unwrap().attach(Some(1337), None);
        envs.cleanup(|pid| pid != 1337, |_| true);

        assert!(envs.find(Some(1337), None).is_empty());
    }
}
