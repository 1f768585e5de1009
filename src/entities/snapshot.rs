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

use super::{Devices, Envs, Processes};

/// A consistent view of processes, environments and devices, taken under
/// the global lock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub processes: Processes,
    pub envs: Envs,
    pub devices: Devices,
}

impl Snapshot {
    /// Returns a new snapshot with only the given environments: processes
    /// whose eid is among them and devices holding at least one of their
    /// attachments (stripped to those attachments).
    pub fn filter_eids(&self, eids: &HashSet<String>) -> Snapshot {
        let envs = self.envs.filter_eids(eids);

        self.narrow(envs)
    }

    /// Returns a new snapshot with only one environment.
    pub fn filter_eid(&self, eid: &str) -> Snapshot {
        self.filter_eids(&HashSet::from([eid.to_string()]))
    }

    /// Returns a new snapshot with only the environments of a user.
    pub fn filter_username(&self, username: &str) -> Snapshot {
        let envs = self.envs.filter_username(username);

        self.narrow(envs)
    }

    fn narrow(&self, envs: Envs) -> Snapshot {
        let eids: HashSet<String> = envs.eids().into_iter().collect();

        Snapshot {
            processes: self.processes.filter_eids(&eids),
            envs,
            devices: self.devices.filter_eids(&eids, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Process, Usage};

    fn snapshot() -> Snapshot {
        let mut envs = Envs::default();
        envs.activate("a", 1000, Some("raz"));
        envs.activate("b", 1001, Some("paul"));

        let mut devices = Devices {
            devices: (0..2)
                .map(|index| crate::entities::Device {
                    index,
                    total_memory: "16gi".to_string(),
                    attachments: Vec::new(),
                })
                .collect(),
        };
        devices.attach("a", &[0], None);
        devices.attach("b", &[0, 1], Some("4gi"));

        let processes = Processes {
            processes: vec![
                Process {
                    pid: 1,
                    used_gpu_memory: vec![Usage {
                        index: 0,
                        gpu_memory: "1gi".to_string(),
                    }],
                    eid: Some("a".to_string()),
                },
                Process {
                    pid: 2,
                    used_gpu_memory: vec![Usage {
                        index: 1,
                        gpu_memory: "1gi".to_string(),
                    }],
                    eid: Some("b".to_string()),
                },
                Process {
                    pid: 3,
                    used_gpu_memory: vec![Usage {
                        index: 1,
                        gpu_memory: "1gi".to_string(),
                    }],
                    eid: None,
                },
            ],
        };

        Snapshot {
            processes,
            envs,
            devices,
        }
    }

    #[test]
    fn test_filter_eid_narrows_every_collection() {
        let filtered = snapshot().filter_eid("a");

        assert_eq!(filtered.envs.eids(), vec!["a".to_string()]);
        assert_eq!(filtered.processes.pids(), vec![1]);
        assert_eq!(filtered.devices.indices(), vec![0]);
        assert_eq!(filtered.devices.get(0).unwrap().eids(), vec!["a"]);
    }

    #[test]
    fn test_filter_username() {
        let filtered = snapshot().filter_username("paul");

        assert_eq!(filtered.envs.eids(), vec!["b".to_string()]);
        assert_eq!(filtered.processes.pids(), vec![2]);
        assert_eq!(filtered.devices.indices(), vec![0, 1]);
    }

    #[test]
    fn test_filter_drops_non_env_processes() {
        let eids = HashSet::from(["a".to_string(), "b".to_string()]);
        let filtered = snapshot().filter_eids(&eids);

        assert_eq!(filtered.processes.pids(), vec![1, 2]);
    }
}
