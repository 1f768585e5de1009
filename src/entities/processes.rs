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

use super::Process;

/// A collection of compute processes.
///
/// Rebuilt fresh from `nvidia-smi` on every snapshot; never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Processes {
    pub processes: Vec<Process>,
}

impl Processes {
    pub fn pids(&self) -> Vec<u32> {
        self.processes.iter().map(|process| process.pid).collect()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.processes.iter()
    }

    pub fn get(&self, pid: u32) -> Option<&Process> {
        self.processes.iter().find(|process| process.pid == pid)
    }

    /// Returns a new collection with only the given pids.
    pub fn filter_pids(&self, pids: &HashSet<u32>) -> Processes {
        Processes {
            processes: self
                .processes
                .iter()
                .filter(|process| pids.contains(&process.pid))
                .cloned()
                .collect(),
        }
    }

    /// Returns a new collection with only processes of the given
    /// environment.
    pub fn filter_eid(&self, eid: &str) -> Processes {
        Processes {
            processes: self
                .processes
                .iter()
                .filter(|process| process.eid.as_deref() == Some(eid))
                .cloned()
                .collect(),
        }
    }

    /// Returns a new collection with only processes of the given
    /// environments. Processes without an environment never match.
    pub fn filter_eids(&self, eids: &HashSet<String>) -> Processes {
        Processes {
            processes: self
                .processes
                .iter()
                .filter(|process| {
                    process
                        .eid
                        .as_ref()
                        .is_some_and(|eid| eids.contains(eid))
                })
                .cloned()
                .collect(),
        }
    }

    /// Returns a new collection with only processes running on the given
    /// device. Deep filtering strips usage of other devices off each
    /// retained process.
    pub fn filter_index(&self, index: u32, deep: bool) -> Processes {
        let processes = self
            .processes
            .iter()
            .map(|process| {
                if deep {
                    process.filter_index(index)
                } else {
                    process.clone()
                }
            })
            .filter(|process| process.indices().contains(&index));

        Processes {
            processes: processes.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Usage;

    fn processes() -> Processes {
        Processes {
            processes: vec![
                Process {
                    pid: 1,
                    used_gpu_memory: vec![Usage {
                        index: 0,
                        gpu_memory: "1gi".to_string(),
                    }],
                    eid: Some("x".to_string()),
                },
                Process {
                    pid: 2,
                    used_gpu_memory: vec![
                        Usage {
                            index: 0,
                            gpu_memory: "2gi".to_string(),
                        },
                        Usage {
                            index: 1,
                            gpu_memory: "2gi".to_string(),
                        },
                    ],
                    eid: Some("y".to_string()),
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
        }
    }

    #[test]
    fn test_filter_eid() {
        assert_eq!(processes().filter_eid("x").pids(), vec![1]);
        assert!(processes().filter_eid("nope").is_empty());
    }

    #[test]
    fn test_filter_eids_ignores_non_env_processes() {
        let eids = HashSet::from(["x".to_string(), "y".to_string()]);

        assert_eq!(processes().filter_eids(&eids).pids(), vec![1, 2]);
    }

    #[test]
    fn test_filter_index_deep() {
        let filtered = processes().filter_index(1, true);

        assert_eq!(filtered.pids(), vec![2, 3]);
        assert_eq!(filtered.get(2).unwrap().indices(), vec![1]);
    }

    #[test]
    fn test_filter_index_shallow_keeps_usage() {
        let filtered = processes().filter_index(1, false);

        assert_eq!(filtered.get(2).unwrap().indices(), vec![0, 1]);
    }

    #[test]
    fn test_filter_pids() {
        let pids = HashSet::from([1, 3]);

        assert_eq!(processes().filter_pids(&pids).pids(), vec![1, 3]);
    }
}
