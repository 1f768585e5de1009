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

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::{Report, Snapshot};

/// The mutable builder that collects a [`Report`] while enforcement rules
/// run over a snapshot.
///
/// The hostname is set when the survey covers a remote host, so rule output
/// can be attributed.
#[derive(Debug)]
pub struct Survey {
    pub snapshot: Snapshot,
    pub hostname: Option<String>,

    pids: BTreeSet<u32>,
    eids: BTreeMap<u32, BTreeSet<String>>,
}

impl Survey {
    pub fn new(snapshot: Snapshot, hostname: Option<String>) -> Self {
        Self {
            snapshot,
            hostname,
            pids: BTreeSet::new(),
            eids: BTreeMap::new(),
        }
    }

    /// The `[hostname] ` prefix for rule output, empty for local surveys.
    pub fn prefix(&self) -> String {
        match &self.hostname {
            Some(hostname) => format!("[{hostname}] "),
            None => String::new(),
        }
    }

    /// Schedules a process for termination.
    pub fn terminate(&mut self, pid: u32) {
        self.pids.insert(pid);
    }

    /// Schedules environments for detachment from a device, terminating
    /// their processes on that device as well.
    pub fn detach(&mut self, index: u32, eids: impl IntoIterator<Item = String>) {
        let eids: BTreeSet<String> = eids.into_iter().collect();

        for eid in &eids {
            let processes = self
                .snapshot
                .processes
                .filter_eid(eid)
                .filter_index(index, false);

            self.pids.extend(processes.pids());
        }

        self.eids.entry(index).or_default().extend(eids);
    }

    /// Renders the collected work as a report.
    pub fn report(&self) -> Report {
        let pids: HashSet<u32> = self.pids.iter().copied().collect();

        Report {
            terminate: self.snapshot.processes.filter_pids(&pids),
            detach: self
                .eids
                .iter()
                .map(|(index, eids)| {
                    let eids: HashSet<String> = eids.iter().cloned().collect();

                    (*index, self.snapshot.envs.filter_eids(&eids))
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Device, Devices, Envs, Process, Processes, Usage};

    fn snapshot() -> Snapshot {
        let mut envs = Envs::default();
        envs.activate("a", 1000, Some("raz"));

        let mut devices = Devices {
            devices: vec![Device {
                index: 0,
                total_memory: "16gi".to_string(),
                attachments: Vec::new(),
            }],
        };
        devices.attach("a", &[0], None);

        Snapshot {
            processes: Processes {
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
                            index: 0,
                            gpu_memory: "1gi".to_string(),
                        }],
                        eid: None,
                    },
                ],
            },
            envs,
            devices,
        }
    }

    #[test]
    fn test_terminate_collects_pids() {
        let mut survey = Survey::new(snapshot(), None);

        survey.terminate(2);
        survey.terminate(2);

        let report = survey.report();
        assert_eq!(report.terminate.pids(), vec![2]);
        assert!(report.detach.is_empty());
    }

    #[test]
    fn test_detach_terminates_processes_on_that_device() {
        let mut survey = Survey::new(snapshot(), None);

        survey.detach(0, ["a".to_string()]);

        let report = survey.report();
        assert_eq!(report.terminate.pids(), vec![1]);
        assert_eq!(
            report.detach.get(&0).unwrap().eids(),
            vec!["a".to_string()]
        );
    }

    #[test]
    fn test_prefix() {
        let local = Survey::new(snapshot(), None);
        assert_eq!(local.prefix(), "");

        let remote = Survey::new(snapshot(), Some("gpu-17".to_string()));
        assert_eq!(remote.prefix(), "[gpu-17] ");
    }
}
