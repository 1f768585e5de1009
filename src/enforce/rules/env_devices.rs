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

use crate::entities::Survey;

/// Terminates processes running on devices not attached to their
/// environment.
pub fn env_devices(surveys: &mut [Survey]) {
    for survey in surveys {
        let mut pids = Vec::new();

        for env in survey.snapshot.envs.iter() {
            let allowed = survey.snapshot.devices.filter_eid(&env.eid).indices();

            for process in survey.snapshot.processes.filter_eid(&env.eid).iter() {
                let unallowed: Vec<String> = process
                    .indices()
                    .into_iter()
                    .filter(|index| !allowed.contains(index))
                    .map(|index| index.to_string())
                    .collect();

                if unallowed.is_empty() {
                    continue;
                }

                println!(
                    "{}Process {} from environment {} is using non-attached GPU(s) {}",
                    survey.prefix(),
                    process.pid,
                    env.eid,
                    unallowed.join(",")
                );

                pids.push(process.pid);
            }
        }

        for pid in pids {
            survey.terminate(pid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Device, Devices, Envs, Process, Processes, Snapshot, Usage};

    #[test]
    fn test_terminates_processes_outside_attached_devices() {
        let mut envs = Envs::default();
        envs.activate("a", 1000, None);

        let mut devices = Devices {
            devices: (0..2)
                .map(|index| Device {
                    index,
                    total_memory: "16gi".to_string(),
                    attachments: Vec::new(),
                })
                .collect(),
        };
        devices.attach("a", &[0], None);

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
                    eid: Some("a".to_string()),
                },
            ],
        };

        let mut surveys = vec![Survey::new(
            Snapshot {
                processes,
                envs,
                devices,
            },
            None,
        )];

        env_devices(&mut surveys);

        assert_eq!(surveys[0].report().terminate.pids(), vec![2]);
    }
}
