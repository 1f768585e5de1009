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

use tracing::warn;

use crate::entities::Survey;
use crate::utils::{bytes_to_memory, memory_to_bytes};

/// Terminates processes of environments that exceed their configured memory
/// capacity on a device.
///
/// Processes are terminated in iteration order until the freed amount covers
/// the excess.
pub fn env_memory(surveys: &mut [Survey]) {
    for survey in surveys {
        let mut pids = Vec::new();

        for env in survey.snapshot.envs.iter() {
            let Some(capacity) = env.config.gpu_memory.as_deref() else {
                continue;
            };

            let capacity_bytes = match memory_to_bytes(capacity) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!("Skipping environment {} ({err})", env.eid);
                    continue;
                }
            };

            for device in survey.snapshot.devices.filter_eid(&env.eid).iter() {
                let processes = survey
                    .snapshot
                    .processes
                    .filter_eid(&env.eid)
                    .filter_index(device.index, true);

                let used_bytes: u64 = processes
                    .iter()
                    .filter_map(|process| process.total_bytes().ok())
                    .sum();

                if used_bytes <= capacity_bytes {
                    continue;
                }

                let over_bytes = used_bytes - capacity_bytes;

                println!(
                    "{}Environment {} is using {} on device {} which is {} over its capacity of {}",
                    survey.prefix(),
                    env.eid,
                    bytes_to_memory(used_bytes, "m"),
                    device.index,
                    bytes_to_memory(over_bytes, "m"),
                    capacity
                );

                let mut freed_bytes = 0;

                for process in processes.iter() {
                    pids.push(process.pid);

                    freed_bytes += process.total_bytes().unwrap_or(0);

                    if freed_bytes >= over_bytes {
                        break;
                    }
                }
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
    use crate::entities::{Config, Device, Devices, Envs, Process, Processes, Snapshot, Usage};

    fn process(pid: u32, index: u32, gpu_memory: &str) -> Process {
        Process {
            pid,
            used_gpu_memory: vec![Usage {
                index,
                gpu_memory: gpu_memory.to_string(),
            }],
            eid: Some("a".to_string()),
        }
    }

    #[test]
    fn test_terminates_until_enough_memory_is_freed() {
        let mut envs = Envs::default();
        envs.activate("a", 1000, None);
        envs.get_mut("a").unwrap().config = Config {
            name: None,
            gpu_memory: Some("4gi".to_string()),
            gpus: None,
        };

        let mut devices = Devices {
            devices: vec![Device {
                index: 0,
                total_memory: "16gi".to_string(),
                attachments: Vec::new(),
            }],
        };
        devices.attach("a", &[0], Some("4gi"));

        // 3gi + 3gi = 6gi used, 2gi over capacity; terminating the first
        // process frees 3gi which already covers the excess
        let processes = Processes {
            processes: vec![process(1, 0, "3gi"), process(2, 0, "3gi")],
        };

        let mut surveys = vec![Survey::new(
            Snapshot {
                processes,
                envs,
                devices,
            },
            None,
        )];

        env_memory(&mut surveys);

        assert_eq!(surveys[0].report().terminate.pids(), vec![1]);
    }

    #[test]
    fn test_within_capacity_is_untouched() {
        let mut envs = Envs::default();
        envs.activate("a", 1000, None);
        envs.get_mut("a").unwrap().config = Config {
            name: None,
            gpu_memory: Some("8gi".to_string()),
            gpus: None,
        };

        let mut devices = Devices {
            devices: vec![Device {
                index: 0,
                total_memory: "16gi".to_string(),
                attachments: Vec::new(),
            }],
        };
        devices.attach("a", &[0], Some("8gi"));

        let processes = Processes {
            processes: vec![process(1, 0, "3gi")],
        };

        let mut surveys = vec![Survey::new(
            Snapshot {
                processes,
                envs,
                devices,
            },
            None,
        )];

        env_memory(&mut surveys);

        assert!(surveys[0].report().is_empty());
    }
}
