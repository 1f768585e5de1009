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

use std::collections::HashMap;

use crate::entities::Survey;

/// Enforces a maximum attached device count per user, across all surveyed
/// hosts.
///
/// Devices are detached starting at the highest index until the surplus is
/// gone; detaching also terminates the detached environments' processes on
/// those devices.
pub fn max_devices_per_user(
    surveys: &mut [Survey],
    maximum: u32,
    maximum_for_user: &HashMap<String, u32>,
) {
    let mut usernames: Vec<String> = surveys
        .iter()
        .flat_map(|survey| survey.snapshot.envs.usernames())
        .collect();

    usernames.sort();
    usernames.dedup();

    for username in usernames {
        let maximum = *maximum_for_user.get(&username).unwrap_or(&maximum) as usize;

        let snapshots: Vec<_> = surveys
            .iter()
            .map(|survey| survey.snapshot.filter_username(&username))
            .collect();

        let attached: usize = snapshots.iter().map(|snapshot| snapshot.devices.len()).sum();

        if attached <= maximum {
            continue;
        }

        let over = attached - maximum;

        if surveys.iter().all(|survey| survey.hostname.is_some()) {
            let hosts = snapshots
                .iter()
                .filter(|snapshot| !snapshot.envs.is_empty())
                .count();

            println!(
                "User {username} is using {attached} devices on {hosts} hosts which is {over} more than the maximum allowed"
            );
        } else {
            println!(
                "User {username} is using {attached} devices which is {over} more than the maximum allowed"
            );
        }

        let mut detached = 0;

        for (snapshot, survey) in snapshots.iter().zip(surveys.iter_mut()) {
            let mut indices = snapshot.devices.indices();
            indices.reverse();

            for index in indices {
                if detached == over {
                    break;
                }

                let eids: Vec<String> = snapshot
                    .devices
                    .get(index)
                    .map(|device| device.eids().iter().map(|eid| eid.to_string()).collect())
                    .unwrap_or_default();

                survey.detach(index, eids);

                detached += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Device, Devices, Envs, Process, Processes, Snapshot, Usage};

    fn survey(hostname: Option<&str>, indices: &[u32]) -> Survey {
        let mut envs = Envs::default();
        envs.activate("a", 1000, Some("raz"));

        let mut devices = Devices {
            devices: (0..4)
                .map(|index| Device {
                    index,
                    total_memory: "16gi".to_string(),
                    attachments: Vec::new(),
                })
                .collect(),
        };
        devices.attach("a", indices, None);

        let processes = Processes {
            processes: indices
                .iter()
                .map(|index| Process {
                    pid: 100 + index,
                    used_gpu_memory: vec![Usage {
                        index: *index,
                        gpu_memory: "1gi".to_string(),
                    }],
                    eid: Some("a".to_string()),
                })
                .collect(),
        };

        Survey::new(
            Snapshot {
                processes,
                envs,
                devices,
            },
            hostname.map(str::to_string),
        )
    }

    #[test]
    fn test_detaches_highest_indices_first() {
        let mut surveys = vec![survey(None, &[0, 1, 2, 3])];

        max_devices_per_user(&mut surveys, 2, &HashMap::new());

        let report = surveys[0].report();

        let mut detached: Vec<u32> = report.detach.keys().copied().collect();
        detached.sort_unstable();
        assert_eq!(detached, vec![2, 3]);

        // processes of the detached environment on those devices die too
        assert_eq!(report.terminate.pids(), vec![102, 103]);
    }

    #[test]
    fn test_per_user_override_wins() {
        let mut surveys = vec![survey(None, &[0, 1, 2])];

        let overrides = HashMap::from([("raz".to_string(), 3)]);

        max_devices_per_user(&mut surveys, 1, &overrides);

        assert!(surveys[0].report().is_empty());
    }

    #[test]
    fn test_counts_across_hosts() {
        let mut surveys = vec![
            survey(Some("host-a"), &[0, 1]),
            survey(Some("host-b"), &[0, 1]),
        ];

        max_devices_per_user(&mut surveys, 3, &HashMap::new());

        // one device over; the first host's highest index goes first
        let report_a = surveys[0].report();
        let report_b = surveys[1].report();

        assert_eq!(report_a.detach.len(), 1);
        assert!(report_a.detach.contains_key(&1));
        assert!(report_b.detach.is_empty());
    }

    #[test]
    fn test_under_the_cap_is_untouched() {
        let mut surveys = vec![survey(None, &[0, 1])];

        max_devices_per_user(&mut surveys, 2, &HashMap::new());

        assert!(surveys[0].report().is_empty());
    }
}
