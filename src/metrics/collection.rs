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

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

use crate::entities::Snapshot;

/// What identity a metric's label set is keyed on; drives stale-label
/// cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    System,
    Device,
    Env,
    Process,
    User,
}

/// A gauge specification.
#[derive(Debug, Clone, Copy)]
pub struct Spec {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
    pub kind: Kind,
}

/// The gauges the monitoring loop publishes.
pub const SPECS: &[Spec] = &[
    Spec {
        name: "genv_envs_total",
        help: "Number of active environments",
        labels: &["hostname"],
        kind: Kind::System,
    },
    Spec {
        name: "genv_processes_total",
        help: "Number of running compute processes",
        labels: &["hostname"],
        kind: Kind::System,
    },
    Spec {
        name: "genv_device_attachments",
        help: "Number of environments attached to a device",
        labels: &["hostname", "index"],
        kind: Kind::Device,
    },
    Spec {
        name: "genv_env_processes",
        help: "Number of running compute processes of an environment",
        labels: &["hostname", "eid"],
        kind: Kind::Env,
    },
    Spec {
        name: "genv_env_attached_devices",
        help: "Number of devices attached to an environment",
        labels: &["hostname", "eid"],
        kind: Kind::Env,
    },
    Spec {
        name: "genv_process_used_gpu_memory_bytes",
        help: "GPU memory used by a compute process",
        labels: &["hostname", "pid", "eid"],
        kind: Kind::Process,
    },
    Spec {
        name: "genv_user_envs",
        help: "Number of active environments of a user",
        labels: &["hostname", "username"],
        kind: Kind::User,
    },
    Spec {
        name: "genv_user_attached_devices",
        help: "Number of devices attached to environments of a user",
        labels: &["hostname", "username"],
        kind: Kind::User,
    },
];

/// A single gauge with labeled series.
#[derive(Debug)]
pub struct Metric {
    pub spec: Spec,
    values: BTreeMap<Vec<String>, f64>,
}

impl Metric {
    fn new(spec: Spec) -> Self {
        Self {
            spec,
            values: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, labels: Vec<String>, value: f64) {
        self.values.insert(labels, value);
    }

    pub fn label_sets(&self) -> Vec<Vec<String>> {
        self.values.keys().cloned().collect()
    }

    pub fn remove(&mut self, labels: &[String]) {
        self.values.remove(labels);
    }
}

/// A metric collection keyed by hostname, updated from snapshots.
#[derive(Debug)]
pub struct Collection {
    metrics: Vec<Metric>,
}

impl Collection {
    pub fn new(specs: &[Spec]) -> Self {
        Self {
            metrics: specs.iter().map(|spec| Metric::new(*spec)).collect(),
        }
    }

    fn metric(&mut self, name: &str) -> &mut Metric {
        self.metrics
            .iter_mut()
            .find(|metric| metric.spec.name == name)
            .expect("metric names come from SPECS")
    }

    /// Updates every gauge from a host snapshot.
    pub fn update(&mut self, hostname: &str, snapshot: &Snapshot) {
        let host = hostname.to_string();

        self.metric("genv_envs_total")
            .set(vec![host.clone()], snapshot.envs.len() as f64);

        self.metric("genv_processes_total")
            .set(vec![host.clone()], snapshot.processes.len() as f64);

        for device in snapshot.devices.iter() {
            self.metric("genv_device_attachments").set(
                vec![host.clone(), device.index.to_string()],
                device.attachments.len() as f64,
            );
        }

        for env in snapshot.envs.iter() {
            let narrowed = snapshot.filter_eid(&env.eid);

            self.metric("genv_env_processes").set(
                vec![host.clone(), env.eid.clone()],
                narrowed.processes.len() as f64,
            );

            self.metric("genv_env_attached_devices").set(
                vec![host.clone(), env.eid.clone()],
                narrowed.devices.len() as f64,
            );
        }

        for process in snapshot.processes.iter() {
            self.metric("genv_process_used_gpu_memory_bytes").set(
                vec![
                    host.clone(),
                    process.pid.to_string(),
                    process.eid.clone().unwrap_or_default(),
                ],
                process.total_bytes().unwrap_or(0) as f64,
            );
        }

        for username in snapshot.envs.usernames() {
            let narrowed = snapshot.filter_username(&username);

            self.metric("genv_user_envs").set(
                vec![host.clone(), username.clone()],
                narrowed.envs.len() as f64,
            );

            self.metric("genv_user_attached_devices").set(
                vec![host.clone(), username.clone()],
                narrowed.devices.len() as f64,
            );
        }
    }

    /// Removes series of this host whose identity no longer appears in the
    /// snapshot.
    pub fn cleanup(&mut self, hostname: &str, snapshot: &Snapshot) {
        let eids: HashSet<String> = snapshot.envs.eids().into_iter().collect();
        let pids: HashSet<String> = snapshot
            .processes
            .pids()
            .into_iter()
            .map(|pid| pid.to_string())
            .collect();
        let indices: HashSet<String> = snapshot
            .devices
            .indices()
            .into_iter()
            .map(|index| index.to_string())
            .collect();
        let usernames: HashSet<String> = snapshot.envs.usernames().into_iter().collect();

        for metric in &mut self.metrics {
            for labels in metric.label_sets() {
                if labels[0] != hostname {
                    continue;
                }

                let stale = match metric.spec.kind {
                    Kind::System => false,
                    Kind::Device => !indices.contains(&labels[1]),
                    Kind::Env => !eids.contains(&labels[1]),
                    Kind::Process => !pids.contains(&labels[1]),
                    Kind::User => !usernames.contains(&labels[1]),
                };

                if stale {
                    metric.remove(&labels);
                }
            }
        }
    }

    /// Renders the collection in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for metric in &self.metrics {
            let _ = writeln!(out, "# HELP {} {}", metric.spec.name, metric.spec.help);
            let _ = writeln!(out, "# TYPE {} gauge", metric.spec.name);

            for (labels, value) in &metric.values {
                let rendered: Vec<String> = metric
                    .spec
                    .labels
                    .iter()
                    .zip(labels)
                    .map(|(name, value)| format!("{name}=\"{value}\""))
                    .collect();

                let _ = writeln!(
                    out,
                    "{}{{{}}} {value}",
                    metric.spec.name,
                    rendered.join(",")
                );
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Device, Devices, Envs, Process, Processes, Usage};

    fn snapshot(eids: &[&str]) -> Snapshot {
        let mut envs = Envs::default();

        for eid in eids {
            envs.activate(eid, 1000, Some("raz"));
        }

        let mut devices = Devices {
            devices: vec![Device {
                index: 0,
                total_memory: "16gi".to_string(),
                attachments: Vec::new(),
            }],
        };

        for eid in eids {
            devices.attach(eid, &[0], Some("1gi"));
        }

        let processes = Processes {
            processes: eids
                .iter()
                .enumerate()
                .map(|(i, eid)| Process {
                    pid: i as u32 + 1,
                    used_gpu_memory: vec![Usage {
                        index: 0,
                        gpu_memory: "1gi".to_string(),
                    }],
                    eid: Some(eid.to_string()),
                })
                .collect(),
        };

        Snapshot {
            processes,
            envs,
            devices,
        }
    }

    #[test]
    fn test_update_then_cleanup_removes_stale_labels() {
        let mut collection = Collection::new(SPECS);

        collection.update("host-a", &snapshot(&["a", "b"]));

        let rendered = collection.render();
        assert!(rendered.contains("eid=\"a\""));
        assert!(rendered.contains("eid=\"b\""));

        // environment b disappears
        let latest = snapshot(&["a"]);
        collection.cleanup("host-a", &latest);
        collection.update("host-a", &latest);

        let rendered = collection.render();
        assert!(rendered.contains("eid=\"a\""));
        assert!(!rendered.contains("eid=\"b\""));
    }

    #[test]
    fn test_cleanup_is_scoped_to_the_host() {
        let mut collection = Collection::new(SPECS);

        collection.update("host-a", &snapshot(&["a"]));
        collection.update("host-b", &snapshot(&["b"]));

        collection.cleanup("host-a", &snapshot(&[]));

        let rendered = collection.render();
        assert!(!rendered.contains("eid=\"a\""));
        assert!(rendered.contains("eid=\"b\""));
    }

    #[test]
    fn test_render_format() {
        let mut collection = Collection::new(SPECS);
        collection.update("host-a", &snapshot(&["a"]));

        let rendered = collection.render();

        assert!(rendered.contains("# TYPE genv_envs_total gauge"));
        assert!(rendered.contains("genv_envs_total{hostname=\"host-a\"} 1"));
    }
}
