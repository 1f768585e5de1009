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

//! Enforcement against a real state directory.
//!
//! `GENV_TERMINATE_PROCESSES=0` keeps process termination a dry run, so the
//! tests exercise the report path without signaling anything.

use std::path::Path;

use genv::core;
use genv::enforce::{self, Rules};
use genv::entities::{Device, Devices, Process, Processes, Snapshot, Survey, Usage};

/// A pid that is always alive (init).
const LIVE_PID: u32 = 1;

fn dry_run() {
    std::env::set_var("GENV_TERMINATE_PROCESSES", "0");
}

fn setup(root: &Path, total: u32, eids: &[&str]) {
    let devices = Devices {
        devices: (0..total)
            .map(|index| Device {
                index,
                total_memory: "16gi".to_string(),
                attachments: Vec::new(),
            })
            .collect(),
    };

    std::fs::write(
        root.join("devices.json"),
        serde_json::to_string_pretty(&devices).unwrap(),
    )
    .unwrap();

    for eid in eids {
        core::envs::activate(root, eid, 1000, Some("raz"), Some(LIVE_PID), None).unwrap();
    }
}

fn state_snapshot(root: &Path, processes: Vec<Process>) -> Snapshot {
    Snapshot {
        processes: Processes { processes },
        envs: core::envs::snapshot(root).unwrap(),
        devices: core::devices::snapshot(root).unwrap(),
    }
}

#[test]
fn test_execute_detaches_reported_environments() {
    dry_run();

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    setup(root, 4, &["a"]);

    core::devices::attach(root, "a", None, Some(4), None, false).unwrap();

    let snapshot = state_snapshot(root, Vec::new());

    let mut surveys = vec![Survey::new(snapshot, None)];

    let rules = Rules {
        max_devices_per_user: Some(2),
        ..Rules::default()
    };

    rules.run(&mut surveys);

    let report = surveys[0].report();

    enforce::execute(root, &report).unwrap();

    // the surplus is reclaimed from the highest indices down
    assert_eq!(core::devices::attached(root, "a").unwrap(), vec![0, 1]);
}

#[test]
fn test_execute_tolerates_vanished_processes() {
    dry_run();

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    setup(root, 1, &["a"]);

    let snapshot = state_snapshot(
        root,
        vec![Process {
            pid: u32::MAX - 1,
            used_gpu_memory: vec![Usage {
                index: 0,
                gpu_memory: "1gi".to_string(),
            }],
            eid: None,
        }],
    );

    let mut surveys = vec![Survey::new(snapshot, None)];

    let rules = Rules {
        non_env_processes: true,
        ..Rules::default()
    };

    rules.run(&mut surveys);

    let report = surveys[0].report();
    assert_eq!(report.terminate.pids(), vec![u32::MAX - 1]);

    // the process is long gone; execution still succeeds
    enforce::execute(root, &report).unwrap();
}

#[test]
fn test_report_survives_the_wire() {
    dry_run();

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    setup(root, 2, &["a"]);

    core::devices::attach(root, "a", None, Some(2), None, false).unwrap();

    let snapshot = state_snapshot(root, Vec::new());

    let mut surveys = vec![Survey::new(snapshot, Some("gpu-17".to_string()))];

    let rules = Rules {
        max_devices_per_user: Some(1),
        ..Rules::default()
    };

    rules.run(&mut surveys);

    // the report crosses the host boundary as JSON, as in remote
    // enforcement
    let encoded = serde_json::to_string(&surveys[0].report()).unwrap();
    let report = serde_json::from_str(&encoded).unwrap();

    enforce::execute(root, &report).unwrap();

    assert_eq!(core::devices::attached(root, "a").unwrap(), vec![0]);
}

#[test]
fn test_enforcement_loop_single_pass_is_clean_on_empty_state() {
    dry_run();

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    setup(root, 2, &[]);

    let snapshot = state_snapshot(root, Vec::new());

    let mut surveys = vec![Survey::new(snapshot, None)];

    Rules::default().run(&mut surveys);

    assert!(surveys[0].report().is_empty());
}
