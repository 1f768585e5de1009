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

//! Admission scenarios against a real state directory.

use std::path::Path;

use genv::core;
use genv::entities::{Device, Devices};
use genv::error::Error;

/// A pid that is always alive (init).
const LIVE_PID: u32 = 1;

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
        core::envs::activate(root, eid, 1000, None, Some(LIVE_PID), None).unwrap();
    }
}

#[test]
fn test_two_shells_share_a_four_gpu_host() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    // the two shells hold distinct live pids so that deactivating one
    // leaves the other untouched
    setup(root, 4, &[]);
    core::envs::activate(root, "a", 1000, None, Some(std::process::id()), None).unwrap();
    core::envs::activate(root, "b", 1001, None, Some(LIVE_PID), None).unwrap();

    // shell A takes two devices
    let indices = core::devices::attach(root, "a", None, Some(2), None, false).unwrap();
    assert_eq!(indices, vec![0, 1]);

    // shell B asks for three; only two are left and the state is unchanged
    let err = core::devices::attach(root, "b", None, Some(3), None, false).unwrap_err();
    assert!(matches!(
        err,
        Error::InsufficientDevices {
            requested: 3,
            available: 2,
        }
    ));
    assert!(core::devices::attached(root, "b").unwrap().is_empty());

    // shell B retries with two and gets the remaining devices
    let indices = core::devices::attach(root, "b", None, Some(2), None, false).unwrap();
    assert_eq!(indices, vec![2, 3]);

    // shell A goes away; its attachments vanish, B is untouched
    core::envs::deactivate(root, Some(std::process::id()), None).unwrap();
    core::devices::cleanup(root).unwrap();

    assert!(core::devices::attached(root, "a").unwrap().is_empty());
    assert_eq!(core::devices::attached(root, "b").unwrap(), vec![2, 3]);
}

#[test]
fn test_fractional_memory_admission() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    setup(root, 2, &["x", "y", "z"]);

    // X reserves half of device 0
    let indices = core::devices::attach(root, "x", Some(0), None, Some("8gi"), false).unwrap();
    assert_eq!(indices, vec![0]);

    // Y asks for one device with 8gi; device 0 still fits
    let indices = core::devices::attach(root, "y", None, Some(1), Some("8gi"), false).unwrap();
    assert_eq!(indices, vec![0]);

    // Z cannot fit on device 0 any more and lands on device 1
    let indices = core::devices::attach(root, "z", None, Some(1), Some("8gi"), false).unwrap();
    assert_eq!(indices, vec![1]);
}

#[test]
fn test_index_attach_rejects_unavailable_device() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    setup(root, 1, &["a", "b"]);

    core::devices::attach(root, "a", Some(0), None, None, false).unwrap();

    let err = core::devices::attach(root, "b", Some(0), None, None, false).unwrap_err();
    assert_eq!(err.to_string(), "Device 0 is not available");

    // over-subscription admits anyway
    let indices = core::devices::attach(root, "b", Some(0), None, None, true).unwrap();
    assert_eq!(indices, vec![0]);
}

#[test]
fn test_index_attach_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    setup(root, 1, &["a"]);

    core::devices::attach(root, "a", Some(0), None, None, false).unwrap();

    // already attached; no availability check, no second attachment
    let indices = core::devices::attach(root, "a", Some(0), None, None, false).unwrap();
    assert_eq!(indices, vec![0]);

    let devices = core::devices::snapshot(root).unwrap();
    assert_eq!(devices.get(0).unwrap().attachments.len(), 1);
}

#[test]
fn test_count_attach_is_monotone() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    setup(root, 4, &["a"]);

    let first = core::devices::attach(root, "a", None, Some(2), None, false).unwrap();
    let second = core::devices::attach(root, "a", None, Some(2), None, false).unwrap();

    assert_eq!(first, second);

    // a smaller count never detaches
    let third = core::devices::attach(root, "a", None, Some(1), None, false).unwrap();
    assert_eq!(third, first);
}

#[test]
fn test_zero_gpus_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    setup(root, 2, &["a"]);

    let indices = core::devices::attach(root, "a", None, Some(0), None, false).unwrap();

    assert!(indices.is_empty());
    assert!(core::devices::attached(root, "a").unwrap().is_empty());
}

#[test]
fn test_conflicting_modes_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    setup(root, 2, &["a"]);

    let err = core::devices::attach(root, "a", Some(0), Some(1), None, false).unwrap_err();

    assert!(matches!(err, Error::ConflictingModes));
}

#[test]
fn test_detach_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    setup(root, 2, &["a"]);

    core::devices::attach(root, "a", None, Some(2), None, false).unwrap();

    assert!(core::devices::detach(root, "a", None).unwrap().is_empty());
    assert!(core::devices::detach(root, "a", None).unwrap().is_empty());
}

#[test]
fn test_over_subscription_without_memory_is_always_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    setup(root, 1, &["a", "b", "c"]);

    core::devices::attach(root, "a", None, Some(1), None, false).unwrap();

    // whole-device take on an attached device is allowed when
    // over-subscribing
    assert_eq!(
        core::devices::attach(root, "b", None, Some(1), None, true).unwrap(),
        vec![0]
    );
    assert_eq!(
        core::devices::attach(root, "c", None, Some(1), None, true).unwrap(),
        vec![0]
    );
}
