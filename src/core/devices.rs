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

//! The device registry, backed by `devices.json`.
//!
//! Admission accounts available memory per device; the state file is created
//! on first access by probing `nvidia-smi` for the device total memories.
//! Cleanup reads the environments state file, so every caller here must hold
//! the global lock.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use crate::entities::{Attachment, Device, Devices};
use crate::error::{Error, Result};
use crate::probe;
use crate::state::{self, Flock, StateGuard};

use super::envs;

const FILENAME: &str = "devices.json";

/// Decodes the on-disk document, converting the legacy shape where `devices`
/// was a dict keyed by device index with an `eids` attachment map.
fn convert(raw: Value) -> Result<Devices> {
    let corrupt = || Error::Io(std::io::Error::from(std::io::ErrorKind::InvalidData));

    if let Some(map) = raw.get("devices").and_then(Value::as_object) {
        let mut devices = Vec::new();

        for (index, device) in map {
            let index: u32 = index.parse().map_err(|_| corrupt())?;

            let total_memory = device
                .get("total_memory")
                .and_then(Value::as_str)
                .ok_or_else(corrupt)?
                .to_string();

            let mut attachments = Vec::new();

            for env in device
                .get("eids")
                .and_then(Value::as_object)
                .map(|eids| eids.values().collect::<Vec<_>>())
                .unwrap_or_default()
            {
                attachments.push(Attachment {
                    eid: env
                        .get("eid")
                        .and_then(Value::as_str)
                        .ok_or_else(corrupt)?
                        .to_string(),
                    gpu_memory: env
                        .get("gpu_memory")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    time: env
                        .get("attached")
                        .and_then(Value::as_str)
                        .ok_or_else(corrupt)?
                        .to_string(),
                });
            }

            devices.push(Device {
                index,
                total_memory,
                attachments,
            });
        }

        devices.sort_by_key(|device| device.index);

        return Ok(Devices { devices });
    }

    Ok(serde_json::from_value(raw)?)
}

/// Builds a fresh state by probing the device total memories.
fn create() -> Result<Devices> {
    let devices = probe::nvidia::total_memories_blocking()?
        .into_iter()
        .enumerate()
        .map(|(index, total_memory)| Device {
            index: index as u32,
            total_memory,
            attachments: Vec::new(),
        })
        .collect();

    Ok(Devices { devices })
}

/// Opens the devices state file under its lock.
///
/// Cleanup prunes attachments whose environment is gone, which reads the
/// environments state file; the caller must hold the global lock.
pub fn load(root: &Path, cleanup: bool, reset: bool) -> Result<StateGuard<Devices>> {
    let root_ = root.to_path_buf();

    state::with_state(
        &root.join(FILENAME),
        cleanup,
        reset,
        create,
        convert,
        move |devices| {
            let envs = envs::snapshot(&root_)?;

            devices.cleanup(|eid| envs.contains(eid));

            Ok(())
        },
    )
}

/// Returns a devices snapshot.
pub fn snapshot(root: &Path) -> Result<Devices> {
    Ok(load(root, true, false)?.into_inner())
}

/// Attaches an environment to devices and returns the attached indices in
/// ascending order.
///
/// Either attaches the device with a given index, or ensures a total device
/// count; the two modes are mutually exclusive. Never detaches when the
/// environment is already attached to more devices than requested.
pub fn attach(
    root: &Path,
    eid: &str,
    index: Option<u32>,
    gpus: Option<u32>,
    gpu_memory: Option<&str>,
    allow_over_subscription: bool,
) -> Result<Vec<u32>> {
    if index.is_some() && gpus.is_some() {
        return Err(Error::ConflictingModes);
    }

    let mut devices = load(root, true, false)?;

    let env_indices = devices.filter_eid(eid).indices();

    if let Some(index) = index {
        if !env_indices.contains(&index) {
            let device = devices
                .get(index)
                .ok_or(Error::DeviceNotAvailable(index))?;

            if !allow_over_subscription && !device.available(gpu_memory)? {
                return Err(Error::DeviceNotAvailable(index));
            }

            devices.attach(eid, &[index], gpu_memory);
        }
    } else if let Some(gpus) = gpus {
        let gpus = gpus as usize;

        if gpus > env_indices.len() {
            let diff = gpus - env_indices.len();

            let indices = devices
                .filter_not_indices(&env_indices)
                .find_available_devices(diff, gpu_memory, allow_over_subscription)?;

            devices.attach(eid, &indices, gpu_memory);
        } else if gpus < env_indices.len() {
            warn!(
                "Environment {eid} is already attached to {} devices; not detaching",
                env_indices.len()
            );
        }
    }

    let indices = devices.filter_eid(eid).indices();

    devices.commit()?;

    Ok(indices)
}

/// Detaches an environment from a device, or from all devices, and returns
/// the remaining attached indices.
pub fn detach(root: &Path, eid: &str, index: Option<u32>) -> Result<Vec<u32>> {
    let mut devices = load(root, true, false)?;

    devices.detach(eid, index);

    let indices = devices.filter_eid(eid).indices();

    devices.commit()?;

    Ok(indices)
}

/// Returns the indices of devices attached to an environment.
pub fn attached(root: &Path, eid: &str) -> Result<Vec<u32>> {
    Ok(snapshot(root)?.filter_eid(eid).indices())
}

/// Prunes attachments of dead environments, persisting the result.
pub fn cleanup(root: &Path) -> Result<()> {
    load(root, true, false)?.commit()
}

/// Returns the path of a device lock file, creating it if requested.
pub fn lock_path(root: &Path, index: u32, create: bool) -> Result<PathBuf> {
    let path = root.join("devices").join(format!("{index}.lock"));

    if create && !path.exists() {
        drop(Flock::acquire(&path)?);
    }

    Ok(path)
}

/// Held per-device locks; released on drop.
pub struct DeviceLocks {
    _locks: Vec<Flock>,
}

/// Obtains exclusive access to the given devices.
///
/// Locks are acquired in ascending index order to prevent deadlocks between
/// callers locking overlapping sets.
pub fn lock(root: &Path, indices: &[u32]) -> Result<DeviceLocks> {
    let mut indices = indices.to_vec();
    indices.sort_unstable();
    indices.dedup();

    let mut locks = Vec::with_capacity(indices.len());

    for index in indices {
        locks.push(Flock::acquire(&lock_path(root, index, false)?)?);
    }

    Ok(DeviceLocks { _locks: locks })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_dict_shape_converts() {
        let raw = serde_json::json!({
            "devices": {
                "1": {
                    "total_memory": "16gi",
                    "eids": {
                        "1337": {
                            "eid": "1337",
                            "gpu_memory": "4gi",
                            "attached": "01/02/2025 12:00:00",
                        }
                    }
                },
                "0": {
                    "total_memory": "16gi",
                    "eids": {}
                }
            }
        });

        let devices = convert(raw).unwrap();

        assert_eq!(devices.indices(), vec![0, 1]);

        let attachment = &devices.get(1).unwrap().attachments[0];
        assert_eq!(attachment.eid, "1337");
        assert_eq!(attachment.gpu_memory.as_deref(), Some("4gi"));
        assert_eq!(attachment.time, "01/02/2025 12:00:00");
    }

    #[test]
    fn test_list_shape_decodes() {
        let raw = serde_json::json!({
            "devices": [
                {"index": 0, "total_memory": "16gi", "attachments": []},
            ]
        });

        let devices = convert(raw).unwrap();

        assert_eq!(devices.indices(), vec![0]);
    }
}
