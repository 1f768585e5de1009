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

//! Device operations for the current environment.

use std::env;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core;
use crate::error::{Error, Result};
use crate::state;

use super::{env as sdk_env, vars};

/// Returns the indices of visible devices from `CUDA_VISIBLE_DEVICES`;
/// `-1` means none.
fn visible() -> Vec<u32> {
    let Ok(indices) = env::var("CUDA_VISIBLE_DEVICES") else {
        return Vec::new();
    };

    if indices == "-1" {
        return Vec::new();
    }

    indices
        .split(',')
        .filter_map(|index| index.trim().parse().ok())
        .collect()
}

/// Returns the indices of devices that have a lock file.
///
/// Inside a container the per-device lock files are bind mounted, so their
/// presence reflects the attached devices in host index namespace.
fn lockable(root: &Path) -> Vec<u32> {
    static LOCK_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\.lock$").unwrap());

    let Ok(entries) = std::fs::read_dir(root.join("devices")) else {
        return Vec::new();
    };

    let mut indices: Vec<u32> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            LOCK_FILE
                .captures(&entry.file_name().to_string_lossy())
                .and_then(|captures| captures[1].parse().ok())
        })
        .collect();

    indices.sort_unstable();

    indices
}

fn update_vars(indices: &[u32]) {
    let value = if indices.is_empty() {
        "-1".to_string()
    } else {
        indices
            .iter()
            .map(|index| index.to_string())
            .collect::<Vec<_>>()
            .join(",")
    };

    vars::replace("CUDA_VISIBLE_DEVICES", &value);
}

/// Attaches devices to the current environment and republishes
/// `CUDA_VISIBLE_DEVICES`.
///
/// Attaches a specific device when an index is given, a total count when a
/// count is given, and the configured device count otherwise. Never
/// detaches devices.
pub fn attach(
    root: &Path,
    index: Option<u32>,
    gpus: Option<u32>,
    allow_over_subscription: bool,
) -> Result<Vec<u32>> {
    if index.is_some() && gpus.is_some() {
        return Err(Error::ConflictingModes);
    }

    let eid = sdk_env::eid().ok_or(Error::NotActive)?;

    let config = sdk_env::configuration()?;

    let gpus = match index {
        Some(_) => None,
        None => gpus.or(config.gpus),
    };

    let indices = {
        let _lock = state::global_lock(root)?;

        core::devices::attach(
            root,
            &eid,
            index,
            gpus,
            config.gpu_memory.as_deref(),
            allow_over_subscription,
        )?
    };

    update_vars(&indices);

    Ok(indices)
}

/// Returns the indices of attached devices, in host namespace even when
/// running in a container.
pub fn attached(root: &Path) -> Result<Vec<u32>> {
    if !sdk_env::active() {
        return Err(Error::NotActive);
    }

    if env::var_os("GENV_SHELL").is_some() || env::var_os("GENV_PYTHON").is_some() {
        Ok(visible())
    } else if env::var_os("GENV_CONTAINER").is_some() {
        Ok(lockable(root))
    } else {
        Err(Error::NotActive)
    }
}

/// Detaches the current environment from a device, or from all devices.
pub fn detach(root: &Path, index: Option<u32>) -> Result<Vec<u32>> {
    let eid = sdk_env::eid().ok_or(Error::NotActive)?;

    let indices = {
        let _lock = state::global_lock(root)?;

        core::devices::detach(root, &eid, index)?
    };

    update_vars(&indices);

    Ok(indices)
}

/// Re-reads the attached devices from the state and republishes
/// `CUDA_VISIBLE_DEVICES`.
pub fn refresh_attached(root: &Path) -> Result<Vec<u32>> {
    let eid = sdk_env::eid().ok_or(Error::NotActive)?;

    let indices = {
        let _lock = state::global_lock(root)?;

        core::devices::attached(root, &eid)?
    };

    update_vars(&indices);

    Ok(indices)
}

/// Obtains exclusive access to the attached devices.
///
/// Returns `None` without locking when not running in an active environment
/// or not attached to any device.
pub fn lock(root: &Path) -> Result<Option<core::devices::DeviceLocks>> {
    if !sdk_env::active() {
        return Ok(None);
    }

    let indices = attached(root)?;

    if indices.is_empty() {
        return Ok(None);
    }

    Ok(Some(core::devices::lock(root, &indices)?))
}
