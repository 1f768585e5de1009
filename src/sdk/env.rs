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

//! Environment lifecycle for the current process.

use std::env;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::core;
use crate::entities::Config;
use crate::error::{Error, Result};
use crate::state;

use super::{devices, vars};

/// Returns the current environment identifier, or `None` when not running
/// in one.
pub fn eid() -> Option<String> {
    env::var("GENV_ENVIRONMENT_ID").ok()
}

/// Returns whether running in an active environment.
pub fn active() -> bool {
    eid().is_some()
}

fn active_eid() -> Result<String> {
    eid().ok_or(Error::NotActive)
}

fn update_config_vars(config: &Config) {
    let fields = [
        ("GENV_ENVIRONMENT_NAME", config.name.clone()),
        ("GENV_GPU_MEMORY", config.gpu_memory.clone()),
        ("GENV_GPUS", config.gpus.map(|gpus| gpus.to_string())),
    ];

    for (name, value) in fields {
        match value {
            Some(value) => vars::set(name, &value),
            None => vars::unset(name),
        }
    }
}

/// Configures the current environment and republishes the configuration
/// variables.
pub fn configure(root: &Path, config: &Config) -> Result<()> {
    let eid = active_eid()?;

    {
        let _lock = state::global_lock(root)?;

        core::envs::configure(root, &eid, config)?;
    }

    update_config_vars(config);

    Ok(())
}

/// Returns the current environment configuration, as published in the
/// process environment.
pub fn configuration() -> Result<Config> {
    active_eid()?;

    Ok(Config {
        name: env::var("GENV_ENVIRONMENT_NAME").ok(),
        gpu_memory: env::var("GENV_GPU_MEMORY").ok(),
        gpus: env::var("GENV_GPUS").ok().and_then(|gpus| gpus.parse().ok()),
    })
}

/// Re-reads the configuration from the state and republishes it.
pub fn refresh_configuration(root: &Path) -> Result<Config> {
    let eid = active_eid()?;

    let config = {
        let _lock = state::global_lock(root)?;

        core::envs::configuration(root, &eid)?
    };

    update_config_vars(&config);

    Ok(config)
}

/// An active environment scope for the current process.
///
/// Deactivates on drop: the process is removed from the environment under
/// the global lock and the published variables are restored.
pub struct Activation {
    root: PathBuf,
    pid: u32,
}

impl Drop for Activation {
    fn drop(&mut self) {
        let result = state::global_lock(&self.root).and_then(|_lock| {
            core::envs::deactivate(&self.root, Some(self.pid), None)?;

            // drop attachments in case this was the last process of the
            // environment
            core::devices::cleanup(&self.root)
        });

        if let Err(err) = result {
            warn!("Failed deactivating environment ({err})");
        }

        vars::restore();
    }
}

/// Activates an environment for the current process.
///
/// Creates the environment, configures it (from the given configuration or
/// the persisted one), attaches devices per the configured device count and
/// publishes the environment variables.
pub fn activate(root: &Path, eid: Option<&str>, config: Option<&Config>) -> Result<Activation> {
    if active() {
        return Err(Error::AlreadyActive);
    }

    let pid = std::process::id();
    let eid = eid.map(str::to_string).unwrap_or_else(|| pid.to_string());

    vars::set("GENV_PYTHON", "1");
    vars::set("GENV_ENVIRONMENT_ID", &eid);

    let activation = Activation {
        root: root.to_path_buf(),
        pid,
    };

    let uid = unsafe { libc::getuid() } as u32;
    let username = whoami::username();

    {
        let _lock = state::global_lock(root)?;

        core::envs::activate(root, &eid, uid, Some(&username), Some(pid), None)?;
    }

    match config {
        Some(config) => configure(root, config)?,
        None => {
            refresh_configuration(root)?;
        }
    }

    let indices = devices::refresh_attached(root)?;

    if indices.is_empty() {
        devices::attach(root, None, None, false)?;
    }

    Ok(activation)
}
