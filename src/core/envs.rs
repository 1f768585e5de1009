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

//! The environment registry, backed by `envs.json`.

use std::path::Path;

use serde_json::Value;

use crate::entities::{Config, Env, Envs};
use crate::error::{Error, Result};
use crate::probe;
use crate::state::{self, StateGuard};

const FILENAME: &str = "envs.json";

/// Decodes the on-disk document, converting the legacy shape where `envs`
/// was a dict keyed by environment identifier.
fn convert(raw: Value) -> Result<Envs> {
    if let Some(map) = raw.get("envs").and_then(Value::as_object) {
        let envs = map
            .values()
            .map(|env| serde_json::from_value::<Env>(env.clone()))
            .collect::<std::result::Result<Vec<Env>, _>>()?;

        return Ok(Envs { envs });
    }

    Ok(serde_json::from_value(raw)?)
}

/// Opens the environments state file under its lock.
pub fn load(root: &Path, cleanup: bool, reset: bool) -> Result<StateGuard<Envs>> {
    state::with_state(
        &root.join(FILENAME),
        cleanup,
        reset,
        || Ok(Envs::default()),
        convert,
        |envs| {
            envs.cleanup(probe::process::poll_pid, probe::process::poll_jupyter_kernel);

            Ok(())
        },
    )
}

/// Returns an environments snapshot.
pub fn snapshot(root: &Path) -> Result<Envs> {
    Ok(load(root, true, false)?.into_inner())
}

/// Activates an environment if it does not exist and attaches a process or
/// a Jupyter kernel to it.
pub fn activate(
    root: &Path,
    eid: &str,
    uid: u32,
    username: Option<&str>,
    pid: Option<u32>,
    kernel_id: Option<&str>,
) -> Result<()> {
    let mut envs = load(root, true, false)?;

    if !envs.contains(eid) {
        envs.activate(eid, uid, username);
    }

    envs.get_mut(eid)
        .expect("just activated")
        .attach(pid, kernel_id);

    envs.commit()
}

/// Replaces the configuration of an environment in full.
pub fn configure(root: &Path, eid: &str, config: &Config) -> Result<()> {
    let mut envs = load(root, true, false)?;

    let env = envs
        .get_mut(eid)
        .ok_or_else(|| Error::EnvironmentNotFound(eid.to_string()))?;

    env.config = config.clone();

    envs.commit()
}

/// Returns the configuration of an environment.
pub fn configuration(root: &Path, eid: &str) -> Result<Config> {
    let envs = snapshot(root)?;

    envs.get(eid)
        .map(|env| env.config.clone())
        .ok_or_else(|| Error::EnvironmentNotFound(eid.to_string()))
}

/// Removes a process or kernel holder from every environment containing it;
/// environments left with no holders are removed.
pub fn deactivate(root: &Path, pid: Option<u32>, kernel_id: Option<&str>) -> Result<()> {
    let mut envs = load(root, true, false)?;

    envs.cleanup(
        |pid_| Some(pid_) != pid,
        |kernel_id_| Some(kernel_id_) != kernel_id,
    );

    envs.commit()
}

/// Prunes dead holders and empty environments, persisting the result.
pub fn cleanup(root: &Path) -> Result<()> {
    load(root, true, false)?.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_dict_shape_converts() {
        let raw = serde_json::json!({
            "envs": {
                "1337": {
                    "eid": "1337",
                    "uid": 1000,
                    "creation": "01/02/2025 12:00:00",
                    "username": "raz",
                    "config": {"name": null, "gpu_memory": null, "gpus": null},
                    "pids": [1337],
                    "kernel_ids": [],
                }
            }
        });

        let envs = convert(raw).unwrap();

        assert_eq!(envs.eids(), vec!["1337".to_string()]);
        assert_eq!(envs.get("1337").unwrap().pids, vec![1337]);
    }

    #[test]
    fn test_list_shape_decodes() {
        let raw = serde_json::json!({
            "envs": [{
                "eid": "42",
                "uid": 1001,
                "creation": "01/02/2025 12:00:00",
                "username": null,
                "config": {"name": "train", "gpu_memory": "4gi", "gpus": 2},
                "pids": [],
                "kernel_ids": ["abc"],
            }]
        });

        let envs = convert(raw).unwrap();

        assert_eq!(envs.get("42").unwrap().config.gpus, Some(2));
    }
}
