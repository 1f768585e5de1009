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

//! Remote snapshots: the same registries, read over SSH as JSON documents.

use serde::de::DeserializeOwned;

use crate::entities::{Devices, Envs, Snapshot};
use crate::error::Result;

use super::{run, Command, Config, Host};

async fn snapshot_of<T: DeserializeOwned>(
    config: &Config,
    type_: Option<&str>,
    sudo: bool,
) -> Result<Vec<(Host, T)>> {
    let mut args = vec!["usage", "snapshot"];

    if let Some(type_) = type_ {
        args.push("--type");
        args.push(type_);
    }

    let command = Command::new(&args, sudo);

    let mut snapshots = Vec::new();

    for (host, stdout) in run(config, &command, None).await? {
        snapshots.push((host, serde_json::from_str(&stdout)?));
    }

    Ok(snapshots)
}

/// Takes a full snapshot on every host.
///
/// Runs with sudo so that the process view covers every user's compute
/// processes.
pub async fn snapshot(config: &Config) -> Result<Vec<(Host, Snapshot)>> {
    snapshot_of(config, None, true).await
}

/// Takes a devices snapshot on every host.
pub async fn devices(config: &Config) -> Result<Vec<(Host, Devices)>> {
    snapshot_of(config, Some("devices"), false).await
}

/// Takes an environments snapshot on every host.
pub async fn envs(config: &Config) -> Result<Vec<(Host, Envs)>> {
    snapshot_of(config, Some("envs"), false).await
}
