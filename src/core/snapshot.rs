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

use std::path::Path;

use crate::entities::Snapshot;
use crate::error::Result;

use super::{devices, envs, processes};

/// Returns a full system snapshot.
///
/// The environments and devices states are read under the caller's global
/// lock; the process view comes from `nvidia-smi` and does not touch the
/// state files.
pub async fn snapshot(root: &Path) -> Result<Snapshot> {
    let processes = processes::snapshot().await?;
    let envs = envs::snapshot(root)?;
    let devices = devices::snapshot(root)?;

    Ok(Snapshot {
        processes,
        envs,
        devices,
    })
}
