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

//! The live process view.
//!
//! Built fresh from `nvidia-smi` on every call and joined with the
//! environment identifier recovered from each process's environment; never
//! persisted.

use std::collections::BTreeMap;

use tracing::warn;

use crate::entities::{Process, Processes, Usage};
use crate::error::Result;
use crate::probe;

/// Returns a snapshot of all running compute processes.
pub async fn snapshot() -> Result<Processes> {
    let (uuids, apps) = tokio::join!(
        probe::nvidia::device_uuids(),
        probe::nvidia::compute_apps()
    );

    let (uuids, apps) = (uuids?, apps?);

    let mut by_pid: BTreeMap<u32, Vec<Usage>> = BTreeMap::new();

    for app in apps {
        let Some(index) = uuids.get(&app.gpu_uuid) else {
            warn!(
                "Unknown device UUID {} for process {}",
                app.gpu_uuid, app.pid
            );
            continue;
        };

        by_pid.entry(app.pid).or_default().push(Usage {
            index: *index,
            gpu_memory: app.used_gpu_memory,
        });
    }

    Ok(Processes {
        processes: by_pid
            .into_iter()
            .map(|(pid, used_gpu_memory)| Process {
                pid,
                used_gpu_memory,
                eid: probe::process::eid(pid),
            })
            .collect(),
    })
}
