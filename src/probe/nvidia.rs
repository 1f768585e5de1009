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

//! Device probing via `nvidia-smi`.
//!
//! Queries are invoked with `GENV_BYPASS=1` so that a genv shim earlier on
//! PATH passes the call through to the real binary. Memory values are
//! reported by `nvidia-smi` in MiB and re-suffixed as `mi` strings.

use std::collections::HashMap;

use crate::error::{Error, Result};

const NVIDIA_SMI: &str = "nvidia-smi";
const CSV_FORMAT_PARAM: &str = "--format=csv,noheader,nounits";
const CSV_SPLITTER: &str = ", ";

/// A running compute app as reported by `nvidia-smi --query-compute-apps`.
#[derive(Debug, Clone)]
pub struct ComputeApp {
    pub gpu_uuid: String,
    pub pid: u32,
    pub used_gpu_memory: String,
}

fn parse_failure(line: &str) -> Error {
    Error::Probe(format!("unexpected output line '{line}'"))
}

async fn query(args: &[&str]) -> Result<String> {
    let output = tokio::process::Command::new(NVIDIA_SMI)
        .args(args)
        .env("GENV_BYPASS", "1")
        .output()
        .await
        .map_err(|err| Error::Probe(err.to_string()))?;

    if !output.status.success() {
        return Err(Error::Probe(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Queries the total memory of every device, in device index order.
///
/// Blocking variant for use inside state-file creation, which runs under an
/// advisory lock in synchronous code.
pub fn total_memories_blocking() -> Result<Vec<String>> {
    let output = std::process::Command::new(NVIDIA_SMI)
        .args(["--query-gpu=memory.total", CSV_FORMAT_PARAM])
        .env("GENV_BYPASS", "1")
        .output()
        .map_err(|err| Error::Probe(err.to_string()))?;

    if !output.status.success() {
        return Err(Error::Probe(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| {
            let mib: u64 = line.trim().parse().map_err(|_| parse_failure(line))?;

            Ok(format!("{mib}mi"))
        })
        .collect()
}

/// Queries device UUIDs.
///
/// Returns a mapping from device UUID to its index.
pub async fn device_uuids() -> Result<HashMap<String, u32>> {
    let stdout = query(&["--query-gpu=uuid,index", CSV_FORMAT_PARAM]).await?;

    let mut mapping = HashMap::new();

    for line in stdout.lines() {
        let (uuid, index) = line.split_once(CSV_SPLITTER).ok_or_else(|| parse_failure(line))?;

        let index: u32 = index.trim().parse().map_err(|_| parse_failure(line))?;

        mapping.insert(uuid.to_string(), index);
    }

    Ok(mapping)
}

/// Queries the running compute apps.
pub async fn compute_apps() -> Result<Vec<ComputeApp>> {
    let stdout = query(&[
        "--query-compute-apps=gpu_uuid,pid,used_gpu_memory",
        CSV_FORMAT_PARAM,
    ])
    .await?;

    let mut apps = Vec::new();

    for line in stdout.lines() {
        let mut fields = line.split(CSV_SPLITTER);

        let (Some(gpu_uuid), Some(pid), Some(used_gpu_memory)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(parse_failure(line));
        };

        apps.push(ComputeApp {
            gpu_uuid: gpu_uuid.to_string(),
            pid: pid.trim().parse().map_err(|_| parse_failure(line))?,
            used_gpu_memory: format!("{}mi", used_gpu_memory.trim()),
        });
    }

    Ok(apps)
}
