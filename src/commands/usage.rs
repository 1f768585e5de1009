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

//! Machine-facing snapshot and report execution, used by the remote
//! fan-out.

use std::io::Read;

use crate::cli::{SnapshotType, UsageArgs, UsageCommand};
use crate::core;
use crate::enforce;
use crate::entities::Report;
use crate::error::Result;
use crate::state;
use crate::utils;

async fn do_snapshot(type_: Option<SnapshotType>) -> Result<()> {
    let root = utils::temp_dir();

    let _lock = state::global_lock(&root)?;

    let json = match type_ {
        None => serde_json::to_string_pretty(&core::snapshot(&root).await?)?,
        Some(SnapshotType::Devices) => {
            serde_json::to_string_pretty(&core::devices::snapshot(&root)?)?
        }
        Some(SnapshotType::Envs) => serde_json::to_string_pretty(&core::envs::snapshot(&root)?)?,
        Some(SnapshotType::Processes) => {
            serde_json::to_string_pretty(&core::processes::snapshot().await?)?
        }
    };

    println!("{json}");

    Ok(())
}

fn do_execute() -> Result<()> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;

    let report: Report = serde_json::from_str(&input)?;

    let root = utils::temp_dir();

    let _lock = state::global_lock(&root)?;

    enforce::execute(&root, &report)
}

/// Runs the "genv usage" logic.
pub async fn run(args: &UsageArgs) -> Result<()> {
    match &args.command {
        UsageCommand::Snapshot { type_ } => do_snapshot(*type_).await,
        UsageCommand::Execute => do_execute(),
    }
}
