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

use crate::cli::{DevicesArgs, DevicesCommand, Format, PsArgs};
use crate::core;
use crate::entities::{Device, Devices, Envs};
use crate::error::Result;
use crate::state;
use crate::utils;

/// The queryable device fields.
pub const QUERIES: &[&str] = &["index", "eids", "total_memory", "attachments"];

fn query(device: &Device, name: &str) -> String {
    match name {
        "index" => device.index.to_string(),
        "eids" => device.eids().join(" "),
        "total_memory" => device.total_memory.clone(),
        "attachments" => device
            .attachments
            .iter()
            .map(|attachment| {
                format!(
                    "{}+{}+{}",
                    attachment.eid,
                    attachment.gpu_memory.as_deref().unwrap_or_default(),
                    attachment.time.replace(' ', "_")
                )
            })
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

fn do_ps(devices: &Devices, envs: &Envs, args: &PsArgs) {
    if args.header {
        match args.format {
            Format::Csv => println!("ID,ENV ID,ENV NAME,ATTACHED"),
            Format::Tui => println!("ID      ENV ID      ENV NAME        ATTACHED"),
        }
    }

    for device in devices.iter() {
        if device.detached() {
            match args.format {
                Format::Csv => println!("{},,,", device.index),
                Format::Tui => println!("{:<8}", device.index),
            }

            continue;
        }

        for attachment in &device.attachments {
            let name = envs
                .get(&attachment.eid)
                .and_then(|env| env.config.name.clone())
                .unwrap_or_default();

            let attached = if args.timestamp {
                attachment.time.clone()
            } else {
                utils::time_since(&attachment.time)
            };

            match args.format {
                Format::Csv => {
                    println!("{},{},{name},{attached}", device.index, attachment.eid)
                }
                Format::Tui => {
                    println!(
                        "{:<8}{:<12}{name:<16}{attached}",
                        device.index, attachment.eid
                    )
                }
            }
        }
    }
}

fn print_indices(indices: &[u32]) {
    let indices: Vec<String> = indices.iter().map(|index| index.to_string()).collect();

    println!("{}", indices.join(" "));
}

fn do_attach(
    root: &Path,
    eid: &str,
    count: Option<u32>,
    index: Option<u32>,
    allow_over_subscription: bool,
) -> Result<()> {
    let envs = core::envs::snapshot(root)?;

    // use the environment configuration when no explicit mode is given
    let config = envs.get(eid).map(|env| env.config.clone()).unwrap_or_default();

    let count = match (count, index) {
        (None, None) => config.gpus,
        (count, _) => count,
    };

    let indices = core::devices::attach(
        root,
        eid,
        index,
        count,
        config.gpu_memory.as_deref(),
        allow_over_subscription,
    )?;

    print_indices(&indices);

    Ok(())
}

/// Queries and manages the devices state.
pub fn run(args: &DevicesArgs) -> Result<()> {
    let root = utils::temp_dir();

    let _lock = state::global_lock(&root)?;

    match &args.command {
        Some(DevicesCommand::Attach {
            eid,
            count,
            index,
            allow_over_subscription,
        }) => {
            do_attach(&root, eid, *count, *index, *allow_over_subscription)?;
        }
        Some(DevicesCommand::Detach { eid, index }) => {
            let indices = core::devices::detach(&root, eid, *index)?;

            print_indices(&indices);
        }
        Some(DevicesCommand::Find { eid }) => {
            let indices = core::devices::attached(&root, eid)?;

            print_indices(&indices);
        }
        Some(DevicesCommand::Ps(ps)) => {
            let devices = core::devices::load(&root, args.cleanup, args.reset)?;
            let envs = core::envs::snapshot(&root)?;

            do_ps(&devices, &envs, ps);

            devices.commit()?;
        }
        Some(DevicesCommand::Query { index, queries }) => {
            let devices = core::devices::load(&root, args.cleanup, args.reset)?;

            let indices = match index {
                Some(index) => vec![*index],
                None => devices.indices(),
            };

            for index in indices {
                if let Some(device) = devices.get(index) {
                    let values: Vec<String> =
                        queries.iter().map(|name| query(device, name)).collect();

                    println!("{}", values.join(","));
                }
            }

            devices.commit()?;
        }
        None => {
            let devices = core::devices::load(&root, args.cleanup, args.reset)?;
            let envs = core::envs::snapshot(&root)?;

            do_ps(
                &devices,
                &envs,
                &PsArgs {
                    header: true,
                    timestamp: false,
                    format: Format::Tui,
                },
            );

            devices.commit()?;
        }
    }

    Ok(())
}
