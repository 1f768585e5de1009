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

use crate::cli::{ConfigField, EnvsArgs, EnvsCommand, Format, PsArgs};
use crate::core;
use crate::entities::{Env, Envs};
use crate::error::Result;
use crate::state;
use crate::utils;

/// The queryable environment fields.
pub const QUERIES: &[&str] = &[
    "eid",
    "creation",
    "uid",
    "username",
    "config.name",
    "config.gpus",
    "config.gpu_memory",
    "pids",
    "kernel_ids",
];

fn query(env: &Env, name: &str) -> String {
    match name {
        "eid" => env.eid.clone(),
        "creation" => env.creation.clone(),
        "uid" => env.uid.to_string(),
        "username" => env.username.clone().unwrap_or_default(),
        "config.name" => env.config.name.clone().unwrap_or_default(),
        "config.gpus" => env
            .config
            .gpus
            .map(|gpus| gpus.to_string())
            .unwrap_or_default(),
        "config.gpu_memory" => env.config.gpu_memory.clone().unwrap_or_default(),
        "pids" => env
            .pids
            .iter()
            .map(|pid| pid.to_string())
            .collect::<Vec<_>>()
            .join(" "),
        "kernel_ids" => env.kernel_ids.join(" "),
        _ => String::new(),
    }
}

fn user(env: &Env) -> String {
    match &env.username {
        Some(username) => format!("{username}({})", env.uid),
        None => env.uid.to_string(),
    }
}

fn do_ps(envs: &Envs, args: &PsArgs) {
    if args.header {
        match args.format {
            Format::Csv => println!("ID,USER,NAME,CREATED,PID(S)"),
            Format::Tui => {
                println!("ID      USER            NAME            CREATED              PID(S)")
            }
        }
    }

    for env in envs.iter() {
        let user = user(env);
        let name = env.config.name.clone().unwrap_or_default();
        let created = if args.timestamp {
            env.creation.clone()
        } else {
            env.time_since()
        };
        let pids = env
            .pids
            .iter()
            .map(|pid| pid.to_string())
            .collect::<Vec<_>>()
            .join(" ");

        match args.format {
            Format::Csv => println!("{},{user},{name},{created},{pids}", env.eid),
            Format::Tui => println!("{:<8}{user:<16}{name:<16}{created:<21}{pids}", env.eid),
        }
    }
}

fn do_query(envs: &Envs, eid: Option<&str>, queries: &[String]) {
    let eids = match eid {
        Some(eid) => vec![eid.to_string()],
        None => envs.eids(),
    };

    for eid in eids {
        let Some(env) = envs.get(&eid) else {
            continue;
        };

        let values: Vec<String> = queries.iter().map(|name| query(env, name)).collect();

        println!("{}", values.join(","));
    }
}

fn do_config(envs: &mut Envs, eid: &str, field: &ConfigField, clear: bool) {
    let Some(env) = envs.get_mut(eid) else {
        return;
    };

    match field {
        ConfigField::Gpus { count } => {
            env.config.gpus = if clear { None } else { *count };
        }
        ConfigField::Name { name } => {
            env.config.name = if clear { None } else { name.clone() };
        }
        ConfigField::GpuMemory { gpu_memory } => {
            env.config.gpu_memory = if clear { None } else { gpu_memory.clone() };
        }
    }
}

/// Queries and manages the environments state.
pub fn run(args: &EnvsArgs) -> Result<()> {
    let root = utils::temp_dir();

    let _lock = state::global_lock(&root)?;

    let mut envs = core::envs::load(&root, args.cleanup, args.reset)?;

    match &args.command {
        Some(EnvsCommand::Activate {
            eid,
            uid,
            username,
            pid,
            kernel_id,
        }) => {
            if !envs.contains(eid) {
                envs.activate(eid, *uid, username.as_deref());
            }

            envs.get_mut(eid)
                .expect("just activated")
                .attach(*pid, kernel_id.as_deref());
        }
        Some(EnvsCommand::Config { eid, field, clear }) => {
            do_config(&mut envs, eid, field, *clear);
        }
        Some(EnvsCommand::Deactivate { pid }) => {
            let pid = *pid;

            envs.cleanup(|pid_| pid_ != pid, |_| true);
        }
        Some(EnvsCommand::Find { pid, kernel_id }) => {
            for env in envs.find(*pid, kernel_id.as_deref()) {
                println!("{}", env.eid);
            }
        }
        Some(EnvsCommand::Ps(ps)) => do_ps(&envs, ps),
        Some(EnvsCommand::Query { eid, queries }) => do_query(&envs, eid.as_deref(), queries),
        None => do_ps(
            &envs,
            &PsArgs {
                header: true,
                timestamp: false,
                format: Format::Tui,
            },
        ),
    }

    envs.commit()
}
