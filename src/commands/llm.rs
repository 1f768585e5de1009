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

//! LLM servers as environments.
//!
//! Serving runs `ollama serve` inside a newly activated environment named
//! `llm/<model>`, so the regular admission and enforcement machinery covers
//! LLM workloads like any other.

use std::os::unix::process::CommandExt;
use std::path::PathBuf;

use crate::cli::{Format, LlmArgs, LlmCommand, PsArgs};
use crate::core;
use crate::entities::{Config, Env};
use crate::error::{Error, Result};
use crate::probe;
use crate::sdk;
use crate::state;
use crate::utils;

fn which_ollama() -> Result<PathBuf> {
    let paths = std::env::var_os("PATH").ok_or(Error::OllamaNotFound)?;

    std::env::split_paths(&paths)
        .map(|dir| dir.join("ollama"))
        .find(|path| path.is_file())
        .ok_or(Error::OllamaNotFound)
}

/// Finds any port an LLM server environment listens on.
fn find_port(env: &Env) -> Option<u16> {
    env.pids
        .iter()
        .filter_map(|pid| probe::process::listen_ports(*pid).ok())
        .find_map(|ports| ports.first().copied())
}

/// Replaces the current process with ollama, never returning on success.
fn exec_ollama(args: &[&str], host: &str, port: u16) -> Result<()> {
    let path = which_ollama()?;

    let err = std::process::Command::new(path)
        .args(args)
        .env("OLLAMA_HOST", format!("{host}:{port}"))
        .exec();

    Err(err.into())
}

fn do_serve(
    model: &str,
    host: &str,
    port: u16,
    gpus: Option<u32>,
    gpu_memory: Option<String>,
) -> Result<()> {
    let root = utils::temp_dir();

    let config = Config {
        name: Some(format!("llm/{model}")),
        gpu_memory,
        gpus,
    };

    let _activation = sdk::activate(&root, None, Some(&config))?;

    // exec keeps our pid, so the environment holder stays the server
    exec_ollama(&["serve"], host, port)
}

fn do_attach(model: &str) -> Result<()> {
    let root = utils::temp_dir();

    let envs = {
        let _lock = state::global_lock(&root)?;

        core::envs::snapshot(&root)?
    };

    let envs = envs.filter_name(&format!("llm/{model}"));

    let env = envs
        .iter()
        .next()
        .ok_or_else(|| Error::LlmNotFound(model.to_string()))?;

    let port = find_port(env).ok_or_else(|| Error::LlmPortNotFound(model.to_string()))?;

    exec_ollama(&["run", model], "localhost", port)
}

fn do_ps(args: &PsArgs) -> Result<()> {
    let root = utils::temp_dir();

    let envs = {
        let _lock = state::global_lock(&root)?;

        core::envs::snapshot(&root)?
    };

    if args.header {
        match args.format {
            Format::Csv => println!("MODEL,PORT,CREATED,EID,USER,PID(S)"),
            Format::Tui => println!(
                "MODEL       PORT    CREATED              EID     USER            PID(S)"
            ),
        }
    }

    for env in envs.iter() {
        let Some(model) = env
            .config
            .name
            .as_deref()
            .and_then(|name| name.strip_prefix("llm/"))
        else {
            continue;
        };

        let port = find_port(env)
            .map(|port| port.to_string())
            .unwrap_or_else(|| "N/A".to_string());

        let created = if args.timestamp {
            env.creation.clone()
        } else {
            env.time_since()
        };

        let user = match &env.username {
            Some(username) => format!("{username}({})", env.uid),
            None => env.uid.to_string(),
        };

        let pids = env
            .pids
            .iter()
            .map(|pid| pid.to_string())
            .collect::<Vec<_>>()
            .join(" ");

        match args.format {
            Format::Csv => println!("{model},{port},{created},{},{user},{pids}", env.eid),
            Format::Tui => println!(
                "{model:<12}{port:<8}{created:<21}{:<8}{user:<16}{pids}",
                env.eid
            ),
        }
    }

    Ok(())
}

/// Runs the "genv llm" logic.
pub fn run(args: &LlmArgs) -> Result<()> {
    match &args.command {
        LlmCommand::Serve {
            model,
            host,
            port,
            gpus,
            gpu_memory,
        } => do_serve(model, host, *port, *gpus, gpu_memory.clone()),
        LlmCommand::Attach { model } => do_attach(model),
        LlmCommand::Ps(ps) => do_ps(ps),
    }
}
