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

//! Fleet operations: the same verbs fanned out to multiple hosts.

use std::os::unix::process::CommandExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cli::{EnforceArgs, Format, MonitorArgs, PsArgs, RemoteArgs, RemoteCommand};
use crate::enforce::Rules;
use crate::entities::{Env, Survey};
use crate::error::{Error, Result};
use crate::metrics::{server, Collection, SPECS};
use crate::remote::{self, Config, Host};

fn config_from(args: &RemoteArgs) -> Result<Config> {
    let hostnames: Vec<String> = if let Some(hostnames) = &args.hostnames {
        hostnames
            .split(',')
            .map(str::trim)
            .filter(|hostname| !hostname.is_empty())
            .map(str::to_string)
            .collect()
    } else if let Some(hostfile) = &args.hostfile {
        std::fs::read_to_string(hostfile)?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };

    Ok(Config {
        hosts: hostnames
            .into_iter()
            .map(|hostname| Host {
                hostname,
                timeout: args.timeout,
            })
            .collect(),
        throw_on_error: args.throw_on_error,
        quiet: args.quiet,
    })
}

/// Finds the first host in list order with enough detached devices.
async fn find_available_host(config: &Config, gpus: Option<u32>) -> Result<Host> {
    let snapshots = remote::core::devices(config).await?;

    for (host, devices) in snapshots {
        if let Some(gpus) = gpus {
            let available = devices.filter_attached(false).len();

            if available < gpus as usize {
                continue;
            }
        }

        return Ok(host);
    }

    Err(Error::HostNotFound)
}

/// Connects to a host with enough available resources and pre-activates an
/// environment in the remote shell. Does not return on success.
async fn do_activate(
    config: &Config,
    name: Option<&str>,
    gpus: Option<u32>,
    prompt: bool,
) -> Result<()> {
    let host = find_available_host(config, gpus).await?;

    let mut env = vec![
        ("GENV_PREACTIVATE".to_string(), "1".to_string()),
        (
            "GENV_PREACTIVATE_PROMPT".to_string(),
            if prompt { "1" } else { "0" }.to_string(),
        ),
    ];

    if let Some(gpus) = gpus {
        env.push(("GENV_PREACTIVATE_GPUS".to_string(), gpus.to_string()));
    }

    if let Some(name) = name {
        env.push((
            "GENV_PREACTIVATE_ENVIRONMENT_NAME".to_string(),
            name.to_string(),
        ));
    }

    let mut command = std::process::Command::new("ssh");

    for (variable, value) in &env {
        command.arg("-o").arg(format!("SendEnv={variable}"));
        command.env(variable, value);
    }

    let err = command.arg(&host.hostname).exec();

    Err(err.into())
}

async fn do_devices(config: &Config, ps: &PsArgs, summary: bool) -> Result<()> {
    let snapshots = remote::core::devices(config).await?;

    if ps.header {
        match ps.format {
            Format::Csv => println!("HOST,TOTAL,AVAILABLE"),
            Format::Tui => println!("HOST                     TOTAL    AVAILABLE"),
        }
    }

    let mut total = 0;
    let mut available = 0;

    for (host, devices) in &snapshots {
        let host_total = devices.len();
        let host_available = devices.filter_attached(false).len();

        total += host_total;
        available += host_available;

        match ps.format {
            Format::Csv => println!("{},{host_total},{host_available}", host.hostname),
            Format::Tui => println!(
                "{:<25}{host_total:<9}{host_available}",
                host.hostname
            ),
        }
    }

    if summary {
        println!(
            "\nTotal {total} devices with {available} available on {} hosts",
            snapshots.len()
        );
    }

    Ok(())
}

fn user(env: &Env) -> String {
    env.username.clone().unwrap_or_default()
}

async fn do_envs(config: &Config, ps: &PsArgs, summary: bool) -> Result<()> {
    let snapshots = remote::core::envs(config).await?;

    if ps.header {
        match ps.format {
            Format::Csv => println!("HOST,ID,USER,NAME,CREATED"),
            Format::Tui => println!(
                "HOST                     ID      USER            NAME            CREATED"
            ),
        }
    }

    for (host, envs) in &snapshots {
        for env in envs.iter() {
            let name = env.config.name.clone().unwrap_or_default();
            let created = if ps.timestamp {
                env.creation.clone()
            } else {
                env.time_since()
            };

            match ps.format {
                Format::Csv => println!(
                    "{},{},{},{name},{created}",
                    host.hostname,
                    env.eid,
                    user(env)
                ),
                Format::Tui => println!(
                    "{:<25}{:<8}{:<16}{name:<16}{created}",
                    host.hostname,
                    env.eid,
                    user(env)
                ),
            }
        }
    }

    if summary {
        let total: usize = snapshots.iter().map(|(_, envs)| envs.len()).sum();

        println!("\nTotal {total} environments on {} hosts", snapshots.len());
    }

    Ok(())
}

/// Runs the enforcement loop against every host: one survey per host, rules
/// aggregated across all of them, reports executed remotely.
async fn do_enforce(config: &Config, args: &EnforceArgs) -> Result<()> {
    let rules = Rules::from(args);

    loop {
        let snapshots = remote::core::snapshot(config).await?;

        let mut surveys: Vec<Survey> = snapshots
            .into_iter()
            .map(|(host, snapshot)| Survey::new(snapshot, Some(host.hostname)))
            .collect();

        rules.run(&mut surveys);

        let mut hosts = Vec::new();
        let mut reports = Vec::new();

        for survey in &surveys {
            let report = survey.report();

            if report.is_empty() {
                continue;
            }

            hosts.push(Host {
                hostname: survey.hostname.clone().expect("remote surveys have one"),
                timeout: config.hosts.first().and_then(|host| host.timeout),
            });
            reports.push(report);
        }

        if !reports.is_empty() {
            let execute_config = Config {
                hosts,
                throw_on_error: config.throw_on_error,
                quiet: config.quiet,
            };

            remote::enforce::execute(&execute_config, &reports).await?;
        }

        if args.interval == 0 {
            break;
        }

        tokio::time::sleep(Duration::from_secs(args.interval)).await;
    }

    Ok(())
}

async fn do_monitor(config: &Config, args: &MonitorArgs) -> Result<()> {
    let collection = Arc::new(Mutex::new(Collection::new(SPECS)));

    tokio::spawn(server::serve(args.port, collection.clone()));

    loop {
        let snapshots = remote::core::snapshot(config).await?;

        {
            let mut collection = collection.lock().expect("collection lock poisoned");

            for (host, snapshot) in &snapshots {
                collection.cleanup(&host.hostname, snapshot);
                collection.update(&host.hostname, snapshot);
            }
        }

        tokio::time::sleep(Duration::from_secs(args.interval)).await;
    }
}

async fn do_query(config: &Config, name: &str, queries: &[String]) -> Result<()> {
    let snapshots = remote::core::envs(config).await?;

    for (host, envs) in &snapshots {
        for env in envs.iter() {
            if env.config.name.as_deref() != Some(name) {
                continue;
            }

            let values: Vec<String> = queries
                .iter()
                .map(|query| match query.as_str() {
                    "hostname" => host.hostname.clone(),
                    "eid" => env.eid.clone(),
                    "creation" => env.creation.clone(),
                    _ => String::new(),
                })
                .collect();

            println!("{}", values.join(","));
        }
    }

    Ok(())
}

/// Runs the "genv remote" logic.
pub async fn run(args: &RemoteArgs) -> Result<()> {
    let config = config_from(args)?;

    match &args.command {
        RemoteCommand::Activate { name, gpus, prompt } => {
            do_activate(&config, name.as_deref(), *gpus, *prompt).await
        }
        RemoteCommand::Devices { ps, summary } => do_devices(&config, ps, *summary).await,
        RemoteCommand::Enforce(enforce) => do_enforce(&config, enforce).await,
        RemoteCommand::Envs { ps, summary } => do_envs(&config, ps, *summary).await,
        RemoteCommand::Monitor(monitor) => do_monitor(&config, monitor).await,
        RemoteCommand::Query { name, queries } => do_query(&config, name, queries).await,
    }
}
