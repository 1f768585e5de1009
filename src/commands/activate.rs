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

use crate::cli::ActivateArgs;
use crate::core;
use crate::entities::Config;
use crate::error::{Error, Result};
use crate::sdk;
use crate::state;
use crate::utils;

/// Activates an environment for the calling shell and prints the script the
/// 'genv' shell function evaluates.
pub fn run(args: &ActivateArgs) -> Result<()> {
    let shell = args.shell.ok_or(Error::ShellNotInitialized)?;

    if sdk::active() {
        return Err(Error::AlreadyActive);
    }

    let root = utils::temp_dir();
    let eid = args.eid.clone().unwrap_or_else(|| shell.to_string());

    let uid = unsafe { libc::getuid() } as u32;
    let username = whoami::username();

    {
        let _lock = state::global_lock(&root)?;

        core::envs::activate(&root, &eid, uid, Some(&username), Some(shell), None)?;

        // the entire configuration is overridden if any field was specified
        if args.name.is_some() || args.gpu_memory.is_some() || args.gpus.is_some() {
            core::envs::configure(
                &root,
                &eid,
                &Config {
                    name: args.name.clone(),
                    gpu_memory: args.gpu_memory.clone(),
                    gpus: args.gpus,
                },
            )?;
        }

        if args.attach {
            if let Some(gpus) = args.gpus {
                core::devices::attach(
                    &root,
                    &eid,
                    None,
                    Some(gpus),
                    args.gpu_memory.as_deref(),
                    args.allow_over_subscription,
                )?;
            }
        }
    }

    println!(
        "\n\
         _genv_set_env GENV_SHELL 1\n\
         _genv_set_env GENV_ENVIRONMENT_ID {eid}\n\
         \n\
         eval \"$(command genv shell --reconfigure)\"\n\
         eval \"$(command genv shell --reattach)\"\n"
    );

    if args.prompt {
        println!("_genv_replace_env PS1 \"(genv) ${{PS1-}}\"");
    }

    Ok(())
}
