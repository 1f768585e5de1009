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

use crate::cli::DeactivateArgs;
use crate::core;
use crate::error::{Error, Result};
use crate::sdk;
use crate::state;
use crate::utils;

/// Deactivates the calling shell and prints the script undoing the
/// published environment variables.
pub fn run(args: &DeactivateArgs) -> Result<()> {
    let shell = args.shell.ok_or(Error::ShellNotInitialized)?;

    if !sdk::active() {
        return Err(Error::NotActive);
    }

    let root = utils::temp_dir();

    {
        let _lock = state::global_lock(&root)?;

        core::envs::deactivate(&root, Some(shell), None)?;

        // drop attachments in case this was the last terminal of the
        // environment
        core::devices::cleanup(&root)?;
    }

    println!("\n_genv_unset_envs\n_genv_restore_envs\n");

    Ok(())
}
