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

//! The environment variable contract.
//!
//! Every variable the SDK publishes is listed in `GENV_ENVS` (colon
//! separated) so the shell helpers can undo them on deactivation, and any
//! pre-activation value is preserved in `GENV_BACKUP_ENV_<NAME>`.

use std::env;

const ENVS_VAR: &str = "GENV_ENVS";
const BACKUP_PREFIX: &str = "GENV_BACKUP_ENV_";

fn names() -> Vec<String> {
    env::var(ENVS_VAR)
        .unwrap_or_default()
        .split(':')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Publishes a variable and records it in `GENV_ENVS`.
pub(crate) fn set(name: &str, value: &str) {
    env::set_var(name, value);

    let mut names = names();

    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
        env::set_var(ENVS_VAR, names.join(":"));
    }
}

/// Publishes a variable, backing up any pre-activation value first.
pub(crate) fn replace(name: &str, value: &str) {
    let backup = format!("{BACKUP_PREFIX}{name}");

    if let Ok(previous) = env::var(name) {
        if env::var(&backup).is_err() {
            env::set_var(&backup, previous);
        }
    }

    set(name, value);
}

/// Removes a published variable.
pub(crate) fn unset(name: &str) {
    env::remove_var(name);
}

/// Undoes every published variable and restores the backed up values.
pub(crate) fn restore() {
    for name in names() {
        env::remove_var(&name);

        let backup = format!("{BACKUP_PREFIX}{name}");

        if let Ok(previous) = env::var(&backup) {
            env::set_var(&name, previous);
            env::remove_var(&backup);
        }
    }

    env::remove_var(ENVS_VAR);
}
