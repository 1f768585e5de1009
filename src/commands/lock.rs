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

use crate::cli::LockArgs;
use crate::error::Result;
use crate::sdk;
use crate::utils;

/// Runs a command while holding the advisory locks of the attached devices.
pub fn run(args: &LockArgs) -> Result<()> {
    let _locks = sdk::devices::lock(&utils::temp_dir())?;

    let status = if args.args.is_empty() {
        0
    } else {
        std::process::Command::new(&args.args[0])
            .args(&args.args[1..])
            .status()?
            .code()
            .unwrap_or(1)
    };

    std::process::exit(status);
}
