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

use crate::cli::AttachArgs;
use crate::error::{Error, Result};
use crate::sdk;
use crate::utils;

/// Attaches devices to the current environment.
///
/// The 'genv' shell function refreshes `CUDA_VISIBLE_DEVICES` afterwards
/// with `genv shell --reattach`.
pub fn run(args: &AttachArgs) -> Result<()> {
    if !sdk::active() {
        return Err(Error::NotActive);
    }

    if !args.refresh {
        sdk::devices::attach(
            &utils::temp_dir(),
            args.index,
            args.count,
            args.allow_over_subscription,
        )?;
    }

    Ok(())
}
