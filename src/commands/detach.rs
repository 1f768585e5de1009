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

use crate::cli::DetachArgs;
use crate::error::{Error, Result};
use crate::sdk;
use crate::utils;

/// Detaches the current environment from a device, or from all devices.
pub fn run(args: &DetachArgs) -> Result<()> {
    if !sdk::active() {
        return Err(Error::NotActive);
    }

    sdk::devices::detach(&utils::temp_dir(), args.index)?;

    Ok(())
}
