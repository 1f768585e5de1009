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

use crate::entities::Report;
use crate::error::Result;

use super::{reprint, run, Command, Config};

/// Executes enforcement reports on multiple hosts.
///
/// Each report is serialized as JSON to its host's stdin of
/// `genv usage execute`.
pub async fn execute(config: &Config, reports: &[Report]) -> Result<()> {
    let command = Command::new(&["usage", "execute"], true);

    let stdins = reports
        .iter()
        .map(serde_json::to_string)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (host, stdout) in run(config, &command, Some(stdins)).await? {
        reprint(&host.hostname, &stdout, false);
    }

    Ok(())
}
