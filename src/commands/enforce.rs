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

use std::time::Duration;

use crate::cli::EnforceArgs;
use crate::core;
use crate::enforce::{self, Rules};
use crate::entities::Survey;
use crate::error::Result;
use crate::state;
use crate::utils;

impl From<&EnforceArgs> for Rules {
    fn from(args: &EnforceArgs) -> Self {
        Rules {
            non_env_processes: args.non_env_processes,
            env_devices: args.env_devices,
            env_memory: args.env_memory,
            max_devices_per_user: args.max_devices_per_user,
            max_devices_for_user: args.max_devices_for_user.iter().cloned().collect(),
        }
    }
}

/// Runs the local enforcement loop; an interval of 0 means a single pass.
pub async fn run(args: &EnforceArgs) -> Result<()> {
    let root = utils::temp_dir();
    let rules = Rules::from(args);

    loop {
        let snapshot = {
            let _lock = state::global_lock(&root)?;

            core::snapshot(&root).await?
        };

        let mut surveys = vec![Survey::new(snapshot, None)];

        rules.run(&mut surveys);

        let report = surveys[0].report();

        {
            let _lock = state::global_lock(&root)?;

            if let Err(err) = enforce::execute(&root, &report) {
                // a failing pass never breaks the loop
                eprintln!("{err}");
            }
        }

        if args.interval == 0 {
            break;
        }

        tokio::time::sleep(Duration::from_secs(args.interval)).await;
    }

    Ok(())
}
