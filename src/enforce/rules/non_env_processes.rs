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

use crate::entities::Survey;

/// Terminates processes that are not running in an environment.
///
/// A process whose recovered environment identifier no longer names an
/// existing environment counts as a non-environment process.
pub fn non_env_processes(surveys: &mut [Survey]) {
    for survey in surveys {
        let mut pids = Vec::new();

        for process in survey.snapshot.processes.iter() {
            let known = process
                .eid
                .as_ref()
                .is_some_and(|eid| survey.snapshot.envs.contains(eid));

            if known {
                continue;
            }

            println!(
                "{}Process {} is not running in a GPU environment",
                survey.prefix(),
                process.pid
            );

            pids.push(process.pid);
        }

        for pid in pids {
            survey.terminate(pid);
        }
    }
}
