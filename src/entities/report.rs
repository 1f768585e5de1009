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

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Envs, Processes};

/// The output of enforcement: processes to terminate and environments to
/// detach per device index.
///
/// Serialized as JSON for cross-host execution; device indices survive the
/// round-trip as integer map keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    pub terminate: Processes,
    pub detach: HashMap<u32, Envs>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.terminate.is_empty() && self.detach.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Envs, Process, Usage};

    #[test]
    fn test_empty() {
        assert!(Report::default().is_empty());
    }

    #[test]
    fn test_json_round_trip_keeps_integer_device_keys() {
        let mut envs = Envs::default();
        envs.activate("1337", 1000, Some("raz"));

        let report = Report {
            terminate: Processes {
                processes: vec![Process {
                    pid: 42,
                    used_gpu_memory: vec![Usage {
                        index: 1,
                        gpu_memory: "1gi".to_string(),
                    }],
                    eid: Some("1337".to_string()),
                }],
            },
            detach: HashMap::from([(1, envs)]),
        };

        let encoded = serde_json::to_string(&report).unwrap();
        let decoded: Report = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.terminate.pids(), vec![42]);
        assert_eq!(
            decoded.detach.get(&1).unwrap().eids(),
            vec!["1337".to_string()]
        );
        assert!(!decoded.is_empty());
    }
}
