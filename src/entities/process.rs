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

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::memory_to_bytes;

/// The GPU index and amount of GPU memory used by a process on one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub index: u32,
    pub gpu_memory: String,
}

impl Usage {
    pub fn bytes(&self) -> Result<u64> {
        memory_to_bytes(&self.gpu_memory)
    }
}

/// A running compute process, as observed by `nvidia-smi` and joined with
/// the environment identifier recovered from its process environment.
///
/// The environment identifier is advisory: the owning environment may have
/// disappeared since the process started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    pub pid: u32,
    pub used_gpu_memory: Vec<Usage>,
    pub eid: Option<String>,
}

impl Process {
    /// The distinct device indices the process runs on.
    pub fn indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self.used_gpu_memory.iter().map(|u| u.index).collect();
        indices.sort_unstable();
        indices.dedup();

        indices
    }

    /// Total GPU memory used across devices, in bytes.
    pub fn total_bytes(&self) -> Result<u64> {
        let mut total = 0;

        for usage in &self.used_gpu_memory {
            total += usage.bytes()?;
        }

        Ok(total)
    }

    /// Returns a copy of the process with usage of the given device only.
    pub fn filter_index(&self, index: u32) -> Process {
        Process {
            pid: self.pid,
            used_gpu_memory: self
                .used_gpu_memory
                .iter()
                .filter(|usage| usage.index == index)
                .cloned()
                .collect(),
            eid: self.eid.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process() -> Process {
        Process {
            pid: 1337,
            used_gpu_memory: vec![
                Usage {
                    index: 0,
                    gpu_memory: "3gi".to_string(),
                },
                Usage {
                    index: 1,
                    gpu_memory: "1gi".to_string(),
                },
                Usage {
                    index: 0,
                    gpu_memory: "1gi".to_string(),
                },
            ],
            eid: Some("1337".to_string()),
        }
    }

    #[test]
    fn test_indices_are_distinct() {
        assert_eq!(process().indices(), vec![0, 1]);
    }

    #[test]
    fn test_total_bytes() {
        assert_eq!(process().total_bytes().unwrap(), 5 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_filter_index() {
        let filtered = process().filter_index(0);

        assert_eq!(filtered.indices(), vec![0]);
        assert_eq!(filtered.total_bytes().unwrap(), 4 * 1024 * 1024 * 1024);
    }
}
