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

//! The enforcement engine.
//!
//! Rules run over surveys and collect processes to terminate and
//! environments to detach; reporting and applying are separate so that
//! surveys can be aggregated across hosts before execution.

pub mod execute;
pub mod rules;

use std::collections::HashMap;

use crate::entities::Survey;

pub use execute::execute;

/// Which rules to run, and their parameters.
#[derive(Debug, Clone)]
pub struct Rules {
    pub non_env_processes: bool,
    pub env_devices: bool,
    pub env_memory: bool,
    pub max_devices_per_user: Option<u32>,
    pub max_devices_for_user: HashMap<String, u32>,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            non_env_processes: false,
            env_devices: true,
            env_memory: true,
            max_devices_per_user: None,
            max_devices_for_user: HashMap::new(),
        }
    }
}

impl Rules {
    /// Runs every enabled rule over the surveys.
    pub fn run(&self, surveys: &mut [Survey]) {
        if self.non_env_processes {
            rules::non_env_processes(surveys);
        }

        if self.env_devices {
            rules::env_devices(surveys);
        }

        if self.env_memory {
            rules::env_memory(surveys);
        }

        if let Some(maximum) = self.max_devices_per_user {
            rules::max_devices_per_user(surveys, maximum, &self.max_devices_for_user);
        }
    }
}
