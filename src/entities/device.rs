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

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::memory_to_bytes;

/// The record binding an environment to a device, with an optional reserved
/// memory amount. An attachment without a memory amount accounts for the
/// whole device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub eid: String,
    pub gpu_memory: Option<String>,
    pub time: String,
}

/// A physical device and its attachments, identified by its 0-based index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub index: u32,
    pub total_memory: String,
    pub attachments: Vec<Attachment>,
}

impl Device {
    /// The environment identifiers attached to this device; a multiset, as
    /// an environment can hold several attachments.
    pub fn eids(&self) -> Vec<&str> {
        self.attachments
            .iter()
            .map(|attachment| attachment.eid.as_str())
            .collect()
    }

    pub fn attached(&self) -> bool {
        !self.attachments.is_empty()
    }

    pub fn detached(&self) -> bool {
        self.attachments.is_empty()
    }

    pub fn total_memory_bytes(&self) -> Result<u64> {
        memory_to_bytes(&self.total_memory)
    }

    /// The memory in bytes not yet accounted for by attachments, clamped at
    /// zero for over-subscribed devices.
    pub fn available_memory_bytes(&self) -> Result<u64> {
        let total = self.total_memory_bytes()?;

        let mut accounted: u64 = 0;

        for attachment in &self.attachments {
            accounted += match &attachment.gpu_memory {
                Some(memory) => memory_to_bytes(memory)?,
                None => total,
            };
        }

        Ok(total.saturating_sub(accounted))
    }

    /// Whether the device is available with respect to a memory
    /// specification: the amount must fit when one is given, otherwise the
    /// device must be fully detached.
    pub fn available(&self, gpu_memory: Option<&str>) -> Result<bool> {
        match gpu_memory {
            None => Ok(self.detached()),
            Some(memory) => Ok(self.available_memory_bytes()? >= memory_to_bytes(memory)?),
        }
    }

    /// Returns a copy of the device holding only attachments of the given
    /// environments.
    pub fn filter_eids(&self, eids: &HashSet<String>) -> Device {
        Device {
            index: self.index,
            total_memory: self.total_memory.clone(),
            attachments: self
                .attachments
                .iter()
                .filter(|attachment| eids.contains(&attachment.eid))
                .cloned()
                .collect(),
        }
    }

    pub fn attach(&mut self, eid: &str, gpu_memory: Option<&str>, time: &str) {
        self.attachments.push(Attachment {
            eid: eid.to_string(),
            gpu_memory: gpu_memory.map(str::to_string),
            time: time.to_string(),
        });
    }

    /// Removes every attachment of the given environment.
    pub fn detach(&mut self, eid: &str) {
        self.attachments.retain(|attachment| attachment.eid != eid);
    }
}
