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

use crate::error::{Error, Result};
use crate::utils;

use super::Device;

/// A collection of devices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Devices {
    pub devices: Vec<Device>,
}

impl Devices {
    /// Device indices in ascending order.
    pub fn indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self.devices.iter().map(|device| device.index).collect();
        indices.sort_unstable();

        indices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn contains(&self, index: u32) -> bool {
        self.devices.iter().any(|device| device.index == index)
    }

    pub fn get(&self, index: u32) -> Option<&Device> {
        self.devices.iter().find(|device| device.index == index)
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut Device> {
        self.devices.iter_mut().find(|device| device.index == index)
    }

    /// Returns a new collection with only the given indices.
    pub fn filter_indices(&self, indices: &[u32]) -> Devices {
        Devices {
            devices: self
                .devices
                .iter()
                .filter(|device| indices.contains(&device.index))
                .cloned()
                .collect(),
        }
    }

    /// Returns a new collection without the given indices.
    pub fn filter_not_indices(&self, indices: &[u32]) -> Devices {
        Devices {
            devices: self
                .devices
                .iter()
                .filter(|device| !indices.contains(&device.index))
                .cloned()
                .collect(),
        }
    }

    /// Returns a new collection with only devices attached to the given
    /// environment, each stripped down to that environment's attachments.
    pub fn filter_eid(&self, eid: &str) -> Devices {
        self.filter_eids(&HashSet::from([eid.to_string()]), true)
    }

    /// Returns a new collection with only devices holding at least one
    /// attachment of the given environments.
    ///
    /// Deep filtering also strips non-matching attachments off each retained
    /// device; otherwise devices are kept whole.
    pub fn filter_eids(&self, eids: &HashSet<String>, deep: bool) -> Devices {
        let devices = self
            .devices
            .iter()
            .map(|device| {
                if deep {
                    device.filter_eids(eids)
                } else {
                    device.clone()
                }
            })
            .filter(|device| device.eids().iter().any(|eid| eids.contains(*eid)));

        Devices {
            devices: devices.collect(),
        }
    }

    /// Returns a new collection with only attached (or only detached)
    /// devices.
    pub fn filter_attached(&self, attached: bool) -> Devices {
        Devices {
            devices: self
                .devices
                .iter()
                .filter(|device| device.attached() == attached)
                .cloned()
                .collect(),
        }
    }

    /// Attaches an environment to the given devices, stamping the
    /// attachments with the current time.
    pub fn attach(&mut self, eid: &str, indices: &[u32], gpu_memory: Option<&str>) {
        let time = utils::now();

        for index in indices {
            if let Some(device) = self.get_mut(*index) {
                device.attach(eid, gpu_memory, &time);
            }
        }
    }

    /// Detaches an environment from the given device, or from all devices.
    pub fn detach(&mut self, eid: &str, index: Option<u32>) {
        match index {
            Some(index) => {
                if let Some(device) = self.get_mut(index) {
                    device.detach(eid);
                }
            }
            None => {
                for device in &mut self.devices {
                    device.detach(eid);
                }
            }
        }
    }

    /// Removes attachments whose environment no longer exists.
    pub fn cleanup(&mut self, mut poll_eid: impl FnMut(&str) -> bool) {
        for device in &mut self.devices {
            device
                .attachments
                .retain(|attachment| poll_eid(&attachment.eid));
        }
    }

    /// Finds devices for an attachment of `n` devices with the given memory
    /// specification.
    ///
    /// Iterates devices by ascending index, taking available ones first;
    /// when over-subscription is allowed and not enough devices are
    /// available, unavailable devices are taken as well, again by ascending
    /// index. Deterministic by construction.
    pub fn find_available_devices(
        &self,
        n: usize,
        gpu_memory: Option<&str>,
        allow_over_subscription: bool,
    ) -> Result<Vec<u32>> {
        let mut available = Vec::new();
        let mut over_subscribed = Vec::new();

        for index in self.indices() {
            let device = self.get(index).expect("index comes from the collection");

            if device.available(gpu_memory)? {
                available.push(index);
            } else {
                over_subscribed.push(index);
            }
        }

        let mut indices = available;

        if indices.len() < n && allow_over_subscription {
            let missing = n - indices.len();
            indices.extend(over_subscribed.into_iter().take(missing));
        }

        if indices.len() < n {
            return Err(Error::InsufficientDevices {
                requested: n,
                available: indices.len(),
            });
        }

        indices.truncate(n);

        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices(total: u32) -> Devices {
        Devices {
            devices: (0..total)
                .map(|index| Device {
                    index,
                    total_memory: "16gi".to_string(),
                    attachments: Vec::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_find_available_prefers_low_indices() {
        let devices = devices(4);

        assert_eq!(
            devices.find_available_devices(2, None, false).unwrap(),
            vec![0, 1]
        );
    }

    #[test]
    fn test_find_available_skips_attached() {
        let mut devices = devices(4);
        devices.attach("x", &[0, 2], None);

        assert_eq!(
            devices.find_available_devices(2, None, false).unwrap(),
            vec![1, 3]
        );
    }

    #[test]
    fn test_find_available_insufficient() {
        let mut devices = devices(2);
        devices.attach("x", &[0], None);

        let err = devices.find_available_devices(2, None, false).unwrap_err();

        assert!(matches!(
            err,
            Error::InsufficientDevices {
                requested: 2,
                available: 1,
            }
        ));
    }

    #[test]
    fn test_find_available_over_subscription_order() {
        let mut devices = devices(3);
        devices.attach("x", &[0, 1], None);

        // available device 2 first, then over-subscribed ones by index
        assert_eq!(
            devices.find_available_devices(3, None, true).unwrap(),
            vec![2, 0, 1]
        );
    }

    #[test]
    fn test_find_available_with_memory() {
        let mut devices = devices(2);
        devices.attach("x", &[0], Some("8gi"));

        // device 0 still has 8gi available
        assert_eq!(
            devices
                .find_available_devices(1, Some("8gi"), false)
                .unwrap(),
            vec![0]
        );

        // but not 9gi
        assert_eq!(
            devices
                .find_available_devices(1, Some("9gi"), false)
                .unwrap(),
            vec![1]
        );
    }

    #[test]
    fn test_detach_everywhere() {
        let mut devices = devices(3);
        devices.attach("x", &[0, 1, 2], None);
        devices.attach("y", &[1], Some("1gi"));

        devices.detach("x", None);

        assert!(devices.filter_eid("x").is_empty());
        assert_eq!(devices.filter_eid("y").indices(), vec![1]);
    }

    #[test]
    fn test_detach_is_idempotent() {
        let mut devices = devices(2);
        devices.attach("x", &[0], None);

        devices.detach("x", None);
        devices.detach("x", None);

        assert!(devices.filter_eid("x").is_empty());
    }

    #[test]
    fn test_filter_eids_deep_strips_other_attachments() {
        let mut devices = devices(2);
        devices.attach("x", &[0], Some("1gi"));
        devices.attach("y", &[0], Some("1gi"));

        let eids = HashSet::from(["x".to_string()]);

        let deep = devices.filter_eids(&eids, true);
        assert_eq!(deep.get(0).unwrap().eids(), vec!["x"]);

        let shallow = devices.filter_eids(&eids, false);
        assert_eq!(shallow.get(0).unwrap().eids(), vec!["x", "y"]);
    }

    #[test]
    fn test_cleanup_prunes_orphans() {
        let mut devices = devices(2);
        devices.attach("live", &[0], None);
        devices.attach("dead", &[0, 1], None);

        devices.cleanup(|eid| eid == "live");

        assert_eq!(devices.filter_eid("live").indices(), vec![0]);
        assert!(devices.filter_eid("dead").is_empty());
    }
}
