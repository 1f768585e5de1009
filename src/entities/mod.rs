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

//! The genv data model.
//!
//! Environments, devices and processes are three coupled collections:
//! environments declare requirements, device attachments bind environments
//! to physical devices, and processes are the live `nvidia-smi` view joined
//! back to environments. A [`Snapshot`] captures all three consistently;
//! enforcement distills a snapshot into a [`Report`] through a [`Survey`].

mod device;
mod devices;
mod env;
mod envs;
mod process;
mod processes;
mod report;
mod snapshot;
mod survey;

pub use device::{Attachment, Device};
pub use devices::Devices;
pub use env::{Config, Env};
pub use envs::Envs;
pub use process::{Process, Usage};
pub use processes::Processes;
pub use report::Report;
pub use snapshot::Snapshot;
pub use survey::Survey;
