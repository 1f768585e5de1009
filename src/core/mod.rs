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

//! State-backed registries.
//!
//! These functions take the state directory explicitly; CLI and SDK callers
//! pass [`crate::utils::temp_dir`]. Functions that touch more than one state
//! file expect the caller to hold the global lock for the whole span.

pub mod devices;
pub mod envs;
pub mod processes;
pub mod snapshot;

pub use snapshot::snapshot;
