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

//! Gauge collection for the monitoring loop.
//!
//! Gauges are keyed by label sets derived from snapshots. Labels of
//! environments, processes, devices and users that disappear from the
//! latest snapshot are removed by [`Collection::cleanup`] so the exporter
//! never reports stale series.

mod collection;
pub mod server;

pub use collection::{Collection, Kind, Metric, Spec, SPECS};
