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

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cli::MonitorArgs;
use crate::core;
use crate::error::Result;
use crate::metrics::{server, Collection, SPECS};
use crate::state;
use crate::utils;

/// Runs the Prometheus exporter and the local collection loop.
pub async fn run(args: &MonitorArgs) -> Result<()> {
    let collection = Arc::new(Mutex::new(Collection::new(SPECS)));

    tokio::spawn(server::serve(args.port, collection.clone()));

    let root = utils::temp_dir();
    let hostname = utils::hostname();

    loop {
        let snapshot = {
            let _lock = state::global_lock(&root)?;

            core::snapshot(&root).await?
        };

        {
            let mut collection = collection.lock().expect("collection lock poisoned");

            collection.cleanup(&hostname, &snapshot);
            collection.update(&hostname, &snapshot);
        }

        tokio::time::sleep(Duration::from_secs(args.interval)).await;
    }
}
