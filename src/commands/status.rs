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

use crate::error::Result;
use crate::sdk;
use crate::utils;

/// Prints the status of the current environment.
pub fn run() -> Result<()> {
    let Some(eid) = sdk::eid() else {
        println!("Environment is not active");
        return Ok(());
    };

    println!("Environment is active ({eid})");

    let indices = sdk::devices::attached(&utils::temp_dir())?;

    if indices.is_empty() {
        println!("Detached from GPUs");
    } else {
        let indices: Vec<String> = indices.iter().map(|index| index.to_string()).collect();

        println!("Attached to GPUs at indices {}", indices.join(","));
    }

    let config = sdk::env::configuration()?;

    println!();
    println!("Configuration");
    println!("    Name: {}", config.name.as_deref().unwrap_or("N/A"));
    println!(
        "    Device count: {}",
        config
            .gpus
            .map(|gpus| gpus.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    );
    println!(
        "    GPU memory capacity: {}",
        config.gpu_memory.as_deref().unwrap_or("N/A")
    );
    println!();

    Ok(())
}
