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

use crate::cli::{ConfigArgs, ConfigField};
use crate::entities::Config;
use crate::error::Result;
use crate::sdk;
use crate::utils;

fn print_all(config: &Config) {
    if let Some(gpu_memory) = &config.gpu_memory {
        println!("gpu-memory: {gpu_memory}");
    }

    if let Some(gpus) = config.gpus {
        println!("gpus: {gpus}");
    }

    if let Some(name) = &config.name {
        println!("name: {name}");
    }
}

/// Configures the current environment, or prints fields of its
/// configuration.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let root = utils::temp_dir();

    let mut config = sdk::env::refresh_configuration(&root)?;

    match &args.field {
        Some(ConfigField::Gpus { count }) => {
            if args.clear {
                config.gpus = None;
            } else if let Some(count) = count {
                config.gpus = Some(*count);
            } else if !args.quiet {
                if let Some(gpus) = config.gpus {
                    println!("{gpus}");
                }
            }
        }
        Some(ConfigField::Name { name }) => {
            if args.clear {
                config.name = None;
            } else if let Some(name) = name {
                config.name = Some(name.clone());
            } else if !args.quiet {
                if let Some(name) = &config.name {
                    println!("{name}");
                }
            }
        }
        Some(ConfigField::GpuMemory { gpu_memory }) => {
            if args.clear {
                config.gpu_memory = None;
            } else if let Some(gpu_memory) = gpu_memory {
                config.gpu_memory = Some(gpu_memory.clone());
            } else if !args.quiet {
                if let Some(gpu_memory) = &config.gpu_memory {
                    println!("{gpu_memory}");
                }
            }
        }
        None => {
            if args.clear {
                config = Config::default();
            } else if !args.quiet {
                print_all(&config);
            }
        }
    }

    sdk::env::configure(&root, &config)
}
