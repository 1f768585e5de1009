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

use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use genv::cli::{Cli, Commands};
use genv::commands;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Ctrl-C exits between state commits; mutations only reach disk on
    // clean scope completion, so there are no partial writes to unwind
    tokio::spawn(async {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        std::process::exit(0);
    });

    let result = match cli.command {
        Commands::Activate(args) => commands::activate::run(&args),
        Commands::Attach(args) => commands::attach::run(&args),
        Commands::Config(args) => commands::config::run(&args),
        Commands::Deactivate(args) => commands::deactivate::run(&args),
        Commands::Detach(args) => commands::detach::run(&args),
        Commands::Devices(args) => commands::devices::run(&args),
        Commands::Enforce(args) => commands::enforce::run(&args).await,
        Commands::Envs(args) => commands::envs::run(&args),
        Commands::Llm(args) => commands::llm::run(&args),
        Commands::Lock(args) => commands::lock::run(&args),
        Commands::Monitor(args) => commands::monitor::run(&args).await,
        Commands::Remote(args) => commands::remote::run(&args).await,
        Commands::Shell(args) => commands::shell::run(&args),
        Commands::Status => commands::status::run(),
        Commands::Usage(args) => commands::usage::run(&args).await,
    };

    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
