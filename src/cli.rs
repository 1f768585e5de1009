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

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "genv",
    version,
    about = "Query and control Genv on this machine or in a cluster"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Activate shell environment.
    Activate(ActivateArgs),
    /// Attach devices to this environment.
    Attach(AttachArgs),
    /// Configure the current environment.
    Config(ConfigArgs),
    /// Deactivate shell environment.
    Deactivate(DeactivateArgs),
    /// Detach devices from this environment.
    Detach(DetachArgs),
    /// Query and manage devices.
    Devices(DevicesArgs),
    /// Enforce GPU usage.
    Enforce(EnforceArgs),
    /// Query and manage environments.
    Envs(EnvsArgs),
    /// Run and attach to LLMs.
    #[command(alias = "llms")]
    Llm(LlmArgs),
    /// Lock over-subscribed devices.
    Lock(LockArgs),
    /// Monitor using a Prometheus exporter.
    Monitor(MonitorArgs),
    /// Query, manage and monitor remote machines.
    Remote(RemoteArgs),
    /// Shell support.
    Shell(ShellArgs),
    /// Show status of the current environment.
    Status,
    /// GPU usage miscellaneous.
    Usage(UsageArgs),
}

#[derive(Args)]
pub struct ActivateArgs {
    /// Process identifier of the calling shell; passed by the 'genv' shell
    /// function.
    #[arg(long, hide = true)]
    pub shell: Option<u32>,

    /// Environment identifier.
    #[arg(long, visible_alias = "id")]
    pub eid: Option<String>,

    /// Environment name.
    #[arg(long)]
    pub name: Option<String>,

    /// Environment device memory capacity (e.g. 4g).
    #[arg(long)]
    pub gpu_memory: Option<String>,

    /// Environment device count.
    #[arg(long)]
    pub gpus: Option<u32>,

    /// Don't change the prompt.
    #[arg(long = "no-prompt", action = ArgAction::SetFalse)]
    pub prompt: bool,

    /// Don't attach to devices.
    #[arg(long = "no-attach", action = ArgAction::SetFalse)]
    pub attach: bool,

    /// Use unavailable devices if needed.
    #[arg(short = 'o', long = "over-subscribe")]
    pub allow_over_subscription: bool,
}

#[derive(Args)]
pub struct DeactivateArgs {
    /// Process identifier of the calling shell; passed by the 'genv' shell
    /// function.
    #[arg(long, hide = true)]
    pub shell: Option<u32>,
}

#[derive(Args)]
pub struct AttachArgs {
    /// Total number of devices to be attached.
    #[arg(long, conflicts_with = "index")]
    pub count: Option<u32>,

    /// Attach to the device with the given index.
    #[arg(long)]
    pub index: Option<u32>,

    /// Only refresh attachments.
    #[arg(long)]
    pub refresh: bool,

    /// Use unavailable devices if needed.
    #[arg(short = 'o', long = "over-subscribe")]
    pub allow_over_subscription: bool,
}

#[derive(Args)]
pub struct DetachArgs {
    /// Detach from the device with the given index; detaches from all
    /// devices otherwise.
    #[arg(long)]
    pub index: Option<u32>,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Only refresh the configuration.
    #[arg(short = 'q', long = "quiet", visible_alias = "refresh", global = true)]
    pub quiet: bool,

    /// Clear the field, or the entire configuration.
    #[arg(long, global = true)]
    pub clear: bool,

    #[command(subcommand)]
    pub field: Option<ConfigField>,
}

#[derive(Subcommand)]
pub enum ConfigField {
    /// Configure device count for environment.
    Gpus { count: Option<u32> },
    /// Configure environment name.
    Name { name: Option<String> },
    /// Configure environment GPU memory capacity.
    GpuMemory { gpu_memory: Option<String> },
}

#[derive(Args)]
pub struct EnvsArgs {
    /// Do not perform clean up.
    #[arg(long = "no-cleanup", action = ArgAction::SetFalse)]
    pub cleanup: bool,

    /// Reset previous state.
    #[arg(long)]
    pub reset: bool,

    #[command(subcommand)]
    pub command: Option<EnvsCommand>,
}

#[derive(Subcommand)]
pub enum EnvsCommand {
    /// Activate a process or a Jupyter kernel.
    Activate {
        /// Environment identifier.
        #[arg(long)]
        eid: String,
        /// User identifier.
        #[arg(long)]
        uid: u32,
        /// User name.
        #[arg(long)]
        username: Option<String>,
        /// Process identifier.
        #[arg(long, conflicts_with = "kernel_id")]
        pid: Option<u32>,
        /// Jupyter kernel identifier.
        #[arg(long)]
        kernel_id: Option<String>,
    },
    /// Configure an environment.
    Config {
        /// Environment identifier.
        #[arg(long)]
        eid: String,
        #[command(subcommand)]
        field: ConfigField,
        /// Clear the field.
        #[arg(long, global = true)]
        clear: bool,
    },
    /// Deactivate a process or a Jupyter kernel.
    Deactivate {
        /// Process identifier.
        #[arg(long)]
        pid: u32,
    },
    /// Find the environment of a process or a Jupyter kernel.
    Find {
        /// Process identifier.
        #[arg(long, conflicts_with = "kernel_id")]
        pid: Option<u32>,
        /// Jupyter kernel identifier.
        #[arg(long)]
        kernel_id: Option<String>,
    },
    /// Print information about active environments.
    Ps(PsArgs),
    /// Query environments or a specific one.
    Query {
        /// Environment identifier.
        #[arg(long)]
        eid: Option<String>,
        /// Field names to print, comma-joined per environment.
        #[arg(long = "query", visible_alias = "queries", num_args = 1.., required = true)]
        queries: Vec<String>,
    },
}

#[derive(Args, Clone)]
pub struct PsArgs {
    /// Do not print column headers.
    #[arg(long = "no-header", action = ArgAction::SetFalse)]
    pub header: bool,

    /// Print a non-prettified timestamp.
    #[arg(long)]
    pub timestamp: bool,

    /// Output format; CSV or TUI (Text-based user interface).
    #[arg(long, value_enum, default_value_t = Format::Tui)]
    pub format: Format,
}

#[derive(clap::ValueEnum, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Tui,
}

#[derive(Args)]
pub struct DevicesArgs {
    /// Do not perform clean up.
    #[arg(long = "no-cleanup", action = ArgAction::SetFalse)]
    pub cleanup: bool,

    /// Reset previous state.
    #[arg(long)]
    pub reset: bool,

    #[command(subcommand)]
    pub command: Option<DevicesCommand>,
}

#[derive(Subcommand)]
pub enum DevicesCommand {
    /// Attach devices to an environment.
    Attach {
        /// Environment identifier.
        #[arg(long)]
        eid: String,
        /// Amount of devices to attach.
        #[arg(long, conflicts_with = "index")]
        count: Option<u32>,
        /// Device index to attach.
        #[arg(long)]
        index: Option<u32>,
        /// Use unavailable devices if needed.
        #[arg(short = 'o', long = "over-subscribe")]
        allow_over_subscription: bool,
    },
    /// Detach devices from an environment.
    Detach {
        /// Environment identifier.
        #[arg(long)]
        eid: String,
        /// Device index to detach.
        #[arg(long)]
        index: Option<u32>,
    },
    /// Print the indices of devices attached to an environment.
    Find {
        /// Environment identifier.
        #[arg(long)]
        eid: String,
    },
    /// Print information about devices.
    Ps(PsArgs),
    /// Query devices or a specific one.
    Query {
        /// Device index.
        #[arg(long)]
        index: Option<u32>,
        /// Field names to print, comma-joined per device.
        #[arg(long = "query", visible_alias = "queries", num_args = 1.., required = true)]
        queries: Vec<String>,
    },
}

fn max_devices_for_user(value: &str) -> Result<(String, u32), String> {
    let (username, maximum) = value
        .split_once('=')
        .ok_or_else(|| format!("not a valid spec: {value}"))?;

    let maximum = maximum
        .parse()
        .map_err(|_| format!("not a valid spec: {value}"))?;

    Ok((username.to_string(), maximum))
}

#[derive(Args)]
pub struct EnforceArgs {
    /// Interval in seconds between enforcement cycles; 0 means run once.
    #[arg(long, default_value_t = 10)]
    pub interval: u64,

    /// Terminate processes that are not running in a GPU environment.
    #[arg(long)]
    pub non_env_processes: bool,

    /// Do not enforce environment attached devices.
    #[arg(long = "no-env-devices", action = ArgAction::SetFalse)]
    pub env_devices: bool,

    /// Do not enforce environment memory capacity.
    #[arg(long = "no-env-memory", action = ArgAction::SetFalse)]
    pub env_memory: bool,

    /// Maximum allowed attached devices for each user.
    #[arg(long)]
    pub max_devices_per_user: Option<u32>,

    /// Per-user specification of maximum allowed attached devices.
    #[arg(long, value_name = "username=maximum", value_parser = max_devices_for_user, num_args = 1..)]
    pub max_devices_for_user: Vec<(String, u32)>,
}

#[derive(Args)]
pub struct LockArgs {
    /// Command to run under the device lock.
    #[arg(trailing_var_arg = true)]
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct MonitorArgs {
    /// Port for the Prometheus exporter to listen on.
    #[arg(short, long, default_value_t = 8000)]
    pub port: u16,

    /// Interval in seconds between collections.
    #[arg(short, long, default_value_t = 10)]
    pub interval: u64,
}

#[derive(Args)]
pub struct UsageArgs {
    #[command(subcommand)]
    pub command: UsageCommand,
}

#[derive(Subcommand)]
pub enum UsageCommand {
    /// Take a snapshot of GPU usage.
    Snapshot {
        /// Take a snapshot of specific information.
        #[arg(long = "type", value_enum)]
        type_: Option<SnapshotType>,
    },
    /// Execute the report passed in stdin.
    Execute,
}

#[derive(clap::ValueEnum, Clone, Copy)]
pub enum SnapshotType {
    Devices,
    Envs,
    Processes,
}

#[derive(Args)]
pub struct LlmArgs {
    #[command(subcommand)]
    pub command: LlmCommand,
}

#[derive(Subcommand)]
pub enum LlmCommand {
    /// Run an LLM server in a newly created environment.
    Serve {
        model: String,
        /// Hostname to listen on.
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on.
        #[arg(long, default_value_t = 11434)]
        port: u16,
        /// Environment device count.
        #[arg(long)]
        gpus: Option<u32>,
        /// Environment device memory capacity (e.g. 4g).
        #[arg(long)]
        gpu_memory: Option<String>,
    },
    /// Attach to a running LLM.
    Attach { model: String },
    /// Print information about running LLMs.
    Ps(PsArgs),
}

#[derive(Args)]
pub struct RemoteArgs {
    /// Comma-separated hostnames or IP addresses.
    #[arg(short = 'H', long = "host", conflicts_with = "hostfile")]
    pub hostnames: Option<String>,

    /// A file containing one hostname or IP address per line.
    #[arg(long)]
    pub hostfile: Option<String>,

    /// SSH connection timeout.
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Exit on SSH error to one or more hosts.
    #[arg(short = 'e', long = "exit-on-error")]
    pub throw_on_error: bool,

    /// Ignore SSH errors.
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: RemoteCommand,
}

#[derive(Subcommand)]
pub enum RemoteCommand {
    /// Activate an environment on a host with enough available resources.
    Activate {
        /// Environment name.
        #[arg(long)]
        name: Option<String>,
        /// Environment device count.
        #[arg(long)]
        gpus: Option<u32>,
        /// Don't change the shell prompt.
        #[arg(long = "no-prompt", action = ArgAction::SetFalse)]
        prompt: bool,
    },
    /// Print information about devices on multiple hosts.
    Devices {
        #[command(flatten)]
        ps: PsArgs,
        /// Do not print summary.
        #[arg(long = "no-summary", action = ArgAction::SetFalse)]
        summary: bool,
    },
    /// Enforce GPU usage on multiple hosts.
    Enforce(EnforceArgs),
    /// Print information about active environments on multiple hosts.
    Envs {
        #[command(flatten)]
        ps: PsArgs,
        /// Do not print summary.
        #[arg(long = "no-summary", action = ArgAction::SetFalse)]
        summary: bool,
    },
    /// Monitor multiple hosts using a Prometheus exporter.
    Monitor(MonitorArgs),
    /// Query environments with a given name across hosts.
    Query {
        /// Environment name.
        #[arg(long)]
        name: String,
        /// Field names to print, comma-joined per environment.
        #[arg(long = "query", visible_alias = "queries", num_args = 1.., required = true)]
        queries: Vec<String>,
    },
}

#[derive(Args)]
pub struct ShellArgs {
    /// Print the shell initialization script.
    #[arg(long)]
    pub init: bool,

    /// Print the shell deinitialization script.
    #[arg(long)]
    pub deinit: bool,

    /// Print a sanity message.
    #[arg(long)]
    pub ok: bool,

    /// Print the script refreshing the device indices variables.
    #[arg(long)]
    pub reattach: bool,

    /// Print the script refreshing the configuration variables.
    #[arg(long)]
    pub reconfigure: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;

        Cli::command().debug_assert();
    }

    #[test]
    fn test_activate_defaults() {
        let cli = Cli::try_parse_from(["genv", "activate", "--shell", "42"]).unwrap();

        let Commands::Activate(args) = cli.command else {
            panic!("expected activate");
        };

        assert_eq!(args.shell, Some(42));
        assert!(args.prompt);
        assert!(args.attach);
        assert!(!args.allow_over_subscription);
    }

    #[test]
    fn test_enforce_flag_pairs() {
        let cli = Cli::try_parse_from([
            "genv",
            "enforce",
            "--interval",
            "0",
            "--non-env-processes",
            "--no-env-memory",
            "--max-devices-for-user",
            "raz=2",
            "paul=4",
        ])
        .unwrap();

        let Commands::Enforce(args) = cli.command else {
            panic!("expected enforce");
        };

        assert_eq!(args.interval, 0);
        assert!(args.non_env_processes);
        assert!(args.env_devices);
        assert!(!args.env_memory);
        assert_eq!(
            args.max_devices_for_user,
            vec![("raz".to_string(), 2), ("paul".to_string(), 4)]
        );
    }

    #[test]
    fn test_attach_modes_conflict() {
        assert!(Cli::try_parse_from(["genv", "attach", "--count", "2", "--index", "0"]).is_err());
    }

    #[test]
    fn test_max_devices_for_user_parser() {
        assert_eq!(
            max_devices_for_user("raz=2").unwrap(),
            ("raz".to_string(), 2)
        );
        assert!(max_devices_for_user("raz").is_err());
        assert!(max_devices_for_user("raz=lots").is_err());
    }
}
