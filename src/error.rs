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

//! Unified error types for the genv library.
//!
//! Every runtime failure surfaces as a single sentence naming the offending
//! identifier; the CLI prints it to stderr and exits non-zero.

use thiserror::Error;

/// The main error type for genv operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller is not running inside an active environment.
    #[error("Not running in an active environment")]
    NotActive,

    /// The caller is already running inside an active environment.
    #[error("Already running in an active environment")]
    AlreadyActive,

    /// No environment with the given identifier exists.
    #[error("Environment {0} was not found")]
    EnvironmentNotFound(String),

    /// The device cannot satisfy the requested memory amount, or does not exist.
    #[error("Device {0} is not available")]
    DeviceNotAvailable(u32),

    /// Fewer devices are available than requested.
    #[error("Requested {requested} devices but only {available} are available")]
    InsufficientDevices { requested: usize, available: usize },

    /// Mutually exclusive attach modes were combined.
    #[error("Cannot use both a device index and a device count")]
    ConflictingModes,

    /// A memory string could not be parsed (expected e.g. "4g", "512mi").
    #[error("Invalid memory specification ({0})")]
    InvalidMemory(String),

    /// Functionality that relies on the Linux proc filesystem.
    #[error("{0} is not supported on this platform")]
    PlatformUnsupported(&'static str),

    /// Probing `nvidia-smi` failed.
    #[error("Failed running nvidia-smi ({0})")]
    Probe(String),

    /// An SSH command failed on a remote host.
    #[error("Failed running SSH command on {hostname} ({message})")]
    Ssh { hostname: String, message: String },

    /// No remote host has enough detached devices.
    #[error("Cannot find a host with enough available resources")]
    HostNotFound,

    /// A state file exists but could not be decoded.
    #[error("State file {0} is corrupt; pass --reset to rebuild it")]
    CorruptState(String),

    /// The shell helper functions are not loaded.
    #[error(
        "Your shell is not properly initialized at the moment.\n\
         Run the following command to initialize it.\n\
         You should also add it to your ~/.bashrc or any equivalent file.\n\
         \n    eval \"$(genv shell --init)\""
    )]
    ShellNotInitialized,

    /// The `ollama` binary is not on PATH.
    #[error(
        "Could not find ollama.\n\
         You should install it if it's not already installed.\n\
         Otherwise, $PATH is probably not configured properly."
    )]
    OllamaNotFound,

    /// No running LLM environment matches the model name.
    #[error("Could not find LLM model '{0}'")]
    LlmNotFound(String),

    /// The LLM environment exposes no listen port.
    #[error("Could not find port of LLM model '{0}'")]
    LlmPortNotFound(String),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A JSON document could not be encoded or decoded.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for genv operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::EnvironmentNotFound("1337".to_string());
        assert_eq!(err.to_string(), "Environment 1337 was not found");

        let err = Error::DeviceNotAvailable(2);
        assert_eq!(err.to_string(), "Device 2 is not available");

        let err = Error::InsufficientDevices {
            requested: 3,
            available: 1,
        };
        assert_eq!(
            err.to_string(),
            "Requested 3 devices but only 1 are available"
        );

        let err = Error::Ssh {
            hostname: "gpu-17".to_string(),
            message: "Connection timed out".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed running SSH command on gpu-17 (Connection timed out)"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
