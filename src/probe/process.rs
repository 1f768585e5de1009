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

//! Process probing and control.
//!
//! Environment recovery reads `/proc/<pid>/environ` and therefore only works
//! on Linux; other targets surface [`Error::PlatformUnsupported`] and
//! enforcement degrades accordingly.

use std::process::Stdio;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// The environment variable carrying the environment identifier of a process.
pub const ENVIRONMENT_ID_VAR: &str = "GENV_ENVIRONMENT_ID";

/// Returns the environment variables of the process with the given pid.
#[cfg(target_os = "linux")]
pub fn environ(pid: u32) -> Result<std::collections::HashMap<String, String>> {
    let process = procfs::process::Process::new(pid as i32).map_err(proc_error)?;

    let environ = process.environ().map_err(proc_error)?;

    Ok(environ
        .into_iter()
        .map(|(variable, value)| {
            (
                variable.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        })
        .collect())
}

#[cfg(not(target_os = "linux"))]
pub fn environ(_pid: u32) -> Result<std::collections::HashMap<String, String>> {
    Err(Error::PlatformUnsupported("Process environment recovery"))
}

#[cfg(target_os = "linux")]
fn proc_error(err: procfs::ProcError) -> Error {
    use std::io;

    match err {
        procfs::ProcError::NotFound(_) => io::Error::from(io::ErrorKind::NotFound).into(),
        procfs::ProcError::PermissionDenied(_) => {
            io::Error::from(io::ErrorKind::PermissionDenied).into()
        }
        other => io::Error::new(io::ErrorKind::Other, other.to_string()).into(),
    }
}

/// Returns the environment identifier of the process with the given pid.
///
/// Returns `None` if the process is not running in an environment or if it
/// could not be queried; the failure reasons are logged and are non-fatal.
pub fn eid(pid: u32) -> Option<String> {
    match environ(pid) {
        Ok(environ) => environ.get(ENVIRONMENT_ID_VAR).cloned(),
        Err(Error::Io(err)) if err.kind() == std::io::ErrorKind::PermissionDenied => {
            warn!("Not enough permissions to query environment of process {pid}");
            None
        }
        Err(Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!("Process {pid} already terminated");
            None
        }
        Err(err) => {
            debug!("Failed querying environment of process {pid} ({err})");
            None
        }
    }
}

/// Returns whether a process with the given pid is alive.
///
/// Uses a zero-signal send; "operation not permitted" means the process
/// exists but belongs to another user, so it counts as alive.
pub fn poll_pid(pid: u32) -> bool {
    // pids above i32::MAX cannot exist; the cast below would otherwise
    // target a process group
    if pid > i32::MAX as u32 {
        return false;
    }

    let ret = unsafe { libc::kill(pid as libc::pid_t, 0) };

    if ret == 0 {
        return true;
    }

    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Returns whether a Jupyter kernel with the given identifier is alive, by
/// looking for its connection file in the Jupyter runtime directory.
pub fn poll_jupyter_kernel(kernel_id: &str) -> bool {
    std::process::Command::new("sh")
        .arg("-c")
        .arg(format!(
            "ls $(jupyter --runtime-dir)/kernel-{kernel_id}.json"
        ))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Terminates the process with the given pid by sending it SIGTERM.
///
/// Does nothing when `GENV_TERMINATE_PROCESSES=0` (dry-run mode). The caller
/// distinguishes vanished processes (ESRCH) from permission failures (EPERM)
/// through the returned I/O error.
pub fn terminate(pid: u32) -> std::io::Result<()> {
    if std::env::var("GENV_TERMINATE_PROCESSES").as_deref() == Ok("0") {
        return Ok(());
    }

    if pid > i32::MAX as u32 {
        return Err(std::io::Error::from_raw_os_error(libc::ESRCH));
    }

    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };

    if ret == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Returns the TCP ports the process with the given pid listens on.
#[cfg(target_os = "linux")]
pub fn listen_ports(pid: u32) -> Result<Vec<u16>> {
    use procfs::net::TcpState;
    use procfs::process::FDTarget;

    let process = procfs::process::Process::new(pid as i32).map_err(proc_error)?;

    let inodes: std::collections::HashSet<u64> = process
        .fd()
        .map_err(proc_error)?
        .filter_map(|fd| fd.ok())
        .filter_map(|fd| match fd.target {
            FDTarget::Socket(inode) => Some(inode),
            _ => None,
        })
        .collect();

    let mut ports = Vec::new();

    for entry in procfs::net::tcp()
        .into_iter()
        .flatten()
        .chain(procfs::net::tcp6().into_iter().flatten())
    {
        if entry.state == TcpState::Listen && inodes.contains(&entry.inode) {
            ports.push(entry.local_address.port());
        }
    }

    Ok(ports)
}

#[cfg(not(target_os = "linux"))]
pub fn listen_ports(_pid: u32) -> Result<Vec<u16>> {
    Err(Error::PlatformUnsupported("Listen port discovery"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_pid_self() {
        assert!(poll_pid(std::process::id()));
    }

    #[test]
    fn test_poll_pid_gone() {
        // pid_max on Linux defaults to well under 2^22
        assert!(!poll_pid(u32::MAX - 1));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_environ_self() {
        // /proc/<pid>/environ reflects the environment at exec time, so only
        // inherited variables are visible
        let environ = environ(std::process::id()).unwrap();
        assert!(environ.contains_key("PATH"));
    }

    #[test]
    fn test_eid_of_missing_process_is_none() {
        assert_eq!(eid(u32::MAX - 1), None);
    }
}
