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

//! Advisory file locks for cross-process, cross-user coordination.
//!
//! Lock files are created mode 0666 under umask 0 (and their parent
//! directories mode 0777) so that CLI invocations running as different uids
//! can share them. The kernel releases the flock when the owning process
//! dies, whether or not it unlocked cleanly.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

use crate::error::Result;

/// Scoped umask override. Restores the previous umask on drop.
pub struct Umask {
    previous: libc::mode_t,
}

impl Umask {
    pub fn set(value: libc::mode_t) -> Self {
        let previous = unsafe { libc::umask(value) };

        Self { previous }
    }
}

impl Drop for Umask {
    fn drop(&mut self) {
        unsafe {
            libc::umask(self.previous);
        }
    }
}

/// An exclusive advisory lock on a file.
///
/// Acquiring blocks until the lock is granted. The lock file and its parent
/// directories are created if missing. Unlocks and closes on drop.
pub struct Flock {
    fd: libc::c_int,
}

impl Flock {
    pub fn acquire(path: &Path) -> Result<Self> {
        let _umask = Umask::set(0);

        if let Some(parent) = path.parent() {
            std::fs::DirBuilder::new()
                .recursive(true)
                .mode(0o777)
                .create(parent)?;
        }

        let cpath = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;

        let fd = unsafe {
            libc::open(
                cpath.as_ptr(),
                libc::O_RDWR | libc::O_CREAT | libc::O_TRUNC,
                0o666 as libc::c_uint,
            )
        };

        if fd < 0 {
            return Err(io::Error::last_os_error().into());
        }

        loop {
            let ret = unsafe { libc::flock(fd, libc::LOCK_EX) };

            if ret == 0 {
                return Ok(Self { fd });
            }

            let err = io::Error::last_os_error();

            if err.raw_os_error() != Some(libc::EINTR) {
                unsafe {
                    libc::close(fd);
                }

                return Err(err.into());
            }
        }
    }
}

impl Drop for Flock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.fd, libc::LOCK_UN);
            libc::close(self.fd);
        }
    }
}
