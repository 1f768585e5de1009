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

//! File-backed state with atomic read-modify-write.
//!
//! Each state file is guarded by its own advisory lock (`<file>.lock`), and a
//! single global lock (`genv.lock`) serializes transactions that span more
//! than one state file. Nesting order is always global lock first, then
//! per-file locks.
//!
//! Mutations only reach disk through [`StateGuard::commit`]; a panic or an
//! early error return drops the guard without committing, so a crashed
//! command leaves the previous on-disk state behind and the kernel releases
//! its locks.

pub mod flock;

use std::fs;
use std::ops::{Deref, DerefMut};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

pub use flock::{Flock, Umask};

/// Returns the path of the lock file guarding the given state file.
fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");

    PathBuf::from(name)
}

/// Locks the global lock.
///
/// Must be held for the whole span of any transaction touching more than one
/// state file.
pub fn global_lock(root: &Path) -> Result<Flock> {
    Flock::acquire(&root.join("genv.lock"))
}

/// A loaded state file, holding its per-file lock.
///
/// Dereferences to the state value. Dropping the guard releases the lock
/// without writing; call [`StateGuard::commit`] to persist mutations.
pub struct StateGuard<T> {
    value: T,
    path: PathBuf,
    _lock: Flock,
}

impl<T> Deref for StateGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for StateGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> StateGuard<T> {
    /// Consumes the guard and returns the value, releasing the lock without
    /// writing. For read-only access.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Serialize> StateGuard<T> {
    /// Serializes the state back to disk (mode 0666) and releases the lock.
    pub fn commit(self) -> Result<()> {
        let _umask = Umask::set(0);

        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o666)
            .open(&self.path)?;

        serde_json::to_writer_pretty(file, &self.value)?;

        Ok(())
    }
}

/// Loads a state file under its advisory lock.
///
/// * `create` builds a fresh value (by probing the system) when the file does
///   not exist or `reset` is set.
/// * `convert` decodes the raw JSON document, migrating legacy on-disk shapes.
/// * `clean` prunes stale entries after loading, when `cleanup` is set.
pub fn with_state<T>(
    path: &Path,
    cleanup: bool,
    reset: bool,
    create: impl FnOnce() -> Result<T>,
    convert: impl FnOnce(Value) -> Result<T>,
    clean: impl FnOnce(&mut T) -> Result<()>,
) -> Result<StateGuard<T>> {
    let lock = Flock::acquire(&lock_path(path))?;

    let value = if path.exists() && !reset {
        let data = fs::read(path)?;

        let raw: Value = serde_json::from_slice(&data)
            .map_err(|_| Error::CorruptState(path.display().to_string()))?;

        let mut value =
            convert(raw).map_err(|_| Error::CorruptState(path.display().to_string()))?;

        if cleanup {
            clean(&mut value)?;
        }

        value
    } else {
        create()?
    };

    Ok(StateGuard {
        value,
        path: path.to_path_buf(),
        _lock: lock,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Counter {
        count: u32,
    }

    fn open(path: &Path, cleanup: bool, reset: bool) -> Result<StateGuard<Counter>> {
        with_state(
            path,
            cleanup,
            reset,
            || Ok(Counter { count: 0 }),
            |raw| Ok(serde_json::from_value(raw)?),
            |_| Ok(()),
        )
    }

    #[test]
    fn test_create_then_commit_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");

        {
            let mut guard = open(&path, true, false).unwrap();
            assert_eq!(guard.count, 0);
            guard.count = 7;
            guard.commit().unwrap();
        }

        let guard = open(&path, true, false).unwrap();
        assert_eq!(guard.count, 7);
    }

    #[test]
    fn test_drop_without_commit_leaves_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");

        {
            let mut guard = open(&path, true, false).unwrap();
            guard.count = 1;
            guard.commit().unwrap();
        }

        {
            let mut guard = open(&path, true, false).unwrap();
            guard.count = 99;
            // dropped without commit
        }

        let guard = open(&path, true, false).unwrap();
        assert_eq!(guard.count, 1);
    }

    #[test]
    fn test_reset_rebuilds_from_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");

        {
            let mut guard = open(&path, true, false).unwrap();
            guard.count = 5;
            guard.commit().unwrap();
        }

        let guard = open(&path, true, true).unwrap();
        assert_eq!(guard.count, 0);
    }

    #[test]
    fn test_corrupt_state_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");

        fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(
            open(&path, true, false),
            Err(Error::CorruptState(_))
        ));

        // but reset treats it as no state
        let guard = open(&path, true, true).unwrap();
        assert_eq!(guard.count, 0);
    }

    #[test]
    fn test_lock_file_is_separate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");

        let guard = open(&path, true, false).unwrap();
        drop(guard);

        assert!(dir.path().join("counter.json.lock").exists());
        assert!(!path.exists()); // never committed
    }
}
