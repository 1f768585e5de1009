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

use std::env;
use std::path::PathBuf;

/// The default state directory when `GENV_TMPDIR` is not set.
pub const DEFAULT_TMPDIR: &str = "/var/tmp/genv";

/// Returns the genv temporary directory.
///
/// State files, the global lock and the per-device locks all live here. The
/// directory is shared between every user of the machine.
pub fn temp_dir() -> PathBuf {
    match env::var_os("GENV_TMPDIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_TMPDIR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tmpdir() {
        assert_eq!(DEFAULT_TMPDIR, "/var/tmp/genv");
    }
}
