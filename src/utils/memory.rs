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

//! Memory amount strings.
//!
//! Amounts are kept as suffixed strings at rest (state files, CLI arguments)
//! and converted to bytes only for arithmetic. Decimal suffixes (`k`, `m`,
//! `g`) multiply by 1000, binary suffixes (`ki`, `mi`, `gi`) by 1024, and an
//! unsuffixed value is taken as bytes.

use crate::error::{Error, Result};

/// Suffixes and their multipliers. Decimal suffixes are checked first; the
/// binary ones all end with `i` so the two sets cannot shadow each other.
const MULTIPLIERS: [(&str, u64); 7] = [
    ("ki", 1024),
    ("mi", 1024 * 1024),
    ("gi", 1024 * 1024 * 1024),
    ("b", 1),
    ("k", 1000),
    ("m", 1000 * 1000),
    ("g", 1000 * 1000 * 1000),
];

/// Converts a memory string to an amount of bytes.
pub fn memory_to_bytes(memory: &str) -> Result<u64> {
    let invalid = || Error::InvalidMemory(memory.to_string());

    for (unit, multiplier) in MULTIPLIERS {
        if let Some(value) = memory.strip_suffix(unit) {
            let value: u64 = value.trim().parse().map_err(|_| invalid())?;

            return Ok(value * multiplier);
        }
    }

    // the value is already in bytes if no unit was specified
    memory.trim().parse().map_err(|_| invalid())
}

/// Converts an amount of bytes to a memory string in the given unit.
pub fn bytes_to_memory(bytes: u64, unit: &str) -> String {
    let multiplier = MULTIPLIERS
        .iter()
        .find(|(u, _)| *u == unit)
        .map(|(_, m)| *m)
        .unwrap_or(1);

    format!("{}{unit}", bytes / multiplier)
}
