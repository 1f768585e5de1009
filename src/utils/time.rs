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

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

/// The timestamp format used in state files and CLI output.
pub const DATETIME_FMT: &str = "%d/%m/%Y %H:%M:%S";

/// Returns the current local time formatted with [`DATETIME_FMT`].
pub fn now() -> String {
    Local::now().format(DATETIME_FMT).to_string()
}

/// Returns a human readable string describing the amount of time passed
/// since the given [`DATETIME_FMT`] timestamp (e.g. "3 hours ago").
///
/// The timestamp itself is returned when it cannot be parsed.
pub fn time_since(creation: &str) -> String {
    let Ok(naive) = NaiveDateTime::parse_from_str(creation, DATETIME_FMT) else {
        return creation.to_string();
    };

    let Some(then): Option<DateTime<Local>> = Local.from_local_datetime(&naive).earliest() else {
        return creation.to_string();
    };

    since(Local::now().signed_duration_since(then).num_seconds().max(0) as u64)
}

fn since(seconds: u64) -> String {
    let mut value = seconds;
    let mut unit = "second";

    for (amount, next_unit) in [(60, "minute"), (60, "hour"), (24, "day"), (7, "week")] {
        if value < amount {
            break;
        }

        value /= amount;
        unit = next_unit;
    }

    if value > 1 {
        format!("{value} {unit}s ago")
    } else {
        format!("{value} {unit} ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_since_units() {
        assert_eq!(since(0), "0 second ago");
        assert_eq!(since(1), "1 second ago");
        assert_eq!(since(59), "59 seconds ago");
        assert_eq!(since(60), "1 minute ago");
        assert_eq!(since(150), "2 minutes ago");
        assert_eq!(since(3_600), "1 hour ago");
        assert_eq!(since(86_400), "1 day ago");
        assert_eq!(since(7 * 86_400), "1 week ago");
        assert_eq!(since(21 * 86_400), "3 weeks ago");
    }

    #[test]
    fn test_time_since_falls_back_on_garbage() {
        assert_eq!(time_since("not-a-timestamp"), "not-a-timestamp");
    }

    #[test]
    fn test_now_round_trips() {
        let stamp = now();
        assert!(NaiveDateTime::parse_from_str(&stamp, DATETIME_FMT).is_ok());
    }
}
