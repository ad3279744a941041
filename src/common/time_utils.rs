// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Return the current UNIX timestamp in seconds.
pub fn current_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// UTC calendar fields used as model features.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalendarFields {
    pub hour: u32,
    /// Monday = 0.
    pub weekday: u32,
    /// 1-12.
    pub month: u32,
}

pub fn calendar_fields(unix_secs: u64) -> CalendarFields {
    let ts = i64::try_from(unix_secs).unwrap_or(i64::MAX);
    let dt: DateTime<Utc> = DateTime::from_timestamp(ts, 0).unwrap_or_default();
    CalendarFields {
        hour: dt.hour(),
        weekday: dt.weekday().num_days_from_monday(),
        month: dt.month(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_fields_follow_utc() {
        // 2024-03-15T13:45:00Z, a Friday.
        let fields = calendar_fields(1_710_510_300);
        assert_eq!(
            fields,
            CalendarFields {
                hour: 13,
                weekday: 4,
                month: 3
            }
        );
    }

    #[test]
    fn epoch_is_thursday_january() {
        let fields = calendar_fields(0);
        assert_eq!(fields.weekday, 3);
        assert_eq!(fields.month, 1);
        assert_eq!(fields.hour, 0);
    }
}
