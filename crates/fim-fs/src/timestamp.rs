//! Second-precision timestamps shared by entries, logs and storage

use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime};

/// Canonical display and storage format.
pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Compact format used in backup snapshot names.
pub const COMPACT_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn now() -> String {
    Local::now().format(FORMAT).to_string()
}

pub fn now_compact() -> String {
    Local::now().format(COMPACT_FORMAT).to_string()
}

pub fn format_system_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format(FORMAT).to_string()
}

/// Parse a timestamp produced by [`now`] or [`format_system_time`].
pub fn parse(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, FORMAT).ok()
}

/// The canonical timestamp for `hours` before now.
pub fn hours_ago(hours: u32) -> String {
    (Local::now() - chrono::Duration::hours(i64::from(hours)))
        .format(FORMAT)
        .to_string()
}
