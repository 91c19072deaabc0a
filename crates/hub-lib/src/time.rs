//! Fixed-offset wall clock used when rendering timestamps

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Display format for every timestamp leaving the hub
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Offset of Asia/Kuala_Lumpur, which observes no daylight saving
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 8;

/// The local zone readings are rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalZone {
    offset: FixedOffset,
}

impl Default for LocalZone {
    fn default() -> Self {
        Self::from_hours(DEFAULT_UTC_OFFSET_HOURS).unwrap_or_else(Self::utc)
    }
}

impl LocalZone {
    /// Build a zone from a whole-hour UTC offset, `None` if out of range
    pub fn from_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours.checked_mul(3600)?).map(|offset| Self { offset })
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Render an instant as `YYYY-MM-DD HH:MM:SS` in this zone
    pub fn format(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.offset)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }
}
