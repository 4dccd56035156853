//! Durable log of received records.

pub mod sqlite;

pub use sqlite::SqliteRecordStore;

/// One received text or image event. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: i64,
    pub text: Option<String>,
    pub image_path: Option<String>,
    pub timestamp: String,
}

/// Local time at second precision, as stored in `records.timestamp`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp<Tz>(now: &chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    now.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_has_second_precision() {
        let at = chrono::Utc
            .with_ymd_and_hms(2024, 1, 1, 10, 0, 0)
            .single()
            .unwrap();
        assert_eq!(format_timestamp(&at), "2024-01-01 10:00:00");
    }
}
