use std::time::SystemTime;

use time::{
    OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339, macros::format_description,
};

pub mod activity;
pub mod health;
pub mod lifecycle;
pub mod results;
pub mod validation;
pub mod ws;

/// Render a timestamp as RFC 3339 in the wire offset.
pub fn format_system_time(time: SystemTime, offset: UtcOffset) -> String {
    OffsetDateTime::from(time)
        .to_offset(offset)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Render a timestamp as `YYYY-MM-DD HH:MM:SS` in the wire offset.
pub fn format_export_time(time: SystemTime, offset: UtcOffset) -> String {
    OffsetDateTime::from(time)
        .to_offset(offset)
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::macros::offset;

    use super::*;

    #[test]
    fn formats_in_beijing_time() {
        // 2024-03-01T02:30:05Z
        let instant = SystemTime::UNIX_EPOCH + Duration::from_secs(1_709_260_205);
        assert_eq!(
            format_system_time(instant, offset!(+8)),
            "2024-03-01T10:30:05+08:00"
        );
        assert_eq!(
            format_export_time(instant, offset!(+8)),
            "2024-03-01 10:30:05"
        );
        assert_eq!(
            format_export_time(instant, UtcOffset::UTC),
            "2024-03-01 02:30:05"
        );
    }
}
