use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::TranscriptError;

pub const EXPORT_DIR: &str = "conversations";

#[must_use]
pub fn export_root(base: &Path) -> PathBuf {
    base.join(EXPORT_DIR)
}

/// `chat_{YYYYmmdd_HHMMSS}.md`
pub fn export_file_name(at: OffsetDateTime) -> Result<String, TranscriptError> {
    let stamp = at
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .map_err(TranscriptError::ClockFormat)?;
    Ok(format!("chat_{stamp}.md"))
}

pub(crate) fn header_timestamp(at: OffsetDateTime) -> Result<String, TranscriptError> {
    at.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .map_err(TranscriptError::ClockFormat)
}

/// Local wall-clock time, or UTC when the local offset cannot be determined.
pub(crate) fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
