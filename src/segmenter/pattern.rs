use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};

/// strftime layout of segment file names. Names sort chronologically.
pub const TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Output path template handed to the muxer. The engine expands the time
/// fields with the wall-clock time at which each segment starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPattern {
    dir: PathBuf,
    extension: String,
}

impl OutputPattern {
    pub fn new(dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// The template itself, e.g. `/data/segments/%Y-%m-%d_%H-%M-%S.mp4`.
    pub fn template(&self) -> String {
        self.dir
            .join(format!("{}.{}", TIME_FORMAT, self.extension))
            .to_string_lossy()
            .into_owned()
    }

    /// Concrete file path for a segment started at `time`.
    pub fn render<Tz>(&self, time: &DateTime<Tz>) -> PathBuf
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        self.dir
            .join(format!("{}.{}", time.format(TIME_FORMAT), self.extension))
    }

    /// Recovers the start time from a file name produced by this pattern.
    #[cfg(test)]
    pub(crate) fn parse_time(&self, file_name: &str) -> Option<chrono::NaiveDateTime> {
        let stem = file_name.strip_suffix(&format!(".{}", self.extension))?;
        chrono::NaiveDateTime::parse_from_str(stem, TIME_FORMAT).ok()
    }
}
