/// Run summary log.
///
/// Each run that gets past the daylight gate appends one line:
///
/// ```text
/// 2024-05-01 12:30:00.123456: ONLINE - OK
/// ```

use crate::broker::PublishStatus;
use crate::monitor::Verdict;
use chrono::{DateTime, TimeZone};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default log location, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "bw-check.log";

#[derive(Debug, thiserror::Error)]
#[error("failed to append to {}: {source}", path.display())]
pub struct RunLogError {
    path: PathBuf,
    source: std::io::Error,
}

/// `<timestamp>: <ONLINE|OFFLINE> - <publish status>`
pub fn summary_line<Tz: TimeZone>(at: &DateTime<Tz>, verdict: Verdict, status: PublishStatus) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}: {} - {}", at.format("%Y-%m-%d %H:%M:%S%.6f"), verdict, status)
}

/// Appends `line` to the log at `path`, creating the file if needed.
pub fn append(path: &Path, line: &str) -> Result<(), RunLogError> {
    let to_err = |source| RunLogError {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_err)?;
    writeln!(file, "{}", line).map_err(to_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Local};
    use std::fs;

    #[test]
    fn test_summary_line_format() {
        let at = FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 1, 12, 30, 0)
            .unwrap();
        assert_eq!(
            summary_line(&at, Verdict::Online, PublishStatus::Ok),
            "2024-05-01 12:30:00.000000: ONLINE - OK"
        );
        assert_eq!(
            summary_line(&at, Verdict::Offline, PublishStatus::BrokerError),
            "2024-05-01 12:30:00.000000: OFFLINE - MQTT ERROR"
        );
    }

    #[test]
    fn test_append_adds_one_line_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bw-check.log");

        let now = Local::now();
        append(&path, &summary_line(&now, Verdict::Online, PublishStatus::Ok)).unwrap();
        append(&path, &summary_line(&now, Verdict::Offline, PublishStatus::Ok)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(": ONLINE - OK"));
        assert!(lines[1].ends_with(": OFFLINE - OK"));
    }

    #[test]
    fn test_append_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("bw-check.log");
        let result = append(&path, "line");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("no-such-dir"));
    }
}
