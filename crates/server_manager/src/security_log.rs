//! Append-only security event log.

use crate::types::PlayerId;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Writes `<timestamp> | <event> | Player: <id>` lines to a file.
///
/// Appends are serialized so concurrent callers never interleave partial lines.
#[derive(Debug)]
pub struct SecurityLog {
    path: Mutex<PathBuf>,
}

impl SecurityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Mutex::new(path.into()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.path.lock().clone()
    }

    /// Points the log at a new file; following writes go there.
    pub fn set_path(&self, path: impl Into<PathBuf>) {
        *self.path.lock() = path.into();
    }

    /// Appends one event line, creating the file and its directories if needed.
    pub fn record(&self, event: &str, player_id: &PlayerId) -> io::Result<()> {
        let line = format_entry(event, player_id);
        let path = self.path.lock();
        append_line(&path, &line)
    }
}

/// Formats one entry. Control characters in either field are escaped so an
/// entry always occupies exactly one line.
pub fn format_entry(event: &str, player_id: &PlayerId) -> String {
    format!(
        "{} | {} | Player: {}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        escape_field(event),
        escape_field(player_id.as_str())
    )
}

fn escape_field(field: &str) -> Cow<'_, str> {
    if !field.chars().any(char::is_control) {
        return Cow::Borrowed(field);
    }
    let mut escaped = String::with_capacity(field.len() + 8);
    for c in field.chars() {
        if c.is_control() {
            escaped.extend(c.escape_default());
        } else {
            escaped.push(c);
        }
    }
    Cow::Owned(escaped)
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entries_are_appended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("security.log");
        let log = SecurityLog::new(&path);

        log.record("ExpiredToken", &PlayerId::from("p1")).unwrap();
        log.record("RateLimitExceeded", &PlayerId::from("p2")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" | ExpiredToken | Player: p1"));
        assert!(lines[1].ends_with(" | RateLimitExceeded | Player: p2"));
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_entry_timestamp_is_utc() {
        let entry = format_entry("MalformedToken", &PlayerId::from("abc"));
        let timestamp = entry.split(" | ").next().unwrap();

        assert!(timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[test]
    fn test_control_characters_cannot_split_an_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("security.log");
        let log = SecurityLog::new(&path);
        let forged = PlayerId::from("p1\n2026-01-01T00:00:00Z | AdminGranted | Player: root");

        log.record("InvalidToken\r", &forged).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains(" | InvalidToken\\r | Player: p1\\n2026-01-01T00:00:00Z"));
    }
}
