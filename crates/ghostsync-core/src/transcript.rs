//! Per-session wire transcripts.
//!
//! When a transcript directory is configured, every frame a session receives
//! or sends is appended to `{dir}/{session_id}.log` with a UTC timestamp.
//! Transcript I/O errors are swallowed; they never affect the session.

use chrono::{SecondsFormat, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Direction tag written in front of each transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Frame received from the remote peer.
    In,
    /// Frame sent to the remote peer.
    Out,
    /// Lifecycle event (bind, close, errors).
    Event,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
            Direction::Event => "EVENT",
        }
    }
}

/// Append-only transcript file. A disabled transcript ignores every write.
#[derive(Debug)]
pub struct Transcript {
    file: Option<File>,
}

impl Transcript {
    /// Open (or create) `{dir}/{session_id}.log`. Falls back to a disabled
    /// transcript when `dir` is `None` or the file cannot be opened.
    pub fn open(dir: Option<&Path>, session_id: &str) -> Self {
        let file = dir.and_then(|dir| {
            std::fs::create_dir_all(dir).ok()?;
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(format!("{}.log", session_id)))
                .map_err(|e| log::warn!("Failed to open transcript for {}: {}", session_id, e))
                .ok()
        });
        Self { file }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    pub fn record(&mut self, direction: Direction, data: &str) {
        if let Some(file) = self.file.as_mut() {
            let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            let _ = writeln!(file, "[{}] {}: {}", ts, direction.as_str(), data);
            let _ = file.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_file_named_after_session() {
        let dir = tempdir().unwrap();
        let transcript = Transcript::open(Some(dir.path()), "abc");
        assert!(transcript.is_enabled());
        assert!(dir.path().join("abc.log").exists());
    }

    #[test]
    fn open_without_dir_is_disabled() {
        let mut transcript = Transcript::open(None, "abc");
        assert!(!transcript.is_enabled());
        // Should not panic
        transcript.record(Direction::In, "ignored");
    }

    #[test]
    fn record_appends_timestamped_lines() {
        let dir = tempdir().unwrap();
        let mut transcript = Transcript::open(Some(dir.path()), "s1");
        transcript.record(Direction::In, r#"{"text":"hi"}"#);
        transcript.record(Direction::Out, "bye");

        let contents = std::fs::read_to_string(dir.path().join("s1.log")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].contains("Z] IN: {\"text\":\"hi\"}"));
        assert!(lines[1].ends_with("OUT: bye"));
    }

    #[test]
    fn creates_missing_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let transcript = Transcript::open(Some(&nested), "s2");
        assert!(transcript.is_enabled());
        assert!(nested.join("s2.log").exists());
    }
}
