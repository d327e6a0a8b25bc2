//! Hourly-Rotated Log Files
//!
//! Log lines are appended to `logs/redis-YYYY-MM-DD-HH.log`; when the
//! wall-clock hour rolls over, the writer switches to a fresh file. The
//! writer is wrapped in `tracing_appender::non_blocking` by the entry
//! point, so rotation and file I/O happen on a background worker instead
//! of the thread that emits the log line.

use chrono::Local;
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// An append-only log file that rolls over every hour.
pub struct HourlyLogFile {
    dir: PathBuf,
    prefix: String,
    stamp: String,
    file: File,
}

impl HourlyLogFile {
    /// Opens the current hour's log file under `dir`, creating the
    /// directory if needed. Files are named `<prefix>-YYYY-MM-DD-HH.log`.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> io::Result<Self> {
        let dir = dir.into();
        let prefix = prefix.into();
        create_dir_all(&dir)?;

        let stamp = Self::hour_stamp();
        let file = Self::open(&dir, &prefix, &stamp)?;
        Ok(Self {
            dir,
            prefix,
            stamp,
            file,
        })
    }

    fn hour_stamp() -> String {
        Local::now().format("%Y-%m-%d-%H").to_string()
    }

    fn open(dir: &Path, prefix: &str, stamp: &str) -> io::Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(format!("{}-{}.log", prefix, stamp)))
    }
}

impl Write for HourlyLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let stamp = Self::hour_stamp();
        if stamp != self.stamp {
            self.file = Self::open(&self.dir, &self.prefix, &stamp)?;
            self.stamp = stamp;
        }
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_directory_and_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");

        let mut writer = HourlyLogFile::new(&logs, "redis").unwrap();
        writer.write_all(b"hello\n").unwrap();
        writer.flush().unwrap();

        let entries: Vec<_> = std::fs::read_dir(&logs)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries.len(), 1);

        // redis-YYYY-MM-DD-HH.log
        let name = &entries[0];
        assert!(name.starts_with("redis-"), "unexpected name {}", name);
        assert!(name.ends_with(".log"), "unexpected name {}", name);
        let stamp = name
            .strip_prefix("redis-")
            .and_then(|rest| rest.strip_suffix(".log"))
            .unwrap();
        assert_eq!(stamp.len(), "2026-08-02-14".len());
        assert!(stamp
            .chars()
            .all(|c| c.is_ascii_digit() || c == '-'));

        let content = std::fs::read_to_string(logs.join(name)).unwrap();
        assert_eq!(content, "hello\n");
    }

    #[test]
    fn test_appends_within_the_same_hour() {
        let dir = tempfile::tempdir().unwrap();

        let mut writer = HourlyLogFile::new(dir.path(), "redis").unwrap();
        writer.write_all(b"one\n").unwrap();
        drop(writer);

        let mut writer = HourlyLogFile::new(dir.path(), "redis").unwrap();
        writer.write_all(b"two\n").unwrap();
        writer.flush().unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let content =
            std::fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
        assert_eq!(content, "one\ntwo\n");
    }
}
