//! Append-only audit log of zero adjustments
//!
//! Every zero adjustment of a measurement system is legally relevant: a
//! zero taken under load hides that load from every subsequent reading.
//! The [`ZeroMonitor`] therefore appends one line per adjustment to a
//! plain-text log file, recording the raw input values (hex, as the
//! devices sent them), the calibrated values before correction, and the
//! sensor states at that moment.
//!
//! Record layout, semicolon-separated:
//!
//! ```text
//! <timestamp>;<seq>;R;<raw hex>;...;C;<calibrated>;...;S;<state>;...;
//! ```
//!
//! Write failures must never block a zero operation; callers log them as
//! warnings and continue.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Timestamp format used in record lines
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Append-only writer for the zero-adjustment audit log
#[derive(Debug)]
pub struct ZeroMonitor {
    /// Full path of the log file
    path: PathBuf,
    /// Open append handle
    file: File,
    /// Sequence number of the next record
    seq: u64,
}

impl ZeroMonitor {
    /// Open (or create) the audit log in the given directory. One file per
    /// program run, named by start time; parent directories are created as
    /// needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let name = format!("zeromon_{}.log", Local::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self { path, file, seq: 0 })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sequence number the next record will carry
    pub fn next_seq(&self) -> u64 {
        self.seq
    }

    /// Append one record for a zero adjustment and flush it to disk.
    ///
    /// `raw` are the uncorrected input values as received from the
    /// devices, `calibrated` the output values before zero correction,
    /// `states` the display names of the sensor states at this moment.
    pub fn record(&mut self, raw: &[f64], calibrated: &[f64], states: &[&str]) -> Result<()> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let line = format_record(&timestamp, self.seq, raw, calibrated, states);
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        self.seq += 1;
        Ok(())
    }
}

/// Build one record line, newline-terminated
fn format_record(
    timestamp: &str,
    seq: u64,
    raw: &[f64],
    calibrated: &[f64],
    states: &[&str],
) -> String {
    let mut line = format!("{timestamp};{seq:06};R;");
    for v in raw {
        // raw values are ADC counts; log them the way the wire carries them
        line.push_str(&format!("{:04x};", *v as i64 as u16));
    }
    line.push_str("C;");
    for v in calibrated {
        line.push_str(&format!("{v:.2};"));
    }
    line.push_str("S;");
    for s in states {
        line.push_str(s);
        line.push(';');
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_line_layout() {
        let line = format_record(
            "2024-01-01 12:00:00.000",
            3,
            &[100.0, 256.0],
            &[200.0],
            &["Measure", "Idle"],
        );
        assert_eq!(
            line,
            "2024-01-01 12:00:00.000;000003;R;0064;0100;C;200.00;S;Measure;Idle;\n"
        );
    }

    #[test]
    fn test_raw_hex_wraps_to_16_bit() {
        let line = format_record("t", 0, &[65536.0 + 1.0], &[], &[]);
        assert!(line.contains(";R;0001;C;"));
    }

    #[test]
    fn test_records_append_and_number() {
        let dir = tempfile::tempdir().unwrap();
        let mut monitor = ZeroMonitor::new(dir.path()).unwrap();

        monitor.record(&[1.0], &[10.0], &["Idle"]).unwrap();
        monitor.record(&[2.0], &[20.0], &["Measure"]).unwrap();
        assert_eq!(monitor.next_seq(), 2);

        let content = std::fs::read_to_string(monitor.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(";000000;R;0001;"));
        assert!(lines[1].contains(";000001;R;0002;"));
        assert!(lines[1].contains(";S;Measure;"));
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("audit").join("zero");
        let monitor = ZeroMonitor::new(&nested).unwrap();
        assert!(monitor.path().starts_with(&nested));
    }
}
