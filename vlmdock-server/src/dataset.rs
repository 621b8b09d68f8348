//! Append-only training-sample log.
//!
//! Every accepted frame is saved as `<UTC timestamp>.png` in the dataset
//! directory and a `filename,command` line is appended to `labels.csv`.
//! There is no transaction between the two writes.

use std::borrow::Cow;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageFormat};
use tracing::{debug, info};

pub const LABELS_FILE: &str = "labels.csv";
pub const LABELS_HEADER: &str = "filename,command";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSample {
    pub filename: String,
    pub command: String,
}

pub struct DatasetLogger {
    dir: PathBuf,
    labels_path: PathBuf,
    /// Serializes filename allocation, image write and label append.
    write_lock: Mutex<()>,
}

impl DatasetLogger {
    /// Creates the directory and a header-only `labels.csv` if they are missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create dataset dir {}", dir.display()))?;

        let labels_path = dir.join(LABELS_FILE);
        if !labels_path.exists() {
            fs::write(&labels_path, format!("{LABELS_HEADER}\n"))
                .with_context(|| format!("Failed to create {}", labels_path.display()))?;
            info!("Created {}", labels_path.display());
        }

        Ok(Self {
            dir,
            labels_path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn labels_path(&self) -> &Path {
        &self.labels_path
    }

    /// Saves `image` as PNG and appends its label line. Blocking.
    pub fn record(&self, image: &DynamicImage, command: &str) -> Result<DatasetSample> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Dataset writer lock poisoned"))?;

        let mut ts = Utc::now();
        let (filename, path) = loop {
            let name = sample_filename(ts);
            let path = self.dir.join(&name);
            if !path.exists() {
                break (name, path);
            }
            ts += chrono::Duration::microseconds(1);
        };

        image
            .save_with_format(&path, ImageFormat::Png)
            .with_context(|| format!("Failed to save {}", path.display()))?;

        let mut labels = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.labels_path)
            .with_context(|| format!("Failed to open {}", self.labels_path.display()))?;
        labels
            .write_all(format!("{},{}\n", filename, csv_field(command)).as_bytes())
            .with_context(|| format!("Failed to append to {}", self.labels_path.display()))?;

        debug!("Logged sample {filename}");
        Ok(DatasetSample {
            filename,
            command: command.to_string(),
        })
    }
}

/// `20250101T120000123456.png`: UTC date, time, and microseconds.
pub fn sample_filename(ts: DateTime<Utc>) -> String {
    format!("{}.png", ts.format("%Y%m%dT%H%M%S%6f"))
}

/// Quotes a CSV field when it holds a comma, a quote or a line break.
pub fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use image::{ImageBuffer, Rgb};

    fn tiny_image() -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(10, 10, Rgb([200u8, 10, 10])))
    }

    fn png_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with(".png"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn open_creates_dir_and_header() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("vlm_dataset");
        let logger = DatasetLogger::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(
            fs::read_to_string(logger.labels_path()).unwrap(),
            "filename,command\n"
        );
    }

    #[test]
    fn reopen_keeps_existing_labels() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let logger = DatasetLogger::open(tmp.path()).unwrap();
            logger.record(&tiny_image(), "hold position").unwrap();
        }
        let logger = DatasetLogger::open(tmp.path()).unwrap();
        let labels = fs::read_to_string(logger.labels_path()).unwrap();
        assert_eq!(labels.lines().count(), 2);
        assert!(labels.starts_with("filename,command\n"));
    }

    #[test]
    fn record_writes_png_and_label() {
        let tmp = tempfile::tempdir().unwrap();
        let logger = DatasetLogger::open(tmp.path()).unwrap();
        let sample = logger.record(&tiny_image(), "move forward").unwrap();

        assert_eq!(png_files(tmp.path()), vec![sample.filename.clone()]);
        let saved = image::open(tmp.path().join(&sample.filename)).unwrap();
        assert_eq!(saved.to_rgb8().dimensions(), (10, 10));

        let labels = fs::read_to_string(logger.labels_path()).unwrap();
        assert_eq!(
            labels,
            format!("filename,command\n{},move forward\n", sample.filename)
        );
    }

    #[test]
    fn identical_requests_get_distinct_files() {
        let tmp = tempfile::tempdir().unwrap();
        let logger = DatasetLogger::open(tmp.path()).unwrap();
        let a = logger.record(&tiny_image(), "align with the docking port").unwrap();
        let b = logger.record(&tiny_image(), "align with the docking port").unwrap();
        assert_ne!(a.filename, b.filename);
        assert_eq!(png_files(tmp.path()).len(), 2);
        let labels = fs::read_to_string(logger.labels_path()).unwrap();
        assert_eq!(labels.lines().count(), 3);
    }

    #[test]
    fn concurrent_records_keep_lines_whole() {
        let tmp = tempfile::tempdir().unwrap();
        let logger = std::sync::Arc::new(DatasetLogger::open(tmp.path()).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let logger = logger.clone();
                std::thread::spawn(move || {
                    logger.record(&tiny_image(), &format!("command {i}")).unwrap()
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let labels = fs::read_to_string(logger.labels_path()).unwrap();
        let lines: Vec<&str> = labels.lines().skip(1).collect();
        assert_eq!(lines.len(), 8);
        for line in lines {
            let (file, cmd) = line.split_once(',').unwrap();
            assert!(file.ends_with(".png"));
            assert!(cmd.starts_with("command "));
        }
        assert_eq!(png_files(tmp.path()).len(), 8);
    }

    #[test]
    fn filename_format() {
        let ts = NaiveDate::from_ymd_opt(2025, 3, 7)
            .unwrap()
            .and_hms_micro_opt(9, 5, 1, 42)
            .unwrap()
            .and_utc();
        assert_eq!(sample_filename(ts), "20250307T090501000042.png");
    }

    #[test]
    fn csv_field_quoting() {
        assert_eq!(csv_field("move forward"), "move forward");
        assert_eq!(csv_field(""), "");
        assert_eq!(csv_field("left, then up"), "\"left, then up\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }
}
