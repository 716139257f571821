//! JSONL Recorder
//!
//! Append-only, size-rotated JSON-lines writer shared by the decision
//! audit log and the file alert sink.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, Timelike, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Maximum file size before rotation (50 MB)
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

const LOG_EXT: &str = "jsonl";

// ============================================================================
// RECORDER
// ============================================================================

pub struct Recorder {
    writer: BufWriter<File>,
    current_file: PathBuf,
    current_size: u64,
    base_dir: PathBuf,
    prefix: String,
    max_size: u64,
    sequence: u32,
    records: u64,
}

impl Recorder {
    /// Create a recorder writing `<prefix>_<timestamp>_<seq>.jsonl` files in `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>, prefix: &str) -> std::io::Result<Self> {
        Self::with_max_size(base_dir, prefix, MAX_FILE_SIZE)
    }

    pub fn with_max_size(base_dir: impl Into<PathBuf>, prefix: &str, max_size: u64) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        let (current_file, file) = open_new_file(&base_dir, prefix, 0)?;

        Ok(Self {
            writer: BufWriter::new(file),
            current_file,
            current_size: 0,
            base_dir,
            prefix: prefix.to_string(),
            max_size: max_size.max(1),
            sequence: 0,
            records: 0,
        })
    }

    /// Append one record as a single line, rotating first if it would overflow
    pub fn record<T: Serialize>(&mut self, item: &T) -> std::io::Result<()> {
        let line = serde_json::to_string(item)?;
        let bytes = line.as_bytes();

        if self.current_size > 0 && self.current_size + bytes.len() as u64 + 1 > self.max_size {
            self.rotate()?;
        }

        self.writer.write_all(bytes)?;
        self.writer.write_all(b"\n")?;
        self.current_size += bytes.len() as u64 + 1;

        // Flush for durability
        self.writer.flush()?;
        self.records += 1;
        Ok(())
    }

    fn rotate(&mut self) -> std::io::Result<()> {
        self.writer.flush()?;
        self.sequence += 1;

        let (new_path, new_file) = open_new_file(&self.base_dir, &self.prefix, self.sequence)?;
        self.writer = BufWriter::new(new_file);

        log::info!("Rotated from {:?} to {:?}", self.current_file, new_path);
        self.current_file = new_path;
        self.current_size = 0;
        Ok(())
    }

    pub fn current_file(&self) -> &Path {
        &self.current_file
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

fn open_new_file(base_dir: &Path, prefix: &str, sequence: u32) -> std::io::Result<(PathBuf, File)> {
    let now = Utc::now();
    let filename = format!(
        "{}_{}_{:02}_{:02}_{:02}{:02}{:02}_{:03}.{}",
        prefix,
        now.year(),
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        sequence,
        LOG_EXT
    );
    let file_path = base_dir.join(&filename);

    let file = OpenOptions::new().create(true).append(true).open(&file_path)?;

    log::info!("Opened log: {:?}", file_path);
    Ok((file_path, file))
}

// ============================================================================
// QUERY API
// ============================================================================

/// Read all parseable records from a JSONL file; malformed lines are skipped
pub fn read_records<T: DeserializeOwned>(file_path: &Path) -> std::io::Result<Vec<T>> {
    let file = File::open(file_path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("Skipping malformed line in {:?}: {}", file_path, e),
        }
    }

    Ok(records)
}

/// All `.jsonl` files in `dir` starting with `prefix`, oldest first
pub fn list_log_files(dir: &Path, prefix: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if dir.is_dir() {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let matches_prefix = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with(prefix));
            if matches_prefix && path.extension().map_or(false, |e| e == LOG_EXT) {
                files.push(path);
            }
        }
    }

    // Sort by name (which includes timestamp and sequence)
    files.sort();
    Ok(files)
}

// ============================================================================
// TESTS
// ============================================================================
