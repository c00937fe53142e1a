//! Destinations for access-log records.
//!
//! Each record is written as its text followed by a single `\n`.

use crate::record::LogRecord;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the writer puts records. Called from the writer thread only.
pub trait LogSink: Send {
    /// Persist one record. One call per dequeued record.
    ///
    /// Report failures as `Err`. A panic is caught and counted as a write
    /// error only when unwinding is enabled; release builds abort instead.
    fn write(&mut self, record: &LogRecord) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes records to a stream, stdout by default.
pub struct ConsoleSink {
    out: Box<dyn Write + Send>,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self::with_writer(io::stdout())
    }

    pub fn with_writer(out: impl Write + Send + 'static) -> Self {
        Self { out: Box::new(out) }
    }
}

impl LogSink for ConsoleSink {
    fn write(&mut self, record: &LogRecord) -> io::Result<()> {
        self.out.write_all(record.msg().as_bytes())?;
        self.out.write_all(b"\n")
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Appends records to one file, creating it and its parent directories.
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        info!(path = %path.display(), "Access log file opened");

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileSink {
    fn write(&mut self, record: &LogRecord) -> io::Result<()> {
        self.writer.write_all(record.msg().as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Picks the destination from each record's own options: the file named
/// by `output_path`, or the console when none is set.
///
/// Files are opened on first use and kept open. A file that fails to open
/// fails that write only; the next record for the same path retries.
pub struct RoutingSink {
    console: ConsoleSink,
    files: HashMap<PathBuf, FileSink>,
}

impl RoutingSink {
    pub fn new() -> Self {
        Self::with_console(ConsoleSink::stdout())
    }

    pub fn with_console(console: ConsoleSink) -> Self {
        Self {
            console,
            files: HashMap::new(),
        }
    }

    /// Number of files currently held open.
    pub fn open_files(&self) -> usize {
        self.files.len()
    }

    fn file_for(&mut self, path: &Path) -> io::Result<&mut FileSink> {
        if !self.files.contains_key(path) {
            let sink = FileSink::open(path)?;
            self.files.insert(path.to_path_buf(), sink);
        }
        self.files
            .get_mut(path)
            .ok_or_else(|| io::Error::other("file sink vanished"))
    }
}

impl Default for RoutingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for RoutingSink {
    fn write(&mut self, record: &LogRecord) -> io::Result<()> {
        match record.config().output_path.as_deref() {
            Some(path) if !path.as_os_str().is_empty() => self.file_for(path)?.write(record),
            _ => self.console.write(record),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut result = self.console.flush();
        for sink in self.files.values_mut() {
            if let Err(e) = sink.flush() {
                result = Err(e);
            }
        }
        result
    }
}
