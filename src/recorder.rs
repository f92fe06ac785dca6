use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::drivers::ScopeError;

/// Minimum width every latest-value write is padded to.
pub const LATEST_VALUE_WIDTH: usize = 32;

/// Comma-joined readings, no trailing newline.
pub fn format_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Text file rewritten with the newest reading vector on every block.
pub struct ValuesFile {
    path: PathBuf,
}

impl ValuesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, values: &[f64]) -> Result<(), ScopeError> {
        fs::write(&self.path, format_values(values))?;
        Ok(())
    }
}

/// Single scalar kept at offset 0 of a shared file that another process
/// polls. Every write is padded to the widest value written so far, so a
/// short write fully covers a longer one.
pub struct LatestValueSink<W: Write + Seek> {
    target: W,
    width: usize,
}

impl LatestValueSink<File> {
    pub fn create(path: &Path) -> Result<Self, ScopeError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Seek> LatestValueSink<W> {
    pub fn new(target: W) -> Self {
        Self {
            target,
            width: LATEST_VALUE_WIDTH,
        }
    }

    pub fn write(&mut self, value: f64) -> Result<(), ScopeError> {
        let text = format!("{:<width$.6}", value, width = self.width);
        self.width = self.width.max(text.len());
        self.target.seek(SeekFrom::Start(0))?;
        self.target.write_all(text.as_bytes())?;
        self.target.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.target
    }
}

/// Appends one CSV row of raw readings per block, prefixed with seconds
/// since the recording started.
pub struct DataRecorder {
    writer: Option<BufWriter<File>>,
    start_time: Instant,
    rows: u64,
}

impl DataRecorder {
    pub fn new() -> Self {
        Self {
            writer: None,
            start_time: Instant::now(),
            rows: 0,
        }
    }

    /// Opens `path` in append mode. A header is written only to an empty file.
    /// A recording already in progress is flushed and closed first.
    pub fn start(&mut self, path: &Path, probe_count: usize) -> Result<(), ScopeError> {
        self.stop()?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let fresh = file.metadata()?.len() == 0;
        let mut w = BufWriter::new(file);
        if fresh {
            let header: Vec<String> = (0..probe_count).map(|p| format!("p{p}")).collect();
            writeln!(w, "elapsed_s,{}", header.join(","))?;
        }
        self.writer = Some(w);
        self.start_time = Instant::now();
        self.rows = 0;
        log::info!("recording readings to {}", path.display());
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), ScopeError> {
        if let Some(mut w) = self.writer.take() {
            w.flush()?;
            log::info!("recording closed after {} rows", self.rows);
        }
        Ok(())
    }

    pub fn write_record(&mut self, data: &[f64]) -> Result<(), ScopeError> {
        if let Some(w) = &mut self.writer {
            let t = self.start_time.elapsed().as_secs_f64();
            writeln!(w, "{:.4},{}", t, format_values(data))?;
            self.rows += 1;
        }
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.writer.is_some()
    }
}

impl Default for DataRecorder {
    fn default() -> Self {
        Self::new()
    }
}
