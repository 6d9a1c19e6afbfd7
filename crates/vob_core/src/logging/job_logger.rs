//! Per-job log files.
//!
//! Every batch job writes its own log under the logs directory and can
//! mirror each line to a frontend callback. Compact mode keeps the file
//! small: progress lines are stepped, encoder output is held in a tail
//! buffer and replayed only when the encode fails.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogConfig, LogLevel, MessagePrefix, UiLogCallback};

/// Characters replaced when a job name becomes a file name.
const FILENAME_RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Mutable logger state behind one lock.
struct Inner {
    writer: Option<BufWriter<File>>,
    tail: VecDeque<String>,
    last_progress: u32,
}

/// Logger for a single batch job.
///
/// Writes `<logs_dir>/<job>.log` and optionally mirrors every line to a
/// [`UiLogCallback`]. All methods take `&self`; the logger is shared
/// across the job's threads behind an `Arc`.
pub struct JobLogger {
    job_name: String,
    log_path: PathBuf,
    config: LogConfig,
    ui_callback: Option<UiLogCallback>,
    inner: Mutex<Inner>,
}

impl JobLogger {
    /// Open `<log_dir>/<job_name>.log` for writing, creating the
    /// directory first.
    pub fn new(
        job_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        ui_callback: Option<UiLogCallback>,
    ) -> std::io::Result<Self> {
        let job_name = job_name.into();
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&job_name)));
        let writer = BufWriter::new(File::create(&log_path)?);
        let tail_capacity = config.error_tail.min(256);

        Ok(Self {
            job_name,
            log_path,
            config,
            ui_callback,
            inner: Mutex::new(Inner {
                writer: Some(writer),
                tail: VecDeque::with_capacity(tail_capacity),
                last_progress: 0,
            }),
        })
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Write a line if `level` clears the configured threshold.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }
        self.emit(&self.stamp(message));
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    /// Record a command line about to be executed.
    pub fn command(&self, command: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Command.format(command));
    }

    /// Mark the start of a pipeline phase.
    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    pub fn validation(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Validation.format(message));
    }

    /// Record a progress percentage.
    ///
    /// Compact mode writes only when a new step boundary is crossed, so a
    /// stream of per-second updates collapses to a handful of lines. 100
    /// always lands. Returns whether the line was written.
    pub fn progress(&self, percent: u32) -> bool {
        if self.config.compact {
            let step = self.config.progress_step.max(1);
            let mut inner = self.inner.lock();
            let crossed = (percent / step) > (inner.last_progress / step);
            if !crossed && percent < 100 {
                return false;
            }
            inner.last_progress = percent;
        }

        self.log(LogLevel::Info, &format!("Progress: {percent}%"));
        true
    }

    /// Record one line of encoder output, stderr for the most part.
    ///
    /// The line always enters the tail buffer; in compact mode it goes no
    /// further.
    pub fn output_line(&self, line: &str, is_stderr: bool) {
        {
            let mut inner = self.inner.lock();
            if inner.tail.len() >= self.config.error_tail {
                inner.tail.pop_front();
            }
            inner.tail.push_back(line.to_string());
        }

        if self.config.compact {
            return;
        }

        let marker = if is_stderr { "[stderr] " } else { "" };
        self.emit(&self.stamp(&format!("{marker}{line}")));
    }

    /// Replay the tail buffer under a header, typically after a failure.
    pub fn show_tail(&self, header: &str) {
        let lines = self.get_tail();
        if lines.is_empty() {
            return;
        }

        self.emit(&self.stamp(&format!("[{header}/tail]")));
        for line in &lines {
            self.emit(&self.stamp(line));
        }
    }

    pub fn clear_tail(&self) {
        self.inner.lock().tail.clear();
    }

    pub fn get_tail(&self) -> Vec<String> {
        self.inner.lock().tail.iter().cloned().collect()
    }

    /// Record the composed encoder invocation, one option per line.
    pub fn log_ffmpeg_command(&self, tokens: &[String]) {
        self.info("--- ffmpeg command ---");
        self.info(&tokens.join(" \\\n  "));
        self.info("----------------------");
    }

    pub fn flush(&self) {
        if let Some(writer) = self.inner.lock().writer.as_mut() {
            let _ = writer.flush();
        }
    }

    /// Flush and drop the file handle. Later writes go only to the
    /// callback.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if let Some(writer) = inner.writer.as_mut() {
            let _ = writer.flush();
        }
        inner.writer = None;
    }

    fn stamp(&self, message: &str) -> String {
        if self.config.show_timestamps {
            format!("[{}] {message}", Local::now().format("%H:%M:%S"))
        } else {
            message.to_string()
        }
    }

    fn emit(&self, formatted: &str) {
        if let Some(writer) = self.inner.lock().writer.as_mut() {
            let _ = writeln!(writer, "{formatted}");
        }
        if let Some(callback) = &self.ui_callback {
            callback(formatted);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if FILENAME_RESERVED.contains(&c) { '_' } else { c })
        .collect()
}

/// Fluent construction for a [`JobLogger`].
pub struct JobLoggerBuilder {
    job_name: String,
    log_dir: PathBuf,
    config: LogConfig,
    ui_callback: Option<UiLogCallback>,
}

impl JobLoggerBuilder {
    pub fn new(job_name: impl Into<String>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            job_name: job_name.into(),
            log_dir: log_dir.into(),
            config: LogConfig::default(),
            ui_callback: None,
        }
    }

    pub fn config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn compact(mut self, compact: bool) -> Self {
        self.config.compact = compact;
        self
    }

    pub fn ui_callback(mut self, callback: UiLogCallback) -> Self {
        self.ui_callback = Some(callback);
        self
    }

    pub fn build(self) -> std::io::Result<JobLogger> {
        JobLogger::new(self.job_name, self.log_dir, self.config, self.ui_callback)
    }
}
