//! Session log sink and startup diagnostics
//!
//! Every line goes to `tracing`. When the client asks for verbose tracing, or
//! the server runs with `debug`, lines are also persisted to `vls.log`.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::infra::lsp::protocol::{ClientInfo, TraceValue};

/// Destination for session log lines
pub trait LogSink: Send {
    /// Start persisting lines to `path`
    fn set_path(&mut self, path: &Path) -> io::Result<()>;

    fn log_info(&mut self, message: &str);

    fn log_error(&mut self, message: &str);

    /// Flush and release the file, if any
    fn close(&mut self);

    fn is_file_backed(&self) -> bool;
}

/// Sink that mirrors to `tracing` and optionally appends to a file
#[derive(Debug, Default)]
pub struct FileLogSink {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl FileLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn write_line(&mut self, level: &str, message: &str) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if let Err(e) = writeln!(writer, "[{level}] {message}").and_then(|_| writer.flush()) {
            tracing::warn!("Failed to write log file: {}", e);
        }
    }
}

impl LogSink for FileLogSink {
    fn set_path(&mut self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        self.writer = Some(BufWriter::new(file));
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    fn log_info(&mut self, message: &str) {
        tracing::info!("{}", message);
        self.write_line("info", message);
    }

    fn log_error(&mut self, message: &str) {
        tracing::error!("{}", message);
        self.write_line("error", message);
    }

    fn close(&mut self) {
        if let Some(mut writer) = self.writer.take()
            && let Err(e) = writer.flush()
        {
            tracing::warn!("Failed to flush log file: {}", e);
        }
    }

    fn is_file_backed(&self) -> bool {
        self.writer.is_some()
    }
}

/// Inputs of [`bootstrap_logger`]
#[derive(Debug, Clone)]
pub struct LoggerOptions<'a> {
    pub debug: bool,
    pub trace: TraceValue,
    pub log_path: &'a Path,
    pub client_info: Option<&'a ClientInfo>,
}

/// Whether a persistent log file should be created
pub fn wants_log_file(debug: bool, trace: TraceValue) -> bool {
    debug || trace == TraceValue::Verbose
}

/// Attach the log file if requested, then emit the startup diagnostics.
///
/// Returns whether a file sink was attached.
pub fn bootstrap_logger(sink: &mut dyn LogSink, options: &LoggerOptions<'_>) -> bool {
    let mut file_backed = false;

    if wants_log_file(options.debug, options.trace) {
        // A stale log from a previous session is discarded
        let _ = fs::remove_file(options.log_path);

        match sink.set_path(options.log_path) {
            Ok(()) => file_backed = true,
            Err(e) => tracing::warn!(
                "Cannot open log file {}: {}",
                options.log_path.display(),
                e
            ),
        }
    }

    sink.log_info(&version_line());
    sink.log_info(&client_line(options.client_info));

    file_backed
}

pub fn version_line() -> String {
    format!(
        "VLS Version: {}, OS: {} {}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        arch_label()
    )
}

pub fn client_line(client_info: Option<&ClientInfo>) -> String {
    match client_info {
        Some(info) if !info.name.is_empty() => match info.version.as_deref() {
            Some(version) => format!("Client / Editor: {} {}", info.name, version),
            None => format!("Client / Editor: {}", info.name),
        },
        _ => "Client / Editor: Unknown".to_string(),
    }
}

fn arch_label() -> &'static str {
    if usize::BITS == 64 { "64-bit" } else { "32-bit" }
}
