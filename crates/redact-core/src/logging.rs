//! Logging init: log file under the XDG state dir plus human-readable
//! output on stderr, or stderr alone when the file cannot be opened.

use anyhow::Result;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Writer that is either a file or stderr (used when file clone fails).
enum FileOrStderr {
    File(fs::File),
    Stderr,
}

impl io::Write for FileOrStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileOrStderr::File(f) => f.write(buf),
            FileOrStderr::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileOrStderr::File(f) => f.flush(),
            FileOrStderr::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct LogFile(fs::File);

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = FileOrStderr;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(FileOrStderr::File)
            .unwrap_or(FileOrStderr::Stderr)
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("redact")?;
    Ok(xdg_dirs.place_state_file("redact.log")?)
}

/// Log to `~/.local/state/redact/redact.log` and to stderr. `verbose`
/// raises the default level to debug; `RUST_LOG` wins over both.
/// Returns Err when the log file is unusable so the caller can fall back
/// to [`init_logging_stderr`].
pub fn init_logging(verbose: bool) -> Result<PathBuf> {
    let path = log_file_path()?;
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(LogFile(file))
        .with_ansi(false)
        .with_filter(env_filter(verbose));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(env_filter(verbose));
    tracing_subscriber::registry().with(file_layer).with(stderr_layer).try_init()?;

    tracing::debug!("redact logging initialized at {}", path.display());
    Ok(path)
}

/// Stderr-only logging, used when [`init_logging`] fails.
pub fn init_logging_stderr(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}
