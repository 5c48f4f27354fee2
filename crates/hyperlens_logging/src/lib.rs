//! Shared logging setup for Hyperlens binaries.
//!
//! Every process logs to `$HYPERLENS_HOME/logs/<app>.log` and to stderr.
//! Stdout is left alone so that `--json` output stays parseable. File size
//! and the number of kept generations come from the `[logging]` section of
//! `config.toml`.

use anyhow::{Context, Result};
use hyperlens_protocol::LoggingSettings;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// What reaches stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleMode {
    /// Warnings and errors only (one-shot CLI commands).
    Quiet,
    /// The same filter as the log file (`serve`, `--verbose`).
    Full,
}

pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub console: ConsoleMode,
    /// Overrides the default `$HYPERLENS_HOME/logs`.
    pub log_dir: Option<PathBuf>,
    pub settings: &'a LoggingSettings,
}

/// Install the global subscriber: the rotating log file plus stderr.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = config
        .log_dir
        .unwrap_or_else(hyperlens_protocol::paths::default_logs_dir);
    let log_file = LogFile::open(&log_dir, config.app_name, config.settings).with_context(|| {
        format!(
            "Failed to open log file for {} in {}",
            config.app_name,
            log_dir.display()
        )
    })?;

    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.settings.filter))
    };
    let console_filter = match config.console {
        ConsoleMode::Full => filter(),
        ConsoleMode::Quiet => EnvFilter::new("warn"),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(log_file))
                .with_ansi(false)
                .with_filter(filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// `<app>.log` plus older generations `<app>.log.1` .. `<app>.log.N-1`.
struct LogFile {
    dir: PathBuf,
    app: String,
    max_files: usize,
    max_bytes: u64,
    file: File,
    written: u64,
}

impl LogFile {
    fn open(dir: &Path, app_name: &str, settings: &LoggingSettings) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let app = file_stem_for(app_name);
        let (file, written) = open_append(&generation_path(dir, &app, 0))?;
        let mut log = Self {
            dir: dir.to_path_buf(),
            app,
            max_files: settings.max_files.max(1),
            max_bytes: settings.max_file_bytes,
            file,
            written,
        };
        if log.written > log.max_bytes {
            log.rotate()?;
        }
        Ok(log)
    }

    /// Shift every generation up by one, dropping the oldest. With a single
    /// generation the live file is truncated instead.
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.max_files == 1 {
            self.file.set_len(0)?;
            self.written = 0;
            return Ok(());
        }

        for generation in (1..self.max_files).rev() {
            let older = generation_path(&self.dir, &self.app, generation - 1);
            if older.exists() {
                fs::rename(older, generation_path(&self.dir, &self.app, generation))?;
            }
        }
        let (file, written) = open_append(&generation_path(&self.dir, &self.app, 0))?;
        self.file = file;
        self.written = written;
        Ok(())
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

fn generation_path(dir: &Path, app: &str, generation: usize) -> PathBuf {
    match generation {
        0 => dir.join(format!("{}.log", app)),
        n => dir.join(format!("{}.log.{}", app, n)),
    }
}

fn file_stem_for(app_name: &str) -> String {
    app_name
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(max_files: usize, max_file_bytes: u64) -> LoggingSettings {
        LoggingSettings {
            max_files,
            max_file_bytes,
            ..LoggingSettings::default()
        }
    }

    #[test]
    fn test_file_stem_for() {
        assert_eq!(file_stem_for("hyperlens-serve"), "hyperlens-serve");
        assert_eq!(file_stem_for("a b/c"), "a_b_c");
    }

    #[test]
    fn test_rotation_keeps_configured_generations() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = LogFile::open(dir.path(), "hyperlens", &settings(3, 16)).unwrap();

        for i in 0..10 {
            log.write_all(format!("line {:04}\n", i).as_bytes()).unwrap();
        }
        log.flush().unwrap();

        assert!(dir.path().join("hyperlens.log").exists());
        assert!(dir.path().join("hyperlens.log.1").exists());
        assert!(dir.path().join("hyperlens.log.2").exists());
        assert!(!dir.path().join("hyperlens.log.3").exists());

        let live = fs::read_to_string(dir.path().join("hyperlens.log")).unwrap();
        assert!(live.ends_with("line 0009\n"), "{:?}", live);
        let newest_old = fs::read_to_string(dir.path().join("hyperlens.log.1")).unwrap();
        assert_eq!(newest_old, "line 0008\n");
        let oldest = fs::read_to_string(dir.path().join("hyperlens.log.2")).unwrap();
        assert_eq!(oldest, "line 0007\n");
    }

    #[test]
    fn test_single_generation_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = LogFile::open(dir.path(), "one", &settings(1, 8)).unwrap();
        log.write_all(b"12345678").unwrap();
        log.write_all(b"abc").unwrap();
        log.flush().unwrap();

        let content = fs::read_to_string(dir.path().join("one.log")).unwrap();
        assert_eq!(content, "abc");
        assert!(!dir.path().join("one.log.1").exists());
    }

    #[test]
    fn test_oversized_existing_file_rotates_on_open() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.log"), vec![b'x'; 64]).unwrap();

        let log = LogFile::open(dir.path(), "big", &settings(2, 32)).unwrap();
        assert_eq!(log.written, 0);
        assert_eq!(fs::metadata(dir.path().join("big.log.1")).unwrap().len(), 64);
    }
}
