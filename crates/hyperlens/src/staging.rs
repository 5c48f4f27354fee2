//! Upload staging: accepts `.hyper` uploads into a staging directory, hands
//! out stable ids for them and sweeps old files on a schedule.
//!
//! Staging ids look like `<millis>-<counter>-<random>-<sanitized name>`. The
//! per-process counter and the random part keep two uploads in the same
//! millisecond apart; files are also created with create-new semantics, so an
//! existing file is never overwritten.

use chrono::{DateTime, Utc};
use hyperlens_protocol::{has_hyper_extension, ErrorKind, StagingSettings, UploadedFile};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

static UPLOAD_COUNTER: AtomicU64 = AtomicU64::new(0);

const COPY_CHUNK_SIZE: usize = 64 * 1024;
const MAX_SANITIZED_NAME_LEN: usize = 100;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Only .hyper files are allowed, got '{name}'")]
    UnsupportedFileType { name: String },

    #[error("File too large: uploads are limited to {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("File not found: {id}")]
    NotFound { id: String },

    #[error("Invalid file id: '{id}'")]
    InvalidId { id: String },

    #[error("Staging I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl StagingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StagingError::UnsupportedFileType { .. } => ErrorKind::UnsupportedFileType,
            StagingError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            StagingError::NotFound { .. } => ErrorKind::NotFound,
            StagingError::InvalidId { .. } => ErrorKind::InvalidInput,
            StagingError::Io { .. } => ErrorKind::Io,
        }
    }

    fn io(context: impl Into<String>, source: io::Error) -> Self {
        StagingError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
}

/// The staging directory and its limits.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
    max_upload_bytes: u64,
    retention: Duration,
}

impl StagingArea {
    pub fn new(settings: &StagingSettings) -> Self {
        Self {
            dir: settings.dir.clone(),
            max_upload_bytes: settings.max_upload_bytes,
            retention: settings.retention(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn ensure_dir(&self) -> Result<(), StagingError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            StagingError::io(format!("create {}", self.dir.display()), e)
        })
    }

    /// Validate an upload and open its destination file.
    ///
    /// `declared_size` (e.g. from `Content-Length`) is checked up front; the
    /// streamed byte count is checked again on every chunk.
    pub async fn begin(
        &self,
        original_name: &str,
        declared_size: Option<u64>,
    ) -> Result<PendingUpload, StagingError> {
        let original_name = base_name(original_name).to_string();
        if !has_hyper_extension(&original_name) {
            return Err(StagingError::UnsupportedFileType {
                name: original_name,
            });
        }
        if let Some(size) = declared_size {
            if size > self.max_upload_bytes {
                return Err(StagingError::PayloadTooLarge {
                    limit: self.max_upload_bytes,
                });
            }
        }

        self.ensure_dir()?;
        let staging_id = new_staging_id(&original_name);
        let path = self.dir.join(&staging_id);
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| StagingError::io(format!("create {}", path.display()), e))?;

        debug!("Staging upload '{}' as {}", original_name, staging_id);
        Ok(PendingUpload {
            file,
            path,
            staging_id,
            original_name,
            written: 0,
            limit: self.max_upload_bytes,
            committed: false,
        })
    }

    /// Stream `content` into the staging directory.
    pub async fn accept<R>(
        &self,
        original_name: &str,
        mut content: R,
        declared_size: Option<u64>,
    ) -> Result<UploadedFile, StagingError>
    where
        R: AsyncRead + Unpin,
    {
        let mut pending = self.begin(original_name, declared_size).await?;
        let mut buf = vec![0u8; COPY_CHUNK_SIZE];
        loop {
            let n = content
                .read(&mut buf)
                .await
                .map_err(|e| StagingError::io("read upload", e))?;
            if n == 0 {
                break;
            }
            pending.write_chunk(&buf[..n]).await?;
        }
        pending.finish().await
    }

    /// Path of a staged file.
    pub fn resolve(&self, staging_id: &str) -> Result<PathBuf, StagingError> {
        if !is_valid_id(staging_id) {
            return Err(StagingError::InvalidId {
                id: staging_id.to_string(),
            });
        }
        let path = self.dir.join(staging_id);
        if path.is_file() {
            Ok(path)
        } else {
            Err(StagingError::NotFound {
                id: staging_id.to_string(),
            })
        }
    }

    /// Staged files, newest first. A missing directory is an empty list.
    ///
    /// `original_name` is recovered from the staging id, so it is the
    /// sanitized form (see [`original_name_of`]).
    pub fn list(&self) -> Result<Vec<UploadedFile>, StagingError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StagingError::io(
                    format!("list {}", self.dir.display()),
                    e,
                ))
            }
        };

        let mut files = Vec::new();
        for entry in entries.flatten() {
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let staging_id = entry.file_name().to_string_lossy().into_owned();
            let uploaded_at: DateTime<Utc> = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            files.push(UploadedFile {
                original_name: original_name_of(&staging_id).to_string(),
                staging_id,
                size_bytes: meta.len(),
                stored_path: entry.path(),
                uploaded_at,
            });
        }
        files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(files)
    }

    /// Delete staged files whose age at `now` exceeds the retention period.
    ///
    /// Entries that disappear mid-sweep are skipped. Other per-entry failures
    /// are logged and counted; they never stop the pass.
    pub fn sweep(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return report,
            Err(e) => {
                warn!("Cannot list staging dir {}: {}", self.dir.display(), e);
                report.failed += 1;
                return report;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Cannot read staging entry: {}", e);
                    report.failed += 1;
                    continue;
                }
            };
            report.scanned += 1;
            let path = entry.path();

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!("Cannot stat {}: {}", path.display(), e);
                    report.failed += 1;
                    continue;
                }
            };
            if !meta.is_file() {
                continue;
            }
            let modified = match meta.modified() {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("No modification time for {}: {}", path.display(), e);
                    report.failed += 1;
                    continue;
                }
            };
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= self.retention {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Swept {} (age {}s)", path.display(), age.as_secs());
                    report.removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Failed to remove {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }
        report
    }
}

/// An upload being written. Dropping it before [`PendingUpload::finish`]
/// removes the partial file.
pub struct PendingUpload {
    file: tokio::fs::File,
    path: PathBuf,
    staging_id: String,
    original_name: String,
    written: u64,
    limit: u64,
    committed: bool,
}

impl PendingUpload {
    pub fn staging_id(&self) -> &str {
        &self.staging_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StagingError> {
        let total = self.written.saturating_add(chunk.len() as u64);
        if total > self.limit {
            warn!(
                "Upload {} crossed the {} byte limit; discarding",
                self.staging_id, self.limit
            );
            return Err(StagingError::PayloadTooLarge { limit: self.limit });
        }
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| StagingError::io(format!("write {}", self.path.display()), e))?;
        self.written = total;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<UploadedFile, StagingError> {
        self.file
            .flush()
            .await
            .map_err(|e| StagingError::io(format!("flush {}", self.path.display()), e))?;
        self.committed = true;
        info!(
            "Staged '{}' as {} ({} bytes)",
            self.original_name, self.staging_id, self.written
        );
        Ok(UploadedFile {
            staging_id: self.staging_id.clone(),
            original_name: self.original_name.clone(),
            size_bytes: self.written,
            stored_path: self.path.clone(),
            uploaded_at: Utc::now(),
        })
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial upload {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial upload {}: {}", self.path.display(), e),
        }
    }
}

/// Periodic sweep task. Stop it with [`Sweeper::stop`] on shutdown.
pub struct Sweeper {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn the sweep loop on the current runtime. The first sweep runs one
    /// `interval` after start.
    pub fn start(area: Arc<StagingArea>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately, skip it
            ticker.tick().await;
            info!(
                "Staging sweeper started (every {}s, retention {}s)",
                interval.as_secs(),
                area.retention().as_secs()
            );

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.recv() => break,

                    _ = ticker.tick() => {
                        let area = area.clone();
                        match tokio::task::spawn_blocking(move || area.sweep(SystemTime::now())).await {
                            Ok(report) => info!(
                                "Staging sweep: scanned={} removed={} failed={}",
                                report.scanned, report.removed, report.failed
                            ),
                            Err(e) => warn!("Staging sweep task failed: {}", e),
                        }
                    }
                }
            }
            info!("Staging sweeper stopped");
        });
        Self {
            shutdown_tx,
            handle,
        }
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            warn!("Staging sweeper did not stop cleanly: {}", e);
        }
    }
}

fn new_staging_id(original_name: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let counter = UPLOAD_COUNTER.fetch_add(1, Ordering::Relaxed);
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}-{}",
        millis,
        counter,
        &random[..8],
        sanitize_name(original_name)
    )
}

/// Strip any client-side directory part (browsers may send `C:\...\a.hyper`).
fn base_name(name: &str) -> &str {
    name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name)
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.len() <= MAX_SANITIZED_NAME_LEN {
        return cleaned.to_string();
    }
    cleaned[cleaned.len() - MAX_SANITIZED_NAME_LEN..].to_string()
}

/// The sanitized original file name embedded in a staging id.
///
/// This is what `list` reports as `original_name`: `Sales Q1.HYPER` comes
/// back as `Sales_Q1.HYPER`. Only the upload response carries the name as
/// the client sent it.
pub fn original_name_of(staging_id: &str) -> &str {
    staging_id.splitn(4, '-').nth(3).unwrap_or(staging_id)
}

/// A staging id names exactly one entry directly inside the staging directory.
fn is_valid_id(staging_id: &str) -> bool {
    if staging_id.starts_with('.') || staging_id.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(staging_id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("sales 2024.hyper"), "sales_2024.hyper");
        assert_eq!(sanitize_name("..hidden.hyper"), "hidden.hyper");
        assert_eq!(sanitize_name("überdata.hyper"), "_berdata.hyper");
        let long = format!("{}.hyper", "x".repeat(300));
        let sanitized = sanitize_name(&long);
        assert_eq!(sanitized.len(), MAX_SANITIZED_NAME_LEN);
        assert!(sanitized.ends_with(".hyper"));
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("a.hyper"), "a.hyper");
        assert_eq!(base_name("/tmp/x/a.hyper"), "a.hyper");
        assert_eq!(base_name("C:\\Users\\me\\a.hyper"), "a.hyper");
    }

    #[test]
    fn test_staging_id_shape() {
        let id = new_staging_id("sales.hyper");
        assert!(id.ends_with("-sales.hyper"));
        assert_eq!(original_name_of(&id), "sales.hyper");
        assert!(is_valid_id(&id));
        assert_ne!(id, new_staging_id("sales.hyper"));
    }

    #[test]
    fn test_is_valid_id() {
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("../etc/passwd"));
        assert!(!is_valid_id("a/b.hyper"));
        assert!(!is_valid_id("a\\b.hyper"));
        assert!(!is_valid_id(".hidden"));
        assert!(!is_valid_id(".."));
        assert!(!is_valid_id("a\0b"));
        assert!(is_valid_id("1700000000000-0-abcd1234-v1..final.hyper"));
        assert!(is_valid_id("1700000000000-0-abcd1234-a.hyper"));
    }
}
