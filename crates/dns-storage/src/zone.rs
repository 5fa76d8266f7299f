//! Zone file storage for the nameserver's zone directory
//!
//! Each domain has exactly one file, `<output-dir>/db.<domain>`. Writes land in
//! a hidden temporary file in the same directory and are renamed over the
//! target, so a nameserver never reads a partially written zone.

use dns_core::{DnsError, DnsResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const ZONE_FILE_PREFIX: &str = "db.";

/// Temporary files start with a dot, which no accepted domain name does
const TEMP_FILE_PREFIX: &str = ".tmp.";

/// Zone store keyed by domain name, last writer wins
#[derive(Debug)]
pub struct ZoneStore {
    /// Directory the nameserver reads zone files from
    output_dir: PathBuf,

    /// Distinguishes concurrent temporary files
    temp_sequence: AtomicU64,

    /// Atomic counters
    write_operations: AtomicU64,
    delete_operations: AtomicU64,
    missing_deletes: AtomicU64,
    bytes_written: AtomicU64,
}

/// Zone store statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneStoreStatistics {
    pub write_operations: u64,
    pub delete_operations: u64,
    pub missing_deletes: u64,
    pub bytes_written: u64,
}

impl ZoneStore {
    /// Create a zone store, creating the output directory if needed
    ///
    /// Fails with [`DnsError::DiskIoError`] when the directory cannot be
    /// created or a file cannot be created inside it.
    pub fn new<P: AsRef<Path>>(output_dir: P) -> DnsResult<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();

        std::fs::create_dir_all(&output_dir).map_err(|e| DnsError::DiskIoError {
            message: format!("Failed to create output directory {}: {}", output_dir.display(), e),
        })?;
        Self::check_writable(&output_dir)?;

        Ok(Self {
            output_dir,
            temp_sequence: AtomicU64::new(0),
            write_operations: AtomicU64::new(0),
            delete_operations: AtomicU64::new(0),
            missing_deletes: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of the zone file for `domain_name`
    ///
    /// Names that could escape the output directory or collide with temporary
    /// files are refused.
    pub fn zone_path(&self, domain_name: &str) -> DnsResult<PathBuf> {
        let unsafe_name = domain_name.is_empty()
            || domain_name.starts_with('.')
            || domain_name.contains(['/', '\\', '\0']);
        if unsafe_name {
            return Err(DnsError::invalid_name(domain_name));
        }

        Ok(self.output_dir.join(format!("{}{}", ZONE_FILE_PREFIX, domain_name)))
    }

    /// Atomically replace the zone file for `domain_name` with `content`
    pub async fn write(&self, domain_name: &str, content: &[u8]) -> DnsResult<PathBuf> {
        let path = self.zone_path(domain_name)?;
        let sequence = self.temp_sequence.fetch_add(1, Ordering::Relaxed);
        let temp_path = self
            .output_dir
            .join(format!("{}{}.{}", TEMP_FILE_PREFIX, std::process::id(), sequence));

        if let Err(err) = Self::write_file(&temp_path, content).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err);
        }

        if let Err(err) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(DnsError::DiskIoError {
                message: format!("Failed to move zone file into {}: {}", path.display(), err),
            });
        }

        self.write_operations.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(content.len() as u64, Ordering::Relaxed);

        tracing::debug!(
            domain = %domain_name,
            path = %path.display(),
            bytes = content.len(),
            "Wrote zone file"
        );

        Ok(path)
    }

    /// Remove the zone file for `domain_name`
    ///
    /// Returns `Ok(false)` when there was no file to remove.
    pub async fn delete(&self, domain_name: &str) -> DnsResult<bool> {
        let path = self.zone_path(domain_name)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                self.delete_operations.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(domain = %domain_name, path = %path.display(), "Deleted zone file");
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                self.missing_deletes.fetch_add(1, Ordering::Relaxed);
                Ok(false)
            }
            Err(err) => Err(DnsError::DiskIoError {
                message: format!("Failed to delete zone file {}: {}", path.display(), err),
            }),
        }
    }

    /// Read back the stored zone file, if any
    pub async fn read(&self, domain_name: &str) -> DnsResult<Option<Vec<u8>>> {
        let path = self.zone_path(domain_name)?;

        match fs::read(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(DnsError::DiskIoError {
                message: format!("Failed to read zone file {}: {}", path.display(), err),
            }),
        }
    }

    /// Get store statistics
    pub fn get_statistics(&self) -> ZoneStoreStatistics {
        ZoneStoreStatistics {
            write_operations: self.write_operations.load(Ordering::Relaxed),
            delete_operations: self.delete_operations.load(Ordering::Relaxed),
            missing_deletes: self.missing_deletes.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }

    fn check_writable(output_dir: &Path) -> DnsResult<()> {
        let marker = output_dir.join(format!("{}{}.check", TEMP_FILE_PREFIX, std::process::id()));
        let not_writable = |e: std::io::Error| DnsError::DiskIoError {
            message: format!("Output directory {} is not writable: {}", output_dir.display(), e),
        };

        std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&marker)
            .map_err(not_writable)?;
        std::fs::remove_file(&marker).map_err(not_writable)
    }

    async fn write_file(path: &Path, content: &[u8]) -> DnsResult<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| DnsError::DiskIoError {
                message: format!("Failed to create {}: {}", path.display(), e),
            })?;

        file.write_all(content).await?;
        file.sync_all().await?;
        Ok(())
    }
}
