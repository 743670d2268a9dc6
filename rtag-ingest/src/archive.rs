//! Replay identity and canonical archive
//!
//! A replay is identified by the SHA-256 digest of its bytes. Accepted files
//! are copied into the archive directory as `<digest>.<ext>`; the copy is
//! skipped when that file already exists, so re-ingesting identical bytes
//! never duplicates storage.

use rtag_common::{Error, Replay, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Read size for streaming digests (1MB at a time for memory efficiency)
pub const HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// Calculate the hex SHA-256 digest of everything `reader` yields
pub fn hash_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Calculate the digest of a file without blocking the async runtime
pub async fn hash_file(path: &Path) -> Result<String> {
    let path_buf = path.to_path_buf();
    tracing::debug!(path = %path_buf.display(), "Calculating SHA-256 hash");

    tokio::task::spawn_blocking(move || -> Result<String> {
        let mut file = File::open(&path_buf).map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("Failed to open {} for hashing: {}", path_buf.display(), e),
            ))
        })?;
        Ok(hash_reader(&mut file)?)
    })
    .await
    .map_err(|e| Error::Internal(format!("Hash calculation task failed: {}", e)))?
}

/// Canonical storage for replay files
#[derive(Debug, Clone)]
pub struct ReplayArchive {
    dir: PathBuf,
    extension: String,
}

impl ReplayArchive {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn canonical_path(&self, digest: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", digest, self.extension))
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.canonical_path(digest).is_file()
    }

    /// Hash `reader` from its current position, verify it against
    /// `expected_digest`, and archive it
    ///
    /// Returns `Ok(None)` when the computed digest does not match the
    /// expected one; nothing is written in that case.
    pub fn ingest_reader<R: Read + Seek>(
        &self,
        reader: &mut R,
        expected_digest: Option<&str>,
    ) -> Result<Option<Replay>> {
        let start = reader.stream_position()?;
        let digest = hash_reader(reader)?;

        if let Some(expected) = expected_digest {
            if !expected.trim().eq_ignore_ascii_case(&digest) {
                warn!(
                    expected = %expected,
                    actual = %digest,
                    "Rejecting replay: digest mismatch"
                );
                return Ok(None);
            }
        }

        let canonical = self.canonical_path(&digest);
        if canonical.is_file() {
            debug!(digest = %digest, "Replay already archived, skipping copy");
        } else {
            reader.seek(SeekFrom::Start(start))?;
            self.write_atomically(reader, &canonical)?;
            info!(digest = %digest, path = %canonical.display(), "Archived replay");
        }

        Ok(Some(Replay::new(canonical, digest)))
    }

    /// Archive a file from disk (see [`ReplayArchive::ingest_reader`])
    pub async fn ingest_file(
        &self,
        path: &Path,
        expected_digest: Option<&str>,
    ) -> Result<Option<Replay>> {
        let archive = self.clone();
        let path = path.to_path_buf();
        let expected = expected_digest.map(str::to_string);

        tokio::task::spawn_blocking(move || {
            let mut file = File::open(&path)?;
            archive.ingest_reader(&mut file, expected.as_deref())
        })
        .await
        .map_err(|e| Error::Internal(format!("Archive task failed: {}", e)))?
    }

    /// Copy an already-hashed file into the archive unless present
    pub fn adopt(&self, source: &Path, digest: &str) -> Result<PathBuf> {
        let canonical = self.canonical_path(digest);
        if canonical.is_file() {
            return Ok(canonical);
        }

        let mut file = File::open(source)?;
        self.write_atomically(&mut file, &canonical)?;
        info!(digest = %digest, source = %source.display(), "Copied replay into archive");
        Ok(canonical)
    }

    /// Write via a sibling temp file and rename so a crash never leaves a
    /// truncated file under a canonical name
    fn write_atomically<R: Read>(&self, reader: &mut R, target: &Path) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let partial = target.with_extension(format!("{}.partial", self.extension));
        let written = File::create(&partial).and_then(|mut out| {
            io::copy(reader, &mut out)?;
            out.flush()
        });

        if let Err(e) = written {
            if let Err(cleanup) = std::fs::remove_file(&partial) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(path = %partial.display(), error = %cleanup, "Failed to remove partial file");
                }
            }
            return Err(e.into());
        }

        std::fs::rename(&partial, target)?;
        Ok(())
    }
}
